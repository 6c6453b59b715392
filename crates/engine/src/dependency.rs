//! Resolution of dependent options, visibility and length bounds.
//!
//! A dependent field reads the current value of exactly one controlling field. The resolver
//! indexes the flattened schema (top level plus every nested additional-fields tree) so a
//! reference can name a field by id or, failing that, by name. Resolution only ever looks
//! one hop away, so a cyclic schema cannot make it loop; [`DependencyResolver::find_cycle`]
//! reports such schemas at save time instead.

use std::collections::HashMap;

use indexmap::IndexMap;
use portal_types::field::validation::value_text;
use portal_types::{
    CheckboxDependency, DEFAULT_DEPENDENT_KEY, DependentLength, EnclosureDependency, FieldOption, FieldRecord, LengthBound,
    OptionsConfig,
};
use serde_json::Value as JsonValue;

use crate::additional_fields::flatten_fields;

/// Current form values keyed by field name.
pub type FormState = IndexMap<String, JsonValue>;

/// Outcome of a visibility rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
    /// The rule is an authoring-time condition label that is not evaluated; the field
    /// stays active.
    Conditional(String),
}

impl Visibility {
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::Hidden)
    }
}

/// Length bound applicable for the current form state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LengthLimit {
    Bounded(u32),
    /// Free-text condition recorded by the designer. Carries no numeric bound.
    Condition(String),
    Unbounded,
}

impl LengthLimit {
    /// Numeric bound, if any. Anything else is treated as unbounded.
    pub fn as_bound(&self) -> Option<u32> {
        match self {
            Self::Bounded(bound) => Some(*bound),
            Self::Condition(_) | Self::Unbounded => None,
        }
    }
}

/// Options of a dependent select for a given controlling value.
///
/// Falls back to the [`DEFAULT_DEPENDENT_KEY`] list only when the controlling field has no
/// enumerable options; an unknown value otherwise yields an empty list.
pub fn resolve_dependent_options(config: &OptionsConfig, controlling_value: Option<&str>, controlling_enumerable: bool) -> Vec<FieldOption> {
    if let Some(value) = controlling_value
        && let Some(options) = config.dependent_options.get(value)
    {
        return options.clone();
    }
    if !controlling_enumerable && let Some(options) = config.dependent_options.get(DEFAULT_DEPENDENT_KEY) {
        return options.clone();
    }
    Vec::new()
}

/// Length bound of a dependent bound record for a given controlling value.
pub fn resolve_dependent_length(dependent: &DependentLength, controlling_value: Option<&str>) -> LengthLimit {
    if let Some(value) = controlling_value
        && let Some(bound) = dependent.bounds.get(value)
    {
        return LengthLimit::Bounded(*bound);
    }
    match &dependent.condition {
        Some(condition) => LengthLimit::Condition(condition.clone()),
        None => LengthLimit::Unbounded,
    }
}

/// First dependency cycle of a schema, see [`DependencyResolver::find_cycle`].
pub fn detect_dependency_cycle(fields: &[FieldRecord]) -> Option<Vec<String>> {
    DependencyResolver::new(fields).find_cycle()
}

/// Index over a flattened schema used to evaluate dependency rules.
#[derive(Debug, Clone)]
pub struct DependencyResolver<'schema> {
    fields: Vec<&'schema FieldRecord>,
    by_id: HashMap<&'schema str, &'schema FieldRecord>,
    by_name: HashMap<&'schema str, &'schema FieldRecord>,
}

impl<'schema> DependencyResolver<'schema> {
    /// Indexes `fields` and every nested record. The first record wins on duplicate keys.
    pub fn new(fields: &'schema [FieldRecord]) -> Self {
        let fields = flatten_fields(fields);
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();
        for field in fields.iter().copied() {
            by_id.entry(field.id.as_str()).or_insert(field);
            if !field.name.is_empty() {
                by_name.entry(field.name.as_str()).or_insert(field);
            }
        }
        Self { fields, by_id, by_name }
    }

    /// Looks a reference up by id first, then by name.
    pub fn lookup(&self, reference: &str) -> Option<&'schema FieldRecord> {
        self.by_id.get(reference).or_else(|| self.by_name.get(reference)).copied()
    }

    /// Current value of the referenced field.
    ///
    /// State is keyed by field name; an unknown reference is tried as a name directly.
    pub fn controlling_value<'state>(&self, reference: &str, state: &'state FormState) -> Option<&'state JsonValue> {
        match self.lookup(reference) {
            Some(field) if !field.name.is_empty() => state.get(field.name.as_str()),
            _ => state.get(reference),
        }
    }

    fn controlling_text(&self, reference: &str, state: &FormState) -> Option<String> {
        self.controlling_value(reference, state).and_then(value_text)
    }

    fn controlling_enumerable(&self, reference: &str) -> bool {
        self.lookup(reference).is_some_and(FieldRecord::has_enumerable_options)
    }

    /// Options offered by `field` when its controlling field holds `controlling_value`.
    pub fn resolve_options(&self, field: &FieldRecord, controlling_value: Option<&str>) -> Vec<FieldOption> {
        match field.options_config() {
            None => Vec::new(),
            Some(config) if !config.is_dependent() => config.options.clone(),
            Some(config) => {
                let controlling_enumerable = config
                    .dependent_on
                    .as_deref()
                    .is_some_and(|reference| self.controlling_enumerable(reference));
                resolve_dependent_options(config, controlling_value, controlling_enumerable)
            }
        }
    }

    /// Options offered by `field` for the given form state.
    pub fn resolve_options_for_state(&self, field: &FieldRecord, state: &FormState) -> Vec<FieldOption> {
        let controlling_value = field
            .options_config()
            .and_then(|config| config.dependent_on.as_deref())
            .and_then(|reference| self.controlling_text(reference, state));
        self.resolve_options(field, controlling_value.as_deref())
    }

    /// Visibility of `field` for the given form state.
    pub fn resolve_visibility(&self, field: &FieldRecord, state: &FormState) -> Visibility {
        let Some(config) = field.options_config() else {
            return Visibility::Visible;
        };
        if let Some(enclosure) = &config.enclosure {
            return self.enclosure_visibility(enclosure, state);
        }
        if let Some(checkbox) = &config.checkbox {
            return self.checkbox_visibility(checkbox, state);
        }
        Visibility::Visible
    }

    /// Shorthand for [`Self::resolve_visibility`] collapsed to a boolean.
    pub fn is_visible(&self, field: &FieldRecord, state: &FormState) -> bool {
        self.resolve_visibility(field, state).is_visible()
    }

    fn enclosure_visibility(&self, enclosure: &EnclosureDependency, state: &FormState) -> Visibility {
        if enclosure.dependent_field.is_empty() {
            return Visibility::Visible;
        }
        if !self.controlling_enumerable(&enclosure.dependent_field) {
            return match enclosure.dependent_values.first() {
                Some(condition) => Visibility::Conditional(condition.clone()),
                None => Visibility::Visible,
            };
        }
        let current_values = self
            .controlling_value(&enclosure.dependent_field, state)
            .map(value_texts)
            .unwrap_or_default();
        if current_values.iter().any(|value| enclosure.dependent_values.contains(value)) {
            Visibility::Visible
        } else {
            Visibility::Hidden
        }
    }

    fn checkbox_visibility(&self, checkbox: &CheckboxDependency, state: &FormState) -> Visibility {
        if checkbox.dependent_on.is_empty() {
            return Visibility::Visible;
        }
        match self.controlling_value(&checkbox.dependent_on, state) {
            Some(JsonValue::String(value)) if *value == checkbox.dependent_value => Visibility::Visible,
            _ => Visibility::Hidden,
        }
    }

    pub fn resolve_max_length(&self, field: &FieldRecord, state: &FormState) -> LengthLimit {
        self.resolve_length(field.max_length.as_ref(), state)
    }

    pub fn resolve_min_length(&self, field: &FieldRecord, state: &FormState) -> LengthLimit {
        self.resolve_length(field.min_length.as_ref(), state)
    }

    fn resolve_length(&self, bound: Option<&LengthBound>, state: &FormState) -> LengthLimit {
        match bound {
            None => LengthLimit::Unbounded,
            Some(LengthBound::Fixed(bound)) => LengthLimit::Bounded(*bound),
            Some(LengthBound::Dependent(dependent)) => {
                let controlling_value = self.controlling_text(&dependent.dependent_on, state);
                resolve_dependent_length(dependent, controlling_value.as_deref())
            }
        }
    }

    /// References that point at no field of the schema, as `(field id, reference)` pairs.
    pub fn unresolved_references(&self) -> Vec<(String, String)> {
        let mut unresolved = Vec::new();
        for field in &self.fields {
            for reference in field.dependency_references() {
                if self.lookup(reference).is_none() {
                    unresolved.push((field.id.clone(), reference.to_string()));
                }
            }
        }
        unresolved
    }

    /// First dependency cycle found, as the ids along the cycle with the start repeated at
    /// the end (`[a, b, a]`). A field depending on itself yields `[a, a]`.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut states: HashMap<&str, VisitState> = HashMap::new();
        let mut stack = Vec::new();
        for field in self.fields.iter().copied() {
            if let Some(cycle) = self.visit(field, &mut states, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    fn visit(
        &self,
        field: &'schema FieldRecord,
        states: &mut HashMap<&'schema str, VisitState>,
        stack: &mut Vec<&'schema str>,
    ) -> Option<Vec<String>> {
        match states.get(field.id.as_str()) {
            Some(VisitState::Done) => return None,
            Some(VisitState::Visiting) => {
                let start = stack.iter().position(|id| *id == field.id)?;
                let mut cycle: Vec<String> = stack[start..].iter().map(|id| id.to_string()).collect();
                cycle.push(field.id.clone());
                return Some(cycle);
            }
            None => {}
        }
        states.insert(field.id.as_str(), VisitState::Visiting);
        stack.push(field.id.as_str());
        for reference in field.dependency_references() {
            if let Some(target) = self.lookup(reference)
                && let Some(cycle) = self.visit(target, states, stack)
            {
                return Some(cycle);
            }
        }
        stack.pop();
        states.insert(field.id.as_str(), VisitState::Done);
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Done,
}

fn value_texts(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::Array(items) => items.iter().filter_map(value_text).collect(),
        other => value_text(other).into_iter().collect(),
    }
}
