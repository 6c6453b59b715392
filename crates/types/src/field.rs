//! Strongly typed form schema definitions shared across the designer engine and CLI.
//!
//! A [`FieldRecord`] is the atomic schema unit. Records are persisted in a flat, camelCase
//! wire shape ([`RawFieldRecord`]) that tolerates partial and legacy input, and every record
//! read from storage passes through [`normalize`] so consumers only ever observe complete,
//! defaulted values. Maps keyed by option values preserve authoring order (via `IndexMap`)
//! so editors render branches in a predictable sequence.

pub mod normalize;
pub mod validation;

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

pub use normalize::{RawFieldRecord, normalize, normalize_list, normalize_value, normalize_values};

/// Layout grid width applied when a record carries no usable span.
pub const DEFAULT_SPAN: u8 = 12;

/// Widest span the layout grid supports.
pub const MAX_SPAN: u8 = 12;

/// Key consulted by dependent lookups when the controlling field has no enumerable options.
pub const DEFAULT_DEPENDENT_KEY: &str = "default";

/// Input widget family of a field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Free text input.
    #[default]
    Text,
    /// Text input validated as an e-mail address.
    Email,
    /// Single choice from an option list.
    Select,
    /// Boolean or consent checkbox.
    Checkbox,
    /// File upload.
    File,
    /// Date picker.
    Date,
    /// Supporting document upload that can be switched on by another field.
    Enclosure,
}

impl FieldType {
    /// Parses a type name, ignoring case and surrounding whitespace.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "email" => Some(Self::Email),
            "select" => Some(Self::Select),
            "checkbox" => Some(Self::Checkbox),
            "file" => Some(Self::File),
            "date" => Some(Self::Date),
            "enclosure" => Some(Self::Enclosure),
            _ => None,
        }
    }

    /// Wire name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::File => "file",
            Self::Date => "date",
            Self::Enclosure => "enclosure",
        }
    }

    /// Returns true for types that carry an `accept` filter.
    pub fn accepts_files(&self) -> bool {
        matches!(self, Self::File | Self::Enclosure)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single selectable choice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FieldOption {
    /// Machine value submitted with the form.
    pub value: String,
    /// Display text.
    pub label: String,
}

impl FieldOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// Builds an option whose label mirrors its value.
    pub fn from_value(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }
}

/// Parses the semicolon-delimited authoring surface into an option list.
///
/// Tokens are trimmed, empty tokens are dropped and the first occurrence of a value wins.
pub fn parse_options_text(text: &str) -> Vec<FieldOption> {
    dedupe_options(
        text.split(';')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(FieldOption::from_value)
            .collect(),
    )
}

/// Renders an option list back into the semicolon-delimited authoring surface.
pub fn format_options_text(options: &[FieldOption]) -> String {
    options.iter().map(|option| option.value.as_str()).collect::<Vec<_>>().join("; ")
}

/// Removes options whose value already appeared earlier in the list.
pub fn dedupe_options(options: Vec<FieldOption>) -> Vec<FieldOption> {
    let mut seen = IndexSet::new();
    options.into_iter().filter(|option| seen.insert(option.value.clone())).collect()
}

/// Length constraint attached to `minLength` / `maxLength`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LengthBound {
    /// A plain integer bound.
    Fixed(u32),
    /// A bound chosen by the current value of another field.
    Dependent(DependentLength),
}

/// Sparse map from another field's option values to a length bound.
///
/// On the wire the bounds share one object with the `dependentOn` and `condition` keys, so
/// an option value spelled exactly `dependentOn` or `condition` cannot carry a bound.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DependentLength {
    /// Identifier of the controlling field.
    pub dependent_on: String,
    /// Bound per controlling option value.
    pub bounds: IndexMap<String, u32>,
    /// Free-form condition text used when the controlling field has no enumerable options.
    pub condition: Option<String>,
}

/// Whether a select field owns a static option list or derives it from another field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptionsType {
    #[default]
    Static,
    Dependent,
}

/// Enables an enclosure only when another field holds one of the listed values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnclosureDependency {
    /// Identifier of the controlling field.
    pub dependent_field: String,
    /// Values that activate the enclosure. When the controlling field has no enumerable
    /// options the first entry is a textual condition label.
    pub dependent_values: Vec<String>,
}

/// Shows a checkbox only when a select field holds exactly one value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckboxDependency {
    /// Identifier of the controlling select field.
    pub dependent_on: String,
    /// Value the controlling field must equal.
    pub dependent_value: String,
}

/// Attribute group of an options-bearing field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OptionsConfig {
    /// Static option list.
    pub options: Vec<FieldOption>,
    /// Static or dependent options (select only).
    pub options_type: OptionsType,
    /// Controlling field of a dependent select.
    pub dependent_on: Option<String>,
    /// Option list per controlling value, or per [`DEFAULT_DEPENDENT_KEY`].
    pub dependent_options: IndexMap<String, Vec<FieldOption>>,
    /// Activation rule of an enclosure.
    pub enclosure: Option<EnclosureDependency>,
    /// Visibility gate of a checkbox.
    pub checkbox: Option<CheckboxDependency>,
}

impl OptionsConfig {
    pub fn is_dependent(&self) -> bool {
        self.options_type == OptionsType::Dependent
    }
}

/// Where a declaration field was drawn from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationSource {
    /// A field of the main form schema.
    #[default]
    FormDesigner,
    /// A column of the backing application table.
    ApplicationTable,
}

/// A field referenced by a declaration placeholder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DeclarationField {
    pub id: String,
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub source: DeclarationSource,
}

impl DeclarationField {
    /// Describes a form schema field as a declaration candidate.
    pub fn from_field(field: &FieldRecord) -> Self {
        Self {
            id: field.id.clone(),
            name: field.name.clone(),
            label: field.label.clone(),
            field_type: field.field_type,
            required: field.required,
            source: DeclarationSource::FormDesigner,
        }
    }

    /// The `{name}` token that references this field inside declaration text.
    pub fn placeholder(&self) -> String {
        format!("{{{}}}", self.name)
    }
}

/// Templated consent text plus the ordered list of fields it references.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Declaration {
    /// Free text containing zero or more `{fieldName}` placeholders.
    pub text: String,
    /// Fields referenced by the text, unique by id.
    pub fields: Vec<DeclarationField>,
}

/// Attribute group of a consent checkbox.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsentConfig {
    pub is_declaration: bool,
    pub declaration: Declaration,
}

/// The two mutually exclusive attribute groups of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Options(OptionsConfig),
    Consent(ConsentConfig),
}

impl Default for FieldKind {
    fn default() -> Self {
        Self::Options(OptionsConfig::default())
    }
}

/// Child field lists keyed by the parent's option value.
///
/// Every child may own a tree of its own; nesting depth is unbounded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct AdditionalFields(IndexMap<String, Vec<FieldRecord>>);

impl AdditionalFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Child list for `option_value`, empty when the key is absent.
    pub fn get(&self, option_value: &str) -> &[FieldRecord] {
        self.0.get(option_value).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, option_value: &str) -> bool {
        self.0.contains_key(option_value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<FieldRecord>)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Vec<FieldRecord>)> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Mutable child list for `option_value`, creating an empty list when absent.
    pub fn children_mut(&mut self, option_value: &str) -> &mut Vec<FieldRecord> {
        self.0.entry(option_value.to_string()).or_default()
    }

    pub fn insert(&mut self, option_value: impl Into<String>, children: Vec<FieldRecord>) -> Option<Vec<FieldRecord>> {
        self.0.insert(option_value.into(), children)
    }

    /// Drops a key and its child list, keeping the order of the remaining keys.
    pub fn remove_key(&mut self, option_value: &str) -> Option<Vec<FieldRecord>> {
        self.0.shift_remove(option_value)
    }

    /// Total number of records in the tree, nested trees included.
    pub fn total_fields(&self) -> usize {
        self.0
            .values()
            .flatten()
            .map(|child| 1 + child.additional_fields.total_fields())
            .sum()
    }

    pub fn into_inner(self) -> IndexMap<String, Vec<FieldRecord>> {
        self.0
    }
}

impl From<IndexMap<String, Vec<FieldRecord>>> for AdditionalFields {
    fn from(map: IndexMap<String, Vec<FieldRecord>>) -> Self {
        Self(map)
    }
}

/// One form field's complete definition.
///
/// Serialized in the flat camelCase wire shape; deserialization runs the normalizer, so a
/// `FieldRecord` obtained from storage is always complete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "RawFieldRecord", into = "RawFieldRecord")]
pub struct FieldRecord {
    /// Stable identifier, unique within its containing list.
    pub id: String,
    pub field_type: FieldType,
    pub label: String,
    /// Machine key, unique within the flattened field set.
    pub name: String,
    pub min_length: Option<LengthBound>,
    pub max_length: Option<LengthBound>,
    /// Layout grid weight between 1 and [`MAX_SPAN`].
    pub span: u8,
    pub required: bool,
    /// When false, editors hide edit, remove and nested controls for this field.
    pub editable: bool,
    /// File filter for `file` and `enclosure` fields.
    pub accept: Option<String>,
    /// Registry identifiers of validators applied to submitted values.
    pub validation_functions: IndexSet<String>,
    /// Registry identifiers of transformers applied before validation.
    pub transformation_functions: IndexSet<String>,
    pub additional_fields: AdditionalFields,
    pub kind: FieldKind,
}

impl Default for FieldRecord {
    fn default() -> Self {
        normalize(RawFieldRecord::default())
    }
}

impl FieldRecord {
    /// Creates a fully defaulted record of the given type with a fresh id.
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Self::default()
        }
    }

    /// Static options, empty for consent checkboxes.
    pub fn options(&self) -> &[FieldOption] {
        match &self.kind {
            FieldKind::Options(config) => &config.options,
            FieldKind::Consent(_) => &[],
        }
    }

    pub fn options_config(&self) -> Option<&OptionsConfig> {
        match &self.kind {
            FieldKind::Options(config) => Some(config),
            FieldKind::Consent(_) => None,
        }
    }

    pub fn options_config_mut(&mut self) -> Option<&mut OptionsConfig> {
        match &mut self.kind {
            FieldKind::Options(config) => Some(config),
            FieldKind::Consent(_) => None,
        }
    }

    pub fn consent(&self) -> Option<&ConsentConfig> {
        match &self.kind {
            FieldKind::Consent(config) => Some(config),
            FieldKind::Options(_) => None,
        }
    }

    pub fn consent_mut(&mut self) -> Option<&mut ConsentConfig> {
        match &mut self.kind {
            FieldKind::Consent(config) => Some(config),
            FieldKind::Options(_) => None,
        }
    }

    pub fn is_consent_checkbox(&self) -> bool {
        matches!(self.kind, FieldKind::Consent(_))
    }

    /// Every option value this field can hold: static options followed by dependent ones.
    pub fn enumerable_values(&self) -> IndexSet<String> {
        self.authored_options().map(|option| option.value.clone()).collect()
    }

    /// Returns true when the field offers a closed set of values.
    pub fn has_enumerable_options(&self) -> bool {
        self.authored_options().next().is_some()
    }

    /// Static options and every dependent option list, in authoring order.
    pub fn authored_options(&self) -> impl Iterator<Item = &FieldOption> {
        let (options, dependent): (&[FieldOption], Option<&IndexMap<String, Vec<FieldOption>>>) = match &self.kind {
            FieldKind::Options(config) => (&config.options, Some(&config.dependent_options)),
            FieldKind::Consent(_) => (&[], None),
        };
        options.iter().chain(dependent.into_iter().flat_map(|map| map.values().flatten()))
    }

    /// Identifiers of the fields this record depends on, in a stable order.
    pub fn dependency_references(&self) -> Vec<&str> {
        let mut references = Vec::new();
        if let FieldKind::Options(config) = &self.kind {
            if config.is_dependent()
                && let Some(dependent_on) = config.dependent_on.as_deref()
            {
                references.push(dependent_on);
            }
            if let Some(enclosure) = &config.enclosure {
                references.push(enclosure.dependent_field.as_str());
            }
            if let Some(checkbox) = &config.checkbox {
                references.push(checkbox.dependent_on.as_str());
            }
        }
        for bound in [&self.min_length, &self.max_length].into_iter().flatten() {
            if let LengthBound::Dependent(dependent) = bound {
                references.push(dependent.dependent_on.as_str());
            }
        }
        references.retain(|reference| !reference.is_empty());
        references
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_semicolon_delimited_options() {
        let options = parse_options_text(" Yes ;No;; Yes ;Maybe");
        let values: Vec<_> = options.iter().map(|option| option.value.as_str()).collect();
        assert_eq!(values, vec!["Yes", "No", "Maybe"]);
        assert_eq!(options[0].label, "Yes");
        assert_eq!(format_options_text(&options), "Yes; No; Maybe");
    }

    #[test]
    fn consent_records_expose_no_options() {
        let mut field = FieldRecord::new(FieldType::Checkbox);
        field.kind = FieldKind::Consent(ConsentConfig::default());
        assert!(field.options().is_empty());
        assert!(!field.has_enumerable_options());
        assert!(field.dependency_references().is_empty());
    }

    #[test]
    fn dependency_references_cover_every_group() {
        let mut field = FieldRecord::new(FieldType::Select);
        field.max_length = Some(LengthBound::Dependent(DependentLength {
            dependent_on: "district".into(),
            ..DependentLength::default()
        }));
        if let Some(config) = field.options_config_mut() {
            config.options_type = OptionsType::Dependent;
            config.dependent_on = Some("state".into());
        }
        assert_eq!(field.dependency_references(), vec!["state", "district"]);
    }

    #[test]
    fn additional_fields_count_nested_records() {
        let mut child = FieldRecord::new(FieldType::Text);
        child.additional_fields.children_mut("x").push(FieldRecord::new(FieldType::Date));
        let mut tree = AdditionalFields::new();
        tree.children_mut("Yes").push(child);
        tree.children_mut("No");
        assert_eq!(tree.total_fields(), 2);
        assert!(tree.get("No").is_empty());
        assert!(tree.get("missing").is_empty());
    }
}
