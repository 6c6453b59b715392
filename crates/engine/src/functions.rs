//! Named validators and transformers referenced by field records.
//!
//! Field records only store identifiers; behaviour is looked up here when a form is
//! submitted. Identifiers with no registered entry are reported as commit warnings and
//! skipped at submission time.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use portal_types::FieldRecord;
use portal_types::field::validation::is_blank;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::declaration::collapse_whitespace;

/// Checks one submitted value. Errors carry a user-facing reason.
pub type Validator = Arc<dyn Fn(&JsonValue) -> Result<(), String> + Send + Sync>;

/// Rewrites one submitted value before validation.
pub type Transformer = Arc<dyn Fn(JsonValue) -> JsonValue + Send + Sync>;

static NUMERIC_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?$").expect("numeric regex should compile"));

static ALPHABETIC_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{L} .]+$").expect("alphabetic regex should compile"));

static ALPHANUMERIC_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}0-9 ]+$").expect("alphanumeric regex should compile"));

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9]{10,13}$").expect("phone regex should compile"));

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex should compile"));

/// Identifier of the validator that duplicates the `required` attribute.
pub const REQUIRED_VALIDATOR: &str = "required";

/// Lookup table from identifier to validator or transformer.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    validators: IndexMap<String, Validator>,
    transformers: IndexMap<String, Transformer>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .field("transformers", &self.transformers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the validators and transformers the designer offers out of the box.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register_validator(REQUIRED_VALIDATOR, |value| {
            if is_blank(value) {
                Err("a value is required".to_string())
            } else {
                Ok(())
            }
        });
        registry.register_validator("email", |value| text_matches(value, &EMAIL_REGEX, "value must be a valid e-mail address"));
        registry.register_validator("numeric", |value| match value {
            JsonValue::Number(_) => Ok(()),
            other => text_matches(other, &NUMERIC_REGEX, "value must be numeric"),
        });
        registry.register_validator("alphabetic", |value| {
            text_matches(value, &ALPHABETIC_REGEX, "value may only contain letters")
        });
        registry.register_validator("alphanumeric", |value| {
            text_matches(value, &ALPHANUMERIC_REGEX, "value may only contain letters and digits")
        });
        registry.register_validator("phone", |value| text_matches(value, &PHONE_REGEX, "value must be a phone number"));

        registry.register_transformer("trim", |value| map_text(value, |text| text.trim().to_string()));
        registry.register_transformer("uppercase", |value| map_text(value, |text| text.to_uppercase()));
        registry.register_transformer("lowercase", |value| map_text(value, |text| text.to_lowercase()));
        registry.register_transformer("collapse_whitespace", |value| map_text(value, collapse_whitespace));
        registry
    }

    /// Registers or replaces a validator.
    pub fn register_validator<F>(&mut self, name: impl Into<String>, validator: F)
    where
        F: Fn(&JsonValue) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.insert(name.into(), Arc::new(validator));
    }

    /// Registers or replaces a transformer.
    pub fn register_transformer<F>(&mut self, name: impl Into<String>, transformer: F)
    where
        F: Fn(JsonValue) -> JsonValue + Send + Sync + 'static,
    {
        self.transformers.insert(name.into(), Arc::new(transformer));
    }

    pub fn validator(&self, name: &str) -> Option<&Validator> {
        self.validators.get(name)
    }

    pub fn transformer(&self, name: &str) -> Option<&Transformer> {
        self.transformers.get(name)
    }

    pub fn validator_names(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }

    pub fn transformer_names(&self) -> impl Iterator<Item = &str> {
        self.transformers.keys().map(String::as_str)
    }

    /// Applies the named transformers in order; unknown names are skipped.
    pub fn transform<'a>(&self, names: impl IntoIterator<Item = &'a String>, value: JsonValue) -> JsonValue {
        names
            .into_iter()
            .filter_map(|name| self.transformer(name))
            .fold(value, |value, transformer| transformer(value))
    }

    /// Identifiers listed on `field` that resolve to nothing in this registry.
    pub fn unknown_identifiers(&self, field: &FieldRecord) -> Vec<String> {
        let unknown_validators = field
            .validation_functions
            .iter()
            .filter(|name| !self.validators.contains_key(name.as_str()));
        let unknown_transformers = field
            .transformation_functions
            .iter()
            .filter(|name| !self.transformers.contains_key(name.as_str()));
        unknown_validators.chain(unknown_transformers).cloned().collect()
    }
}

/// Blank values pass; required-ness is checked separately.
fn text_matches(value: &JsonValue, pattern: &Regex, message: &str) -> Result<(), String> {
    if is_blank(value) {
        return Ok(());
    }
    match value {
        JsonValue::String(text) if pattern.is_match(text.trim()) => Ok(()),
        _ => Err(message.to_string()),
    }
}

fn map_text(value: JsonValue, apply: impl Fn(&str) -> String) -> JsonValue {
    match value {
        JsonValue::String(text) => JsonValue::String(apply(&text)),
        other => other,
    }
}
