//! Value-level validation helpers shared by render-time consumers.
//!
//! These routines check a submitted JSON value against constraints that have already been
//! resolved for the current form state (dependent bounds, dependent options).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex should compile"));

/// Constraints resolved for a single field at submission time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueConstraints {
    /// Whether a value must be provided.
    pub required: bool,
    /// Minimum length for text values, when bounded.
    pub min_length: Option<u32>,
    /// Maximum length for text values, when bounded.
    pub max_length: Option<u32>,
    /// Closed set of accepted values, when the field offers choices. An empty set accepts
    /// only blank values.
    pub allowed_values: Option<Vec<String>>,
    /// Whether text values must look like an e-mail address.
    pub email: bool,
}

/// Returns true for values that count as "not provided".
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Bool(flag) => !flag,
        _ => false,
    }
}

/// Validate a JSON candidate against resolved field constraints.
///
/// - Blank values fail only when the field is required; otherwise they pass untouched.
/// - Length and e-mail checks only apply to strings.
/// - Allowed values compare against the textual form of the candidate.
pub fn validate_candidate_value(candidate: &Value, constraints: &ValueConstraints) -> Result<(), String> {
    if is_blank(candidate) {
        return if constraints.required {
            Err("a value is required".to_string())
        } else {
            Ok(())
        };
    }

    if let Some(allowed_values) = &constraints.allowed_values {
        let candidate_text = value_text(candidate);
        let matches_allowed_value = candidate_text
            .as_deref()
            .is_some_and(|text| allowed_values.iter().any(|allowed| allowed == text));
        if !matches_allowed_value {
            return Err("value is not in the allowed set".to_string());
        }
    }

    match candidate {
        Value::String(text) => {
            let length = text.chars().count();
            if let Some(min_length) = constraints.min_length
                && length < min_length as usize
            {
                return Err(format!("value must be at least {} characters", min_length));
            }

            if let Some(max_length) = constraints.max_length
                && length > max_length as usize
            {
                return Err(format!("value must be at most {} characters", max_length));
            }

            if constraints.email && !EMAIL_REGEX.is_match(text.trim()) {
                return Err("value must be a valid e-mail address".to_string());
            }
            Ok(())
        }
        _ if constraints.email || constraints.min_length.is_some() || constraints.max_length.is_some() => {
            Err("value must be text to satisfy validation rules".to_string())
        }
        _ => Ok(()),
    }
}

/// Textual form of a scalar value, used for option and dependency comparisons.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_optional_value_passes() {
        assert!(validate_candidate_value(&Value::Null, &ValueConstraints::default()).is_ok());
        let required = ValueConstraints {
            required: true,
            ..ValueConstraints::default()
        };
        assert!(validate_candidate_value(&Value::String("  ".to_string()), &required).is_err());
    }

    #[test]
    fn string_length_bounds_apply() {
        let constraints = ValueConstraints {
            min_length: Some(2),
            max_length: Some(4),
            ..ValueConstraints::default()
        };
        assert!(validate_candidate_value(&Value::String("abc".to_string()), &constraints).is_ok());
        assert!(validate_candidate_value(&Value::String("a".to_string()), &constraints).is_err());
        assert!(validate_candidate_value(&Value::String("abcde".to_string()), &constraints).is_err());
        assert!(validate_candidate_value(&Value::from(12), &constraints).is_err());
    }

    #[test]
    fn allowed_values_compare_textually() {
        let constraints = ValueConstraints {
            allowed_values: Some(vec!["42".to_string(), "Yes".to_string()]),
            ..ValueConstraints::default()
        };
        assert!(validate_candidate_value(&Value::from(42), &constraints).is_ok());
        assert!(validate_candidate_value(&Value::String("Yes".to_string()), &constraints).is_ok());
        assert!(validate_candidate_value(&Value::String("No".to_string()), &constraints).is_err());
    }

    #[test]
    fn empty_allowed_set_rejects_any_value() {
        let constraints = ValueConstraints {
            allowed_values: Some(Vec::new()),
            ..ValueConstraints::default()
        };
        assert!(validate_candidate_value(&Value::String("Anything".to_string()), &constraints).is_err());
        assert!(validate_candidate_value(&Value::Null, &constraints).is_ok());
        assert!(validate_candidate_value(&Value::String("Anything".to_string()), &ValueConstraints::default()).is_ok());
    }

    #[test]
    fn email_shape_is_checked() {
        let constraints = ValueConstraints {
            email: true,
            ..ValueConstraints::default()
        };
        assert!(validate_candidate_value(&Value::String("citizen@example.gov".to_string()), &constraints).is_ok());
        assert!(validate_candidate_value(&Value::String("citizen.example".to_string()), &constraints).is_err());
    }
}
