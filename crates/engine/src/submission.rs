//! Submit-time validation of a form state against a schema.

use portal_types::field::validation::{ValueConstraints, validate_candidate_value, value_text};
use portal_types::{FieldRecord, FieldType};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::dependency::{DependencyResolver, FormState};
use crate::functions::{FunctionRegistry, REQUIRED_VALIDATOR};

/// A rejected field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field_id: String,
    pub field_name: String,
    pub message: String,
}

/// Outcome of validating a submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    /// Transformed values of every active field that had one.
    pub values: FormState,
    pub errors: Vec<FieldError>,
}

impl SubmissionReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validates `state` against `fields`.
///
/// Hidden fields are skipped together with their nested trees. Nested fields are only
/// active under the option value currently selected on their parent. Values are
/// transformed before they are checked; each field reports at most one error.
pub fn validate_submission(fields: &[FieldRecord], state: &FormState, registry: &FunctionRegistry) -> SubmissionReport {
    let resolver = DependencyResolver::new(fields);
    let mut report = SubmissionReport::default();
    for field in fields {
        validate_field(field, state, &resolver, registry, &mut report);
    }
    debug!(error_count = report.errors.len(), "validated submission");
    report
}

fn validate_field(
    field: &FieldRecord,
    state: &FormState,
    resolver: &DependencyResolver<'_>,
    registry: &FunctionRegistry,
    report: &mut SubmissionReport,
) {
    if !resolver.is_visible(field, state) {
        debug!(field_id = %field.id, "skipping hidden field");
        return;
    }

    let key = state_key(field);
    let value = state
        .get(key)
        .cloned()
        .map(|value| registry.transform(&field.transformation_functions, value))
        .unwrap_or(JsonValue::Null);

    if let Err(message) = check_value(field, &value, state, resolver, registry) {
        report.errors.push(FieldError {
            field_id: field.id.clone(),
            field_name: field.name.clone(),
            message,
        });
    }

    let selected = selected_values(&value);
    if !value.is_null() {
        report.values.insert(key.to_string(), value);
    }

    for (option_value, children) in field.additional_fields.iter() {
        if !selected.contains(option_value) {
            continue;
        }
        for child in children {
            validate_field(child, state, resolver, registry, report);
        }
    }
}

fn check_value(
    field: &FieldRecord,
    value: &JsonValue,
    state: &FormState,
    resolver: &DependencyResolver<'_>,
    registry: &FunctionRegistry,
) -> Result<(), String> {
    let allowed_values = (field.field_type == FieldType::Select).then(|| {
        resolver
            .resolve_options_for_state(field, state)
            .into_iter()
            .map(|option| option.value)
            .collect()
    });
    let constraints = ValueConstraints {
        required: field.required,
        min_length: resolver.resolve_min_length(field, state).as_bound(),
        max_length: resolver.resolve_max_length(field, state).as_bound(),
        allowed_values,
        email: field.field_type == FieldType::Email,
    };
    validate_candidate_value(value, &constraints)?;

    for name in &field.validation_functions {
        if field.required && name == REQUIRED_VALIDATOR {
            continue;
        }
        match registry.validator(name) {
            Some(validator) => validator(value)?,
            None => debug!(field_id = %field.id, validator = %name, "unknown validator skipped"),
        }
    }
    Ok(())
}

fn state_key(field: &FieldRecord) -> &str {
    if field.name.is_empty() { &field.id } else { &field.name }
}

fn selected_values(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::Array(items) => items.iter().filter_map(value_text).collect(),
        other => value_text(other).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_types::normalize_values;
    use serde_json::json;

    fn schema() -> Vec<FieldRecord> {
        normalize_values(&json!([
            {
                "id": "owns", "name": "ownsLand", "type": "select", "options": "Yes;No", "required": true,
                "additionalFields": {
                    "Yes": [{ "id": "survey", "name": "surveyNumber", "required": true, "validationFunctions": "numeric" }],
                    "No": [{ "id": "reason", "name": "reason", "required": true }]
                }
            },
            {
                "id": "mail", "name": "email", "type": "email",
                "validationFunctions": ["required"], "transformationFunctions": ["trim", "lowercase"]
            },
            {
                "id": "deed", "name": "deed", "type": "enclosure", "required": true,
                "isDependentEnclosure": true, "dependentField": "ownsLand", "dependentValues": ["Yes"]
            }
        ]))
    }

    fn state(value: JsonValue) -> FormState {
        serde_json::from_value(value).expect("form state")
    }

    #[test]
    fn accepts_complete_submission() {
        let fields = schema();
        let report = validate_submission(
            &fields,
            &state(json!({ "ownsLand": "Yes", "surveyNumber": "114", "email": "  Clerk@Example.GOV ", "deed": "deed.pdf" })),
            &FunctionRegistry::builtin(),
        );
        assert!(report.is_valid(), "{:?}", report.errors);
        assert_eq!(report.values.get("email"), Some(&json!("clerk@example.gov")));
    }

    #[test]
    fn only_selected_branch_is_checked() {
        let fields = schema();
        let report = validate_submission(
            &fields,
            &state(json!({ "ownsLand": "No", "email": "a@b.in" })),
            &FunctionRegistry::builtin(),
        );
        let failed: Vec<_> = report.errors.iter().map(|error| error.field_id.as_str()).collect();
        assert_eq!(failed, vec!["reason"]);
    }

    #[test]
    fn rejects_values_outside_options_and_failing_validators() {
        let fields = schema();
        let report = validate_submission(
            &fields,
            &state(json!({ "ownsLand": "Maybe", "email": "not-mail" })),
            &FunctionRegistry::builtin(),
        );
        let failed: Vec<_> = report.errors.iter().map(|error| error.field_id.as_str()).collect();
        assert_eq!(failed, vec!["owns", "mail"]);

        let report = validate_submission(
            &fields,
            &state(json!({ "ownsLand": "Yes", "surveyNumber": "11a", "email": "a@b.in", "deed": "x" })),
            &FunctionRegistry::builtin(),
        );
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].message, "value must be numeric");
    }

    #[test]
    fn select_without_resolved_options_rejects_values() {
        let fields = normalize_values(&json!([
            { "id": "state", "name": "state", "type": "select", "options": "Kerala;Goa" },
            {
                "id": "district", "name": "district", "type": "select", "optionsType": "dependent",
                "dependentOn": "state", "dependentOptions": { "Kerala": "Kollam", "Goa": [] }
            }
        ]));
        let registry = FunctionRegistry::builtin();

        let report = validate_submission(&fields, &state(json!({ "state": "Goa", "district": "Anything" })), &registry);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].field_id, "district");
        assert_eq!(report.errors[0].message, "value is not in the allowed set");

        assert!(validate_submission(&fields, &state(json!({ "state": "Goa" })), &registry).is_valid());
        assert!(validate_submission(&fields, &state(json!({ "state": "Kerala", "district": "Kollam" })), &registry).is_valid());
    }

    #[test]
    fn required_validator_applies_without_attribute() {
        let fields = schema();
        let report = validate_submission(&fields, &state(json!({ "ownsLand": "No", "reason": "sold" })), &FunctionRegistry::builtin());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].field_name, "email");
        assert_eq!(report.errors[0].message, "a value is required");
    }
}
