//! Conversion of form-metadata payloads into declaration candidates.

use heck::ToTitleCase;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use portal_types::{DeclarationField, DeclarationSource, FieldType, FormMetadata};
use regex::Regex;
use tracing::debug;

use crate::additional_fields::flatten_fields;

/// Columns that never become selectable: keys, audit stamps, credentials and withheld data.
static BLOCKED_COLUMN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(id$|^created|^updated|^deleted|password|token|hash|salt|secret|withhold)")
        .expect("blocked column regex should compile")
});

/// Human label for a column name: camelCase and underscores split, words title-cased.
pub fn column_label(column: &str) -> String {
    column.to_title_case()
}

pub fn is_blocked_column(column: &str) -> bool {
    BLOCKED_COLUMN_REGEX.is_match(column)
}

/// Selectable application-table fields for the given column names.
///
/// Blank and blocked names are skipped; the column name doubles as id and name.
pub fn application_table_fields<S: AsRef<str>>(columns: &[S]) -> Vec<DeclarationField> {
    columns
        .iter()
        .map(|column| column.as_ref().trim())
        .filter(|column| !column.is_empty())
        .filter(|column| {
            let blocked = is_blocked_column(column);
            if blocked {
                debug!(column = %column, "skipping blocked application table column");
            }
            !blocked
        })
        .map(|column| DeclarationField {
            id: column.to_string(),
            name: column.to_string(),
            label: column_label(column),
            field_type: FieldType::Text,
            required: false,
            source: DeclarationSource::ApplicationTable,
        })
        .collect()
}

/// Fields a declaration may reference: form fields first (nested ones included), then
/// application-table columns, unique by name.
pub fn declaration_candidates(metadata: &FormMetadata) -> Vec<DeclarationField> {
    let form_fields = metadata.form_fields();
    let from_form = flatten_fields(&form_fields)
        .into_iter()
        .filter(|field| !field.name.trim().is_empty() && !field.is_consent_checkbox())
        .map(DeclarationField::from_field);
    let from_table = application_table_fields(&metadata.column_names);

    let mut candidates: IndexMap<String, DeclarationField> = IndexMap::new();
    for candidate in from_form.chain(from_table) {
        candidates.entry(candidate.name.clone()).or_insert(candidate);
    }
    candidates.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn labels_split_words() {
        assert_eq!(column_label("applicant_name"), "Applicant Name");
        assert_eq!(column_label("dateOfBirth"), "Date Of Birth");
    }

    #[test]
    fn blocklist_is_case_insensitive() {
        for column in ["applicationId", "CreatedAt", "updated_by", "deletedOn", "userPassword", "AUTH_TOKEN", "withholdReason"] {
            assert!(is_blocked_column(column), "{column} should be blocked");
        }
        assert!(!is_blocked_column("applicantName"));
        assert!(!is_blocked_column("identityProof"));
    }

    #[test]
    fn table_fields_skip_blocked_columns() {
        let fields = application_table_fields(&["applicantName", "applicationId", " ", "village_name"]);
        let labels: Vec<_> = fields.iter().map(|field| field.label.as_str()).collect();
        assert_eq!(labels, vec!["Applicant Name", "Village Name"]);
        assert!(fields.iter().all(|field| field.source == DeclarationSource::ApplicationTable));
    }

    #[test]
    fn candidates_prefer_form_fields() {
        let metadata: FormMetadata = serde_json::from_value(json!({
            "status": true,
            "sections": [{
                "fields": [
                    {
                        "id": "f1", "name": "applicantName", "label": "Name of Applicant", "type": "select",
                        "options": "Yes;No",
                        "additionalFields": { "Yes": [{ "id": "f2", "name": "reason", "label": "Reason" }] }
                    },
                    { "id": "f3", "name": "consent", "isConsentCheckbox": true }
                ]
            }],
            "columnNames": ["applicantName", "district", "createdAt"]
        }))
        .expect("metadata");

        let candidates = declaration_candidates(&metadata);
        let names: Vec<_> = candidates.iter().map(|field| field.name.as_str()).collect();
        assert_eq!(names, vec!["applicantName", "reason", "district"]);
        assert_eq!(candidates[0].label, "Name of Applicant");
        assert_eq!(candidates[0].source, DeclarationSource::FormDesigner);
        assert_eq!(candidates[2].source, DeclarationSource::ApplicationTable);
    }
}
