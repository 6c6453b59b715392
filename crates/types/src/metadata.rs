//! Inbound payload of the form-metadata service.
//!
//! Section fields are kept as raw JSON so that a single malformed entry cannot reject the
//! whole payload; consumers normalize them on use.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::field::{FieldRecord, normalize_values};

/// Response describing a service's form sections and backing table columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FormMetadata {
    pub status: bool,
    pub sections: Vec<FormSection>,
    /// Column names of the application table.
    pub column_names: Vec<String>,
}

impl FormMetadata {
    /// Normalized records of every section, in section order.
    pub fn form_fields(&self) -> Vec<FieldRecord> {
        self.sections.iter().flat_map(FormSection::normalized_fields).collect()
    }
}

/// One section of a service form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FormSection {
    pub title: Option<String>,
    pub fields: Vec<JsonValue>,
}

impl FormSection {
    /// Normalized records of this section.
    pub fn normalized_fields(&self) -> Vec<FieldRecord> {
        normalize_values(&JsonValue::Array(self.fields.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_fields_concatenate_sections() {
        let metadata: FormMetadata = serde_json::from_str(
            r#"{
                "status": true,
                "sections": [
                    { "title": "Applicant", "fields": [{ "name": "applicantName" }, { "name": "district", "type": "select" }] },
                    { "fields": [{ "name": "photo", "type": "file", "accept": ".png" }] }
                ],
                "columnNames": ["applicantName"]
            }"#,
        )
        .expect("deserialize metadata");
        let names: Vec<_> = metadata.form_fields().into_iter().map(|field| field.name).collect();
        assert_eq!(names, vec!["applicantName", "district", "photo"]);
    }
}
