//! Total, pure normalization of partial or legacy field records.
//!
//! Stored schemas come from older designer versions and hand-edited JSON, so every
//! attribute of the wire shape is accepted as an arbitrary JSON value and coerced to its
//! typed counterpart. Nothing here fails: malformed attributes fall back to their defaults.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue, json};
use uuid::Uuid;

use super::{
    AdditionalFields, CheckboxDependency, ConsentConfig, DEFAULT_SPAN, Declaration, DeclarationField, DeclarationSource,
    DependentLength, EnclosureDependency, FieldKind, FieldOption, FieldRecord, FieldType, LengthBound, MAX_SPAN, OptionsConfig,
    OptionsType, dedupe_options, parse_options_text,
};

const DEPENDENT_ON_KEY: &str = "dependentOn";
const CONDITION_KEY: &str = "condition";

/// Flat wire shape of a field record with every attribute optional and loosely typed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawFieldRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options_type: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editable: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_functions: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformation_functions: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_fields: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependent_on: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependent_options: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_dependent_enclosure: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependent_field: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependent_values: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_checkbox_dependent: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkbox_dependent_on: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkbox_dependent_value: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_consent_checkbox: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_declaration: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration_fields: Option<JsonValue>,
}

/// Generates a fresh field identifier.
pub fn generate_field_id() -> String {
    Uuid::new_v4().to_string()
}

/// Produces a complete, defaulted [`FieldRecord`] from a partial wire record.
///
/// Nested additional fields are normalized recursively with [`normalize_list`], so the
/// resulting tree is fully defaulted regardless of input depth.
pub fn normalize(raw: RawFieldRecord) -> FieldRecord {
    let is_consent_checkbox = flag(&raw.is_consent_checkbox);
    let field_type = if is_consent_checkbox {
        FieldType::Checkbox
    } else {
        raw.r#type
            .as_ref()
            .and_then(coerce_text)
            .and_then(|text| FieldType::parse_lenient(&text))
            .unwrap_or_default()
    };

    let id = raw
        .id
        .as_ref()
        .and_then(coerce_text)
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(generate_field_id);

    let kind = if is_consent_checkbox {
        FieldKind::Consent(ConsentConfig {
            is_declaration: flag(&raw.is_declaration),
            declaration: Declaration {
                text: raw.declaration.as_ref().and_then(coerce_text).unwrap_or_default(),
                fields: raw.declaration_fields.as_ref().map(coerce_declaration_fields).unwrap_or_default(),
            },
        })
    } else {
        FieldKind::Options(options_config(&raw, field_type))
    };

    let span = raw
        .span
        .as_ref()
        .and_then(coerce_u32)
        .map(|span| span.clamp(1, u32::from(MAX_SPAN)) as u8)
        .unwrap_or(DEFAULT_SPAN);

    FieldRecord {
        id,
        field_type,
        label: raw.label.as_ref().and_then(coerce_text).unwrap_or_default(),
        name: raw.name.as_ref().and_then(coerce_text).unwrap_or_default(),
        min_length: raw.min_length.as_ref().and_then(coerce_length_bound),
        max_length: raw.max_length.as_ref().and_then(coerce_length_bound),
        span,
        required: flag(&raw.required),
        editable: raw.editable.as_ref().and_then(coerce_bool).unwrap_or(true),
        accept: if field_type.accepts_files() {
            raw.accept.as_ref().and_then(coerce_text).filter(|accept| !accept.is_empty())
        } else {
            None
        },
        validation_functions: raw.validation_functions.as_ref().map(coerce_identifier_set).unwrap_or_default(),
        transformation_functions: raw.transformation_functions.as_ref().map(coerce_identifier_set).unwrap_or_default(),
        additional_fields: raw.additional_fields.as_ref().map(coerce_additional_fields).unwrap_or_default(),
        kind,
    }
}

/// Normalizes a list of records, regenerating ids that repeat within the list.
pub fn normalize_list(raw_fields: impl IntoIterator<Item = RawFieldRecord>) -> Vec<FieldRecord> {
    let mut seen_ids = IndexSet::new();
    raw_fields
        .into_iter()
        .map(|raw| {
            let mut field = normalize(raw);
            while !seen_ids.insert(field.id.clone()) {
                field.id = generate_field_id();
            }
            field
        })
        .collect()
}

/// Normalizes an arbitrary JSON value. Non-object input yields a default record.
pub fn normalize_value(value: &JsonValue) -> FieldRecord {
    normalize(raw_from_value(value))
}

/// Normalizes a JSON array (or a single object) of records.
pub fn normalize_values(value: &JsonValue) -> Vec<FieldRecord> {
    match value {
        JsonValue::Array(items) => normalize_list(items.iter().map(raw_from_value)),
        JsonValue::Object(_) => normalize_list([raw_from_value(value)]),
        _ => Vec::new(),
    }
}

fn raw_from_value(value: &JsonValue) -> RawFieldRecord {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

fn options_config(raw: &RawFieldRecord, field_type: FieldType) -> OptionsConfig {
    let options = raw.options.as_ref().map(coerce_options).unwrap_or_default();

    let options_type = if field_type == FieldType::Select
        && raw
            .options_type
            .as_ref()
            .and_then(coerce_text)
            .is_some_and(|text| text.trim().eq_ignore_ascii_case("dependent"))
    {
        OptionsType::Dependent
    } else {
        OptionsType::Static
    };

    let (dependent_on, dependent_options) = if options_type == OptionsType::Dependent {
        (
            non_empty_text(&raw.dependent_on),
            raw.dependent_options.as_ref().map(coerce_dependent_options).unwrap_or_default(),
        )
    } else {
        (None, IndexMap::new())
    };

    let enclosure = (field_type == FieldType::Enclosure && flag(&raw.is_dependent_enclosure)).then(|| EnclosureDependency {
        dependent_field: raw.dependent_field.as_ref().and_then(coerce_text).unwrap_or_default(),
        dependent_values: raw.dependent_values.as_ref().map(coerce_string_list).unwrap_or_default(),
    });

    let checkbox = (field_type == FieldType::Checkbox && flag(&raw.is_checkbox_dependent)).then(|| CheckboxDependency {
        dependent_on: raw.checkbox_dependent_on.as_ref().and_then(coerce_text).unwrap_or_default(),
        dependent_value: raw.checkbox_dependent_value.as_ref().and_then(coerce_text).unwrap_or_default(),
    });

    OptionsConfig {
        options,
        options_type,
        dependent_on,
        dependent_options,
        enclosure,
        checkbox,
    }
}

fn flag(value: &Option<JsonValue>) -> bool {
    value.as_ref().and_then(coerce_bool).unwrap_or(false)
}

fn non_empty_text(value: &Option<JsonValue>) -> Option<String> {
    value.as_ref().and_then(coerce_text).filter(|text| !text.trim().is_empty())
}

fn coerce_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(text) => Some(text.clone()),
        JsonValue::Number(number) => Some(number.to_string()),
        JsonValue::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn coerce_bool(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(flag) => Some(*flag),
        JsonValue::Number(number) => number.as_f64().map(|number| number != 0.0),
        JsonValue::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_u32(value: &JsonValue) -> Option<u32> {
    match value {
        JsonValue::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|float| *float >= 0.0 && float.fract() == 0.0).map(|float| float as u64))
            .and_then(|number| u32::try_from(number).ok()),
        JsonValue::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_string_list(value: &JsonValue) -> Vec<String> {
    let items = match value {
        JsonValue::Array(items) => items.iter().filter_map(coerce_text).collect(),
        other => coerce_text(other).into_iter().collect::<Vec<_>>(),
    };
    items.into_iter().filter(|item| !item.trim().is_empty()).collect()
}

fn coerce_identifier_set(value: &JsonValue) -> IndexSet<String> {
    match value {
        JsonValue::String(text) => text
            .split([',', ';'])
            .map(str::trim)
            .filter(|identifier| !identifier.is_empty())
            .map(str::to_string)
            .collect(),
        other => coerce_string_list(other).into_iter().map(|identifier| identifier.trim().to_string()).collect(),
    }
}

fn coerce_option(value: &JsonValue) -> Option<FieldOption> {
    match value {
        JsonValue::Object(map) => {
            let value = map.get("value").and_then(coerce_text);
            let label = map.get("label").and_then(coerce_text);
            match (value, label) {
                (Some(value), Some(label)) => Some(FieldOption::new(value, label)),
                (Some(value), None) => Some(FieldOption::from_value(value)),
                (None, Some(label)) => Some(FieldOption::from_value(label)),
                (None, None) => None,
            }
        }
        other => coerce_text(other).map(FieldOption::from_value),
    }
}

fn coerce_options(value: &JsonValue) -> Vec<FieldOption> {
    match value {
        JsonValue::String(text) => parse_options_text(text),
        JsonValue::Array(items) => dedupe_options(items.iter().filter_map(coerce_option).collect()),
        _ => Vec::new(),
    }
}

fn coerce_dependent_options(value: &JsonValue) -> IndexMap<String, Vec<FieldOption>> {
    let JsonValue::Object(map) = value else {
        return IndexMap::new();
    };
    map.iter().map(|(key, options)| (key.clone(), coerce_options(options))).collect()
}

fn coerce_length_bound(value: &JsonValue) -> Option<LengthBound> {
    if let Some(bound) = coerce_u32(value) {
        return Some(LengthBound::Fixed(bound));
    }
    let JsonValue::Object(map) = value else {
        return None;
    };
    let dependent_on = map.get(DEPENDENT_ON_KEY).and_then(coerce_text)?;
    let bounds = map
        .iter()
        .filter(|(key, _)| key.as_str() != DEPENDENT_ON_KEY && key.as_str() != CONDITION_KEY)
        .filter_map(|(key, bound)| coerce_u32(bound).map(|bound| (key.clone(), bound)))
        .collect();
    let condition = map
        .get(CONDITION_KEY)
        .and_then(coerce_text)
        .filter(|condition| !condition.trim().is_empty());
    Some(LengthBound::Dependent(DependentLength {
        dependent_on,
        bounds,
        condition,
    }))
}

fn coerce_declaration_fields(value: &JsonValue) -> Vec<DeclarationField> {
    let JsonValue::Array(items) = value else {
        return Vec::new();
    };
    let mut seen_ids = IndexSet::new();
    items
        .iter()
        .filter_map(|item| {
            let JsonValue::Object(map) = item else {
                return None;
            };
            let text = |key: &str| map.get(key).and_then(coerce_text).unwrap_or_default();
            let name = text("name");
            let id = Some(text("id")).filter(|id| !id.is_empty()).unwrap_or_else(|| name.clone());
            if id.is_empty() {
                return None;
            }
            let source = match text("source").trim().to_ascii_lowercase().as_str() {
                "application_table" => DeclarationSource::ApplicationTable,
                _ => DeclarationSource::FormDesigner,
            };
            Some(DeclarationField {
                id,
                label: text("label"),
                field_type: FieldType::parse_lenient(&text("type")).unwrap_or_default(),
                required: map.get("required").and_then(coerce_bool).unwrap_or(false),
                source,
                name,
            })
        })
        .filter(|field| seen_ids.insert(field.id.clone()))
        .collect()
}

fn coerce_additional_fields(value: &JsonValue) -> AdditionalFields {
    let JsonValue::Object(map) = value else {
        return AdditionalFields::default();
    };
    map.iter()
        .map(|(option_value, children)| {
            let children = match children {
                JsonValue::Array(_) => normalize_values(children),
                _ => Vec::new(),
            };
            (option_value.clone(), children)
        })
        .collect::<IndexMap<_, _>>()
        .into()
}

fn length_bound_to_json(bound: &LengthBound) -> JsonValue {
    match bound {
        LengthBound::Fixed(bound) => json!(bound),
        LengthBound::Dependent(dependent) => {
            let mut map = JsonMap::new();
            map.insert(DEPENDENT_ON_KEY.to_string(), json!(dependent.dependent_on));
            for (option_value, bound) in &dependent.bounds {
                map.insert(option_value.clone(), json!(bound));
            }
            if let Some(condition) = &dependent.condition {
                map.insert(CONDITION_KEY.to_string(), json!(condition));
            }
            JsonValue::Object(map)
        }
    }
}

fn options_to_json(options: &[FieldOption]) -> JsonValue {
    JsonValue::Array(
        options
            .iter()
            .map(|option| json!({ "value": option.value, "label": option.label }))
            .collect(),
    )
}

fn fields_to_json(fields: Vec<FieldRecord>) -> JsonValue {
    JsonValue::Array(
        fields
            .into_iter()
            .map(|field| serde_json::to_value(RawFieldRecord::from(field)).unwrap_or_default())
            .collect(),
    )
}

impl From<RawFieldRecord> for FieldRecord {
    fn from(raw: RawFieldRecord) -> Self {
        normalize(raw)
    }
}

impl From<FieldRecord> for RawFieldRecord {
    fn from(field: FieldRecord) -> Self {
        let FieldRecord {
            id,
            field_type,
            label,
            name,
            min_length,
            max_length,
            span,
            required,
            editable,
            accept,
            validation_functions,
            transformation_functions,
            additional_fields,
            kind,
        } = field;

        let additional_fields = additional_fields
            .into_inner()
            .into_iter()
            .map(|(option_value, children)| (option_value, fields_to_json(children)))
            .collect::<JsonMap<_, _>>();

        let mut raw = RawFieldRecord {
            id: Some(json!(id)),
            r#type: Some(json!(field_type.as_str())),
            label: Some(json!(label)),
            name: Some(json!(name)),
            min_length: min_length.as_ref().map(length_bound_to_json),
            max_length: max_length.as_ref().map(length_bound_to_json),
            span: Some(json!(span)),
            required: Some(json!(required)),
            editable: Some(json!(editable)),
            accept: accept.map(JsonValue::String),
            validation_functions: Some(json!(validation_functions)),
            transformation_functions: Some(json!(transformation_functions)),
            additional_fields: Some(JsonValue::Object(additional_fields)),
            ..RawFieldRecord::default()
        };

        match kind {
            FieldKind::Options(config) => {
                raw.options = Some(options_to_json(&config.options));
                raw.options_type = Some(json!(match config.options_type {
                    OptionsType::Static => "static",
                    OptionsType::Dependent => "dependent",
                }));
                raw.dependent_on = config.dependent_on.map(JsonValue::String);
                if !config.dependent_options.is_empty() {
                    raw.dependent_options = Some(JsonValue::Object(
                        config
                            .dependent_options
                            .iter()
                            .map(|(key, options)| (key.clone(), options_to_json(options)))
                            .collect(),
                    ));
                }
                if let Some(enclosure) = config.enclosure {
                    raw.is_dependent_enclosure = Some(json!(true));
                    raw.dependent_field = Some(json!(enclosure.dependent_field));
                    raw.dependent_values = Some(json!(enclosure.dependent_values));
                }
                if let Some(checkbox) = config.checkbox {
                    raw.is_checkbox_dependent = Some(json!(true));
                    raw.checkbox_dependent_on = Some(json!(checkbox.dependent_on));
                    raw.checkbox_dependent_value = Some(json!(checkbox.dependent_value));
                }
            }
            FieldKind::Consent(consent) => {
                raw.is_consent_checkbox = Some(json!(true));
                raw.is_declaration = Some(json!(consent.is_declaration));
                raw.declaration = Some(json!(consent.declaration.text));
                raw.declaration_fields = Some(serde_json::to_value(&consent.declaration.fields).unwrap_or_default());
            }
        }
        raw
    }
}
