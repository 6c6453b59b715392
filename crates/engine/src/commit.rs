//! The save path for field schemas and player action forms.
//!
//! Normalization never rejects input, so every policy check lives here. Hard failures are
//! [`CommitError`]s; softer authoring slack (orphaned tree keys, unknown function ids,
//! dangling references) is collected as [`SchemaWarning`]s and logged.

use std::collections::HashMap;
use std::fmt;

use portal_types::{DEFAULT_ACTION_FIELD, FieldRecord, Player};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::action_form::{PlayerNeighbours, apply_action_form};
use crate::additional_fields::{flatten_fields, splice_field, stale_keys};
use crate::config::DesignerConfig;
use crate::declaration::unmatched_placeholders;
use crate::dependency::DependencyResolver;
use crate::functions::FunctionRegistry;

/// Reasons a save is refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommitError {
    #[error("Field {field_id} uses the restricted term \"{term}\" in its {location}")]
    RestrictedTerm {
        field_id: String,
        location: String,
        term: String,
    },
    #[error("Field name \"{name}\" is used by both {first_id} and {second_id}")]
    DuplicateName {
        name: String,
        first_id: String,
        second_id: String,
    },
    #[error("Dependency cycle: {}", .path.join(" -> "))]
    DependencyCycle { path: Vec<String> },
    #[error("Declaration of field {field_id} references unknown placeholder {{{placeholder}}}")]
    UnmatchedPlaceholder { field_id: String, placeholder: String },
}

/// Accepted but suspicious authoring state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaWarning {
    StaleKey { field_id: String, option_value: String },
    UnmatchedPlaceholder { field_id: String, placeholder: String },
    UnknownFunction { field_id: String, identifier: String },
    UnresolvedReference { field_id: String, reference: String },
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleKey { field_id, option_value } => {
                write!(f, "field {field_id} keeps additional fields for removed option \"{option_value}\"")
            }
            Self::UnmatchedPlaceholder { field_id, placeholder } => {
                write!(f, "declaration of field {field_id} has no field for placeholder {{{placeholder}}}")
            }
            Self::UnknownFunction { field_id, identifier } => {
                write!(f, "field {field_id} references unknown function \"{identifier}\"")
            }
            Self::UnresolvedReference { field_id, reference } => {
                write!(f, "field {field_id} depends on unknown field \"{reference}\"")
            }
        }
    }
}

/// A committed value together with the warnings raised while checking it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitReport<T> {
    pub committed: T,
    pub warnings: Vec<SchemaWarning>,
}

/// Applies the save-time policy of a [`DesignerConfig`].
#[derive(Debug, Clone, Copy)]
pub struct SchemaCommitter<'a> {
    config: &'a DesignerConfig,
    registry: &'a FunctionRegistry,
}

impl<'a> SchemaCommitter<'a> {
    pub fn new(config: &'a DesignerConfig, registry: &'a FunctionRegistry) -> Self {
        Self { config, registry }
    }

    /// Saves an edited field into `schema`.
    ///
    /// The edited record (nested tree included) goes through the naming guard, then it is
    /// spliced in by id, or appended when new, and the whole schema is checked structurally.
    pub fn commit_field(&self, schema: Vec<FieldRecord>, field: FieldRecord) -> Result<CommitReport<Vec<FieldRecord>>, CommitError> {
        check_restricted_terms(&field, &self.config.restricted_terms)?;
        let field_id = field.id.clone();
        let (mut schema, replaced) = splice_field(schema, field.clone());
        if !replaced {
            schema.push(field);
        }
        let warnings = self.check_structure(&schema)?;
        info!(field_id = %field_id, replaced, warning_count = warnings.len(), "committed field");
        Ok(CommitReport {
            committed: schema,
            warnings,
        })
    }

    /// Saves a complete field list.
    pub fn commit_schema(&self, schema: Vec<FieldRecord>) -> Result<CommitReport<Vec<FieldRecord>>, CommitError> {
        for field in &schema {
            check_restricted_terms(field, &self.config.restricted_terms)?;
        }
        let warnings = self.check_structure(&schema)?;
        info!(field_count = schema.len(), warning_count = warnings.len(), "committed schema");
        Ok(CommitReport {
            committed: schema,
            warnings,
        })
    }

    /// Regenerates the `defaultAction` field of `player` and saves its action form.
    ///
    /// The derived field is exempt from the naming guard since its option labels come from
    /// the permission flags.
    pub fn commit_action_form(&self, player: Player, neighbours: &PlayerNeighbours<'_>) -> Result<CommitReport<Player>, CommitError> {
        let player = apply_action_form(player, neighbours);
        for field in player.action_form.iter().filter(|field| field.name != DEFAULT_ACTION_FIELD) {
            check_restricted_terms(field, &self.config.restricted_terms)?;
        }
        let warnings = self.check_structure(&player.action_form)?;
        info!(player_id = %player.id, warning_count = warnings.len(), "committed action form");
        Ok(CommitReport {
            committed: player,
            warnings,
        })
    }

    fn check_structure(&self, schema: &[FieldRecord]) -> Result<Vec<SchemaWarning>, CommitError> {
        check_unique_names(schema)?;

        let resolver = DependencyResolver::new(schema);
        if self.config.reject_dependency_cycles
            && let Some(path) = resolver.find_cycle()
        {
            return Err(CommitError::DependencyCycle { path });
        }

        let mut warnings = Vec::new();
        for field in flatten_fields(schema) {
            for option_value in stale_keys(field) {
                warnings.push(SchemaWarning::StaleKey {
                    field_id: field.id.clone(),
                    option_value,
                });
            }
            if let Some(consent) = field.consent() {
                for placeholder in unmatched_placeholders(&consent.declaration) {
                    if self.config.strict_placeholders {
                        return Err(CommitError::UnmatchedPlaceholder {
                            field_id: field.id.clone(),
                            placeholder,
                        });
                    }
                    warnings.push(SchemaWarning::UnmatchedPlaceholder {
                        field_id: field.id.clone(),
                        placeholder,
                    });
                }
            }
            for identifier in self.registry.unknown_identifiers(field) {
                warnings.push(SchemaWarning::UnknownFunction {
                    field_id: field.id.clone(),
                    identifier,
                });
            }
        }
        for (field_id, reference) in resolver.unresolved_references() {
            warnings.push(SchemaWarning::UnresolvedReference { field_id, reference });
        }

        for warning in &warnings {
            warn!(warning = %warning, "schema warning");
        }
        Ok(warnings)
    }
}

/// Rejects `field` or any nested record whose label, name or option text contains one of
/// `terms`, compared case-insensitively.
pub fn check_restricted_terms(field: &FieldRecord, terms: &[String]) -> Result<(), CommitError> {
    let terms: Vec<String> = terms
        .iter()
        .map(|term| term.trim().to_lowercase())
        .filter(|term| !term.is_empty())
        .collect();
    if terms.is_empty() {
        return Ok(());
    }

    for record in flatten_fields(std::slice::from_ref(field)) {
        let mut candidates = vec![("label", record.label.as_str()), ("name", record.name.as_str())];
        for option in record.authored_options() {
            candidates.push(("option label", option.label.as_str()));
            candidates.push(("option value", option.value.as_str()));
        }
        for (location, text) in candidates {
            let lowered = text.to_lowercase();
            if let Some(term) = terms.iter().find(|term| lowered.contains(term.as_str())) {
                return Err(CommitError::RestrictedTerm {
                    field_id: record.id.clone(),
                    location: location.to_string(),
                    term: term.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Rejects two records of the flattened set sharing a non-empty name.
pub fn check_unique_names(schema: &[FieldRecord]) -> Result<(), CommitError> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for field in flatten_fields(schema) {
        let name = field.name.trim();
        if name.is_empty() {
            continue;
        }
        if let Some(first_id) = seen.insert(name, field.id.as_str()) {
            return Err(CommitError::DuplicateName {
                name: name.to_string(),
                first_id: first_id.to_string(),
                second_id: field.id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_types::{ActionFormOptions, FieldType, PlayerPermissions, normalize_value, normalize_values};
    use serde_json::json;

    fn committer_parts() -> (DesignerConfig, FunctionRegistry) {
        (DesignerConfig::default(), FunctionRegistry::builtin())
    }

    fn labelled(label: &str) -> FieldRecord {
        normalize_value(&json!({ "id": "status", "label": label, "name": "status" }))
    }

    #[test]
    fn naming_guard_rejects_restricted_labels() {
        let (config, registry) = committer_parts();
        let committer = SchemaCommitter::new(&config, &registry);
        let rejected = committer.commit_field(Vec::new(), labelled("Can Withhold Status"));
        assert_eq!(
            rejected,
            Err(CommitError::RestrictedTerm {
                field_id: "status".into(),
                location: "label".into(),
                term: "withhold".into(),
            })
        );

        let accepted = committer.commit_field(Vec::new(), labelled("Status")).expect("accepted");
        assert_eq!(accepted.committed.len(), 1);
        assert!(accepted.warnings.is_empty());
    }

    #[test]
    fn naming_guard_reaches_nested_and_dependent_options() {
        let nested = normalize_value(&json!({
            "id": "p", "name": "p", "type": "select", "options": "Yes;No",
            "additionalFields": { "Yes": [{ "id": "c", "name": "c", "type": "select", "options": "Keep;WITHHELD;Withholding" }] }
        }));
        let error = check_restricted_terms(&nested, &["withhold".to_string()]).unwrap_err();
        assert!(matches!(error, CommitError::RestrictedTerm { ref field_id, ref location, .. } if field_id == "c" && location == "option label"));

        let dependent = normalize_value(&json!({
            "id": "d", "name": "d", "type": "select", "optionsType": "dependent", "dependentOn": "p",
            "dependentOptions": { "Yes": "withhold it" }
        }));
        assert!(check_restricted_terms(&dependent, &["withhold".to_string()]).is_err());
        assert!(check_restricted_terms(&dependent, &[]).is_ok());
    }

    #[test]
    fn commit_replaces_existing_field_by_id() {
        let (config, registry) = committer_parts();
        let committer = SchemaCommitter::new(&config, &registry);
        let schema = normalize_values(&json!([{ "id": "a", "name": "a" }, { "id": "b", "name": "b" }]));
        let mut edited = schema[0].clone();
        edited.label = "Applicant".into();
        let report = committer.commit_field(schema, edited).expect("committed");
        assert_eq!(report.committed.len(), 2);
        assert_eq!(report.committed[0].label, "Applicant");
    }

    #[test]
    fn duplicate_names_are_rejected_across_nesting() {
        let schema = normalize_values(&json!([
            { "id": "a", "name": "village", "type": "select", "options": "Yes",
              "additionalFields": { "Yes": [{ "id": "b", "name": "village" }] } }
        ]));
        assert_eq!(
            check_unique_names(&schema),
            Err(CommitError::DuplicateName {
                name: "village".into(),
                first_id: "a".into(),
                second_id: "b".into(),
            })
        );
    }

    #[test]
    fn cycles_follow_configuration() {
        let schema = normalize_values(&json!([
            { "id": "a", "name": "a", "type": "select", "optionsType": "dependent", "dependentOn": "b" },
            { "id": "b", "name": "b", "type": "select", "optionsType": "dependent", "dependentOn": "a" }
        ]));
        let (mut config, registry) = committer_parts();
        let error = SchemaCommitter::new(&config, &registry).commit_schema(schema.clone()).unwrap_err();
        assert!(matches!(error, CommitError::DependencyCycle { .. }));

        config.reject_dependency_cycles = false;
        assert!(SchemaCommitter::new(&config, &registry).commit_schema(schema).is_ok());
    }

    #[test]
    fn warnings_collect_authoring_slack() {
        let schema = normalize_values(&json!([
            { "id": "a", "name": "a", "type": "select", "options": "Yes",
              "additionalFields": { "Yes": [], "Gone": [] }, "validationFunctions": "mystery" },
            { "id": "b", "name": "b", "type": "select", "optionsType": "dependent", "dependentOn": "ghost" },
            { "id": "c", "name": "c", "isConsentCheckbox": true, "declaration": "I, {applicant}, agree" }
        ]));
        let (mut config, registry) = committer_parts();
        let report = SchemaCommitter::new(&config, &registry).commit_schema(schema.clone()).expect("committed");
        assert_eq!(
            report.warnings,
            vec![
                SchemaWarning::StaleKey {
                    field_id: "a".into(),
                    option_value: "Gone".into()
                },
                SchemaWarning::UnknownFunction {
                    field_id: "a".into(),
                    identifier: "mystery".into()
                },
                SchemaWarning::UnmatchedPlaceholder {
                    field_id: "c".into(),
                    placeholder: "applicant".into()
                },
                SchemaWarning::UnresolvedReference {
                    field_id: "b".into(),
                    reference: "ghost".into()
                },
            ]
        );

        config.strict_placeholders = true;
        let error = SchemaCommitter::new(&config, &registry).commit_schema(schema).unwrap_err();
        assert!(matches!(error, CommitError::UnmatchedPlaceholder { .. }));
    }

    #[test]
    fn action_form_commit_exempts_derived_field() {
        let (config, registry) = committer_parts();
        let player = Player {
            id: "officer".into(),
            permissions: PlayerPermissions {
                can_forward_to_player: true,
                can_withhold: true,
                ..PlayerPermissions::default()
            },
            action_form_options: ActionFormOptions {
                sanction: true,
                withhold: true,
                forward_to_player: true,
                ..ActionFormOptions::default()
            },
            action_form: vec![FieldRecord {
                name: "remarks".into(),
                label: "Remarks".into(),
                ..FieldRecord::new(FieldType::Text)
            }],
            ..Player::default()
        };
        let report = SchemaCommitter::new(&config, &registry)
            .commit_action_form(player, &PlayerNeighbours::default())
            .expect("committed");
        let options = report.committed.default_action_field().expect("derived").options().to_vec();
        let values: Vec<_> = options.iter().map(|option| option.value.as_str()).collect();
        assert_eq!(values, vec!["forwardToPlayer", "withhold"]);

        let mut player = report.committed;
        player.action_form[0].label = "Withhold reason".into();
        assert!(
            SchemaCommitter::new(&config, &registry)
                .commit_action_form(player, &PlayerNeighbours::default())
                .is_err()
        );
    }
}
