//! # Portal Engine
//!
//! The Portal Engine edits, checks and evaluates the dynamic form schemas of the service
//! portal: field lists whose records branch into nested additional fields, depend on each
//! other's values, reference each other from consent declarations, and make up the action
//! forms of workflow players.
//!
//! ## Usage
//!
//! ```rust
//! use portal_engine::{DesignerConfig, FunctionRegistry, SchemaCommitter, parse_schema_file};
//!
//! let temp_dir = tempfile::tempdir()?;
//! let schema_path = temp_dir.path().join("schema.yaml");
//! std::fs::write(&schema_path, r#"
//! fields:
//!   - name: ownsLand
//!     type: select
//!     options: "Yes;No"
//! "#)?;
//!
//! let fields = parse_schema_file(&schema_path)?;
//! let config = DesignerConfig::default();
//! let registry = FunctionRegistry::builtin();
//! let report = SchemaCommitter::new(&config, &registry).commit_schema(fields)?;
//! assert!(report.warnings.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`additional_fields`**: edits of the option-keyed child tree
//! - **`dependency`**: dependent options, visibility, length bounds and cycle detection
//! - **`declaration`**: template catalog, placeholder-preserving composer and preview
//! - **`action_form`**: derived `defaultAction` options of workflow players
//! - **`metadata`**: application-table columns and declaration candidates
//! - **`functions`**: named validators and transformers
//! - **`submission`**: submit-time validation of a form state
//! - **`commit`**: the save path (naming guard, uniqueness, cycles, warnings)
//! - **`config`**: designer configuration file

use std::{fs, path::Path};

use anyhow::{Context, Result};
use portal_types::{FieldRecord, FormMetadata, Player, RawFieldRecord, Workflow, normalize_list};
use serde::Deserialize;

pub mod action_form;
pub mod additional_fields;
pub mod commit;
pub mod config;
pub mod declaration;
pub mod dependency;
pub mod functions;
pub mod metadata;
pub mod submission;

pub use action_form::{PlayerNeighbours, WorkflowAction, apply_action_form, apply_workflow_action_forms, generate_action_options};
pub use additional_fields::{FieldMatch, FieldPath, PathSegment, flatten_fields};
pub use commit::{CommitError, CommitReport, SchemaCommitter, SchemaWarning};
pub use config::{ConfigError, DesignerConfig};
pub use declaration::{ComposerMode, DeclarationComposer, DeclarationError, DeclarationTemplate, TemplateCatalog};
pub use dependency::{DependencyResolver, FormState, LengthLimit, Visibility, detect_dependency_cycle};
pub use functions::FunctionRegistry;
pub use metadata::{application_table_fields, declaration_candidates};
pub use submission::{FieldError, SubmissionReport, validate_submission};

/// Loads a field schema from a YAML or JSON file.
///
/// Both a bare list of field records and a document with the list under `fields` are
/// accepted. Records are normalized while loading, so partial or legacy records never fail,
/// and ids repeated within one list are regenerated.
pub fn parse_schema_file(file_path: impl AsRef<Path>) -> Result<Vec<FieldRecord>> {
    let content = read_document(file_path.as_ref(), "schema")?;

    #[derive(Deserialize)]
    struct SchemaDocument {
        fields: Vec<RawFieldRecord>,
    }

    if let Ok(document) = serde_yaml::from_str::<SchemaDocument>(&content) {
        return Ok(normalize_list(document.fields));
    }
    if let Ok(fields) = serde_yaml::from_str::<Vec<RawFieldRecord>>(&content) {
        return Ok(normalize_list(fields));
    }

    anyhow::bail!(
        "Unsupported schema document format. Expected one of:\n\
         - A list of field records\n\
         - A document with field records under the 'fields' key\n\
         "
    );
}

/// Loads an ordered workflow from a YAML or JSON document with a `players` list.
pub fn parse_workflow_file(file_path: impl AsRef<Path>) -> Result<Workflow> {
    let file_path = file_path.as_ref();
    let content = read_document(file_path, "workflow")?;

    #[derive(Deserialize)]
    struct WorkflowDocument {
        #[serde(default)]
        name: Option<String>,
        players: Vec<Player>,
    }

    let document: WorkflowDocument = serde_yaml::from_str(&content)
        .with_context(|| format!("Workflow document must list its players under 'players': {}", file_path.display()))?;
    Ok(Workflow {
        name: document.name,
        players: document.players,
    })
}

/// Loads a form-metadata payload from a YAML or JSON file.
pub fn parse_metadata_file(file_path: impl AsRef<Path>) -> Result<FormMetadata> {
    let file_path = file_path.as_ref();
    let content = read_document(file_path, "metadata")?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse form metadata: {}", file_path.display()))
}

fn read_document(file_path: &Path, kind: &str) -> Result<String> {
    let bytes = fs::read(file_path).with_context(|| format!("Failed to read {kind} file: {}", file_path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
