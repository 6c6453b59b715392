//! Designer configuration persisted as JSON.
//!
//! The file lives in the standard configuration directory
//! (`~/.config/portal/designer.json` on most platforms) unless
//! `PORTAL_DESIGNER_CONFIG_PATH` points elsewhere. A missing file yields defaults; a file
//! that cannot be parsed is logged and ignored.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dirs_next::{config_dir, home_dir};
use portal_types::{DEFAULT_SPAN, FieldRecord, FieldType, MAX_SPAN};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "PORTAL_DESIGNER_CONFIG_PATH";

pub const CONFIG_FILE_NAME: &str = "designer.json";

/// Error surfaced when reading or writing the configuration fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("designer config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("designer config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Save-time policy and editor defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DesignerConfig {
    /// Case-insensitive substrings rejected in labels, names and option text.
    pub restricted_terms: Vec<String>,
    /// Reject schemas whose dependency references form a cycle.
    pub reject_dependency_cycles: bool,
    /// Reject declarations containing placeholders with no referenced field.
    pub strict_placeholders: bool,
    /// Span given to fields created by the editor.
    pub default_span: u8,
}

impl Default for DesignerConfig {
    fn default() -> Self {
        Self {
            restricted_terms: vec!["withhold".to_string()],
            reject_dependency_cycles: true,
            strict_placeholders: false,
            default_span: DEFAULT_SPAN,
        }
    }
}

impl DesignerConfig {
    /// Loads the configuration from the default path.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str::<Self>(&data) {
                Ok(config) => Ok(config.sanitized()),
                Err(error) => {
                    warn!(
                        path = %path.display(),
                        error = %error,
                        "Failed to parse designer config; using defaults"
                    );
                    Ok(Self::default())
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(ConfigError::Io(error)),
        }
    }

    /// Writes pretty JSON to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&default_config_path())
    }

    /// A fresh record of `field_type` laid out with the configured span.
    pub fn new_field(&self, field_type: FieldType) -> FieldRecord {
        FieldRecord {
            span: self.default_span.clamp(1, MAX_SPAN),
            ..FieldRecord::new(field_type)
        }
    }

    fn sanitized(mut self) -> Self {
        self.default_span = self.default_span.clamp(1, MAX_SPAN);
        self.restricted_terms.retain(|term| !term.trim().is_empty());
        self
    }
}

/// Resolved configuration path, honouring [`CONFIG_PATH_ENV`].
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portal")
        .join(CONFIG_FILE_NAME)
}

fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(path)
}
