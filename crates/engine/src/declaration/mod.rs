//! Declaration text handling for consent checkboxes.
//!
//! A declaration is free text whose `{fieldName}` placeholders reference other fields. The
//! [`DeclarationComposer`] keeps those placeholders and the referenced field list in step
//! while a designer edits; [`preview`] renders the text for display. Placeholders without a
//! referenced field are legal and stay verbatim.

pub mod catalog;
pub mod composer;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use portal_types::Declaration;
use regex::{Captures, Regex};
use thiserror::Error;

pub use catalog::{DeclarationTemplate, TemplateCatalog};
pub use composer::{ComposerMode, DeclarationComposer};

static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^{}\s]+)\}").expect("placeholder regex should compile"));

static REPEATED_BLANKS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("blank regex should compile"));

/// Errors raised by declaration editing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeclarationError {
    #[error("Unknown declaration template: {template_id}")]
    UnknownTemplate { template_id: u8 },
}

/// Placeholder names in order of appearance, duplicates included.
pub fn extract_placeholders(text: &str) -> Vec<String> {
    PLACEHOLDER_REGEX
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
        .collect()
}

/// Distinct placeholder names that match no referenced field.
pub fn unmatched_placeholders(declaration: &Declaration) -> Vec<String> {
    let mut unmatched: Vec<String> = Vec::new();
    for name in extract_placeholders(&declaration.text) {
        let referenced = declaration.fields.iter().any(|field| field.name == name);
        if !referenced && !unmatched.contains(&name) {
            unmatched.push(name);
        }
    }
    unmatched
}

/// Replaces every placeholder of a referenced field with a bracketed label marker.
///
/// The marker uses the field label, or its name when the label is blank. Placeholders that
/// match no referenced field are kept verbatim.
pub fn preview(declaration: &Declaration) -> String {
    let markers: HashMap<&str, &str> = declaration
        .fields
        .iter()
        .map(|field| {
            let label = if field.label.trim().is_empty() { &field.name } else { &field.label };
            (field.name.as_str(), label.as_str())
        })
        .collect();

    PLACEHOLDER_REGEX
        .replace_all(&declaration.text, |captures: &Captures| {
            let whole = captures.get(0).map(|matched| matched.as_str()).unwrap_or_default();
            let name = captures.get(1).map(|matched| matched.as_str()).unwrap_or_default();
            match markers.get(name) {
                Some(label) => format!("[{label}]"),
                None => whole.to_string(),
            }
        })
        .into_owned()
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    REPEATED_BLANKS_REGEX.replace_all(text, " ").trim().to_string()
}
