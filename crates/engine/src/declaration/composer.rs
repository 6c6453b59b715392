//! Stateful editing of a consent checkbox's declaration.

use portal_types::{Declaration, DeclarationField};
use tracing::debug;

use super::{DeclarationError, TemplateCatalog, collapse_whitespace, preview};

/// Whether the declaration text currently comes from the catalog or was typed by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerMode {
    /// Text is the catalog template with this id and is never rewritten by field edits.
    Template(u8),
    /// Free text; adding and removing fields maintains `{name}` placeholders.
    Custom,
}

/// Keeps a declaration's placeholders and referenced field list consistent.
///
/// The composer owns its copy of the declaration; editors hand the result back to the
/// owning field with [`DeclarationComposer::into_declaration`].
#[derive(Debug, Clone)]
pub struct DeclarationComposer<'catalog> {
    catalog: &'catalog TemplateCatalog,
    declaration: Declaration,
    mode: ComposerMode,
}

impl<'catalog> DeclarationComposer<'catalog> {
    /// Starts editing `declaration`. Text equal to a catalog template opens in template mode.
    pub fn new(catalog: &'catalog TemplateCatalog, declaration: Declaration) -> Self {
        let mode = catalog
            .find_by_text(&declaration.text)
            .map(|template| ComposerMode::Template(template.id))
            .unwrap_or(ComposerMode::Custom);
        Self {
            catalog,
            declaration,
            mode,
        }
    }

    pub fn mode(&self) -> ComposerMode {
        self.mode
    }

    pub fn declaration(&self) -> &Declaration {
        &self.declaration
    }

    pub fn into_declaration(self) -> Declaration {
        self.declaration
    }

    /// Replaces the text wholesale with a catalog template and enters template mode.
    pub fn select_template(&mut self, template_id: u8) -> Result<&Declaration, DeclarationError> {
        let template = self
            .catalog
            .get(template_id)
            .ok_or(DeclarationError::UnknownTemplate { template_id })?;
        self.declaration.text = template.template.clone();
        self.mode = ComposerMode::Template(template_id);
        Ok(&self.declaration)
    }

    /// Sets free text and enters custom mode. Placeholders are not checked.
    pub fn set_custom_text(&mut self, text: impl Into<String>) -> &Declaration {
        self.declaration.text = text.into();
        self.mode = ComposerMode::Custom;
        &self.declaration
    }

    /// Appends `candidate` to the referenced fields unless its id is already present.
    ///
    /// In custom mode the `{name}` placeholder is appended to the text, separated by a single
    /// space. Returns false when the field was already referenced.
    pub fn add_field(&mut self, candidate: DeclarationField) -> bool {
        if self.declaration.fields.iter().any(|field| field.id == candidate.id) {
            debug!(field_id = %candidate.id, "declaration field already referenced");
            return false;
        }
        if self.mode == ComposerMode::Custom {
            let placeholder = candidate.placeholder();
            let existing = self.declaration.text.trim_end();
            self.declaration.text = if existing.is_empty() {
                placeholder
            } else {
                format!("{existing} {placeholder}")
            };
        }
        self.declaration.fields.push(candidate);
        true
    }

    /// Removes the referenced field with `field_id`.
    ///
    /// In custom mode every occurrence of its placeholder is stripped and repeated whitespace
    /// collapsed; template text is left as is.
    pub fn remove_field(&mut self, field_id: &str) -> Option<DeclarationField> {
        let index = self.declaration.fields.iter().position(|field| field.id == field_id)?;
        let removed = self.declaration.fields.remove(index);
        if self.mode == ComposerMode::Custom {
            let stripped = self.declaration.text.replace(&removed.placeholder(), "");
            self.declaration.text = collapse_whitespace(&stripped);
        }
        Some(removed)
    }

    /// Display rendering of the current declaration.
    pub fn preview(&self) -> String {
        preview(&self.declaration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_types::{DeclarationSource, FieldType};

    fn candidate(id: &str, name: &str, label: &str) -> DeclarationField {
        DeclarationField {
            id: id.to_string(),
            name: name.to_string(),
            label: label.to_string(),
            field_type: FieldType::Text,
            required: true,
            source: DeclarationSource::FormDesigner,
        }
    }

    #[test]
    fn custom_mode_keeps_placeholders_in_sync() {
        let catalog = TemplateCatalog::builtin();
        let mut composer = DeclarationComposer::new(&catalog, Declaration::default());
        assert_eq!(composer.mode(), ComposerMode::Custom);

        composer.set_custom_text("I, ");
        assert!(composer.add_field(candidate("f1", "applicantName", "Applicant Name")));
        assert!(composer.add_field(candidate("f2", "district", "District")));
        assert!(!composer.add_field(candidate("f1", "applicantName", "Applicant Name")));
        assert_eq!(composer.declaration().text, "I, {applicantName} {district}");

        let removed = composer.remove_field("f1").expect("f1 referenced");
        assert_eq!(removed.name, "applicantName");
        assert_eq!(composer.declaration().text, "I, {district}");
        assert!(!composer.declaration().text.contains("{applicantName}"));
        assert!(composer.remove_field("f1").is_none());
    }

    #[test]
    fn template_mode_leaves_text_alone() {
        let catalog = TemplateCatalog::builtin();
        let mut composer = DeclarationComposer::new(&catalog, Declaration::default());
        composer.select_template(3).expect("template 3 exists");
        let template_text = composer.declaration().text.clone();
        assert_eq!(composer.mode(), ComposerMode::Template(3));

        assert!(composer.add_field(candidate("f1", "applicantName", "Applicant Name")));
        assert_eq!(composer.declaration().text, template_text);
        assert_eq!(composer.declaration().fields.len(), 1);
        composer.remove_field("f1");
        assert_eq!(composer.declaration().text, template_text);
    }

    #[test]
    fn reopening_template_text_restores_template_mode() {
        let catalog = TemplateCatalog::builtin();
        let text = catalog.get(1).expect("template 1").template.clone();
        let composer = DeclarationComposer::new(
            &catalog,
            Declaration {
                text,
                fields: Vec::new(),
            },
        );
        assert_eq!(composer.mode(), ComposerMode::Template(1));
    }

    #[test]
    fn unknown_template_is_rejected() {
        let catalog = TemplateCatalog::builtin();
        let mut composer = DeclarationComposer::new(&catalog, Declaration::default());
        composer.set_custom_text("kept");
        assert!(matches!(
            composer.select_template(9),
            Err(DeclarationError::UnknownTemplate { template_id: 9 })
        ));
        assert_eq!(composer.declaration().text, "kept");
        assert_eq!(composer.mode(), ComposerMode::Custom);
    }
}
