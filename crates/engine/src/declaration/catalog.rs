//! Catalog of declaration templates offered by the composer.

use serde::{Deserialize, Serialize};

/// A selectable declaration text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeclarationTemplate {
    pub id: u8,
    pub name: String,
    pub template: String,
}

impl DeclarationTemplate {
    pub fn new(id: u8, name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            template: template.into(),
        }
    }
}

/// Ordered set of templates injected into a [`DeclarationComposer`](super::DeclarationComposer).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TemplateCatalog {
    templates: Vec<DeclarationTemplate>,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<DeclarationTemplate>) -> Self {
        Self { templates }
    }

    /// The five templates shipped with the designer.
    pub fn builtin() -> Self {
        Self::new(vec![
            DeclarationTemplate::new(
                1,
                "General Declaration",
                "I hereby declare that the information furnished above is true, complete and correct to the best of my knowledge and belief.",
            ),
            DeclarationTemplate::new(
                2,
                "Liability Declaration",
                "I hereby declare that the particulars given in this application are true. I understand that if any information is found to be false, my application is liable to be rejected and action may be taken against me under the applicable law.",
            ),
            DeclarationTemplate::new(
                3,
                "Document Authenticity",
                "I declare that the documents uploaded along with this application are genuine and have not been altered in any manner.",
            ),
            DeclarationTemplate::new(
                4,
                "Consent for Verification",
                "I consent to the department verifying the information and documents submitted with this application with the issuing authorities.",
            ),
            DeclarationTemplate::new(
                5,
                "Undertaking",
                "I undertake to inform the department of any change in the particulars furnished in this application and to abide by the terms and conditions of the service.",
            ),
        ])
    }

    pub fn get(&self, template_id: u8) -> Option<&DeclarationTemplate> {
        self.templates.iter().find(|template| template.id == template_id)
    }

    /// Template whose text equals `text` exactly.
    pub fn find_by_text(&self, text: &str) -> Option<&DeclarationTemplate> {
        self.templates.iter().find(|template| template.template == text)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeclarationTemplate> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_five_numbered_templates() {
        let catalog = TemplateCatalog::builtin();
        let ids: Vec<u8> = catalog.iter().map(|template| template.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(catalog.get(6).is_none());
        let second = catalog.get(2).expect("template 2");
        assert_eq!(catalog.find_by_text(&second.template).map(|template| template.id), Some(2));
    }
}
