//! Shared schema definitions for the portal form designer.
//!
//! - [`field`]: field records, additional-fields trees, declarations and the normalizer
//! - [`player`]: workflow players and their action forms
//! - [`metadata`]: the inbound form-metadata payload

pub mod field;
pub mod metadata;
pub mod player;

pub use field::{
    AdditionalFields, CheckboxDependency, ConsentConfig, DEFAULT_DEPENDENT_KEY, DEFAULT_SPAN, Declaration, DeclarationField,
    DeclarationSource, DependentLength, EnclosureDependency, FieldKind, FieldOption, FieldRecord, FieldType, LengthBound, MAX_SPAN,
    OptionsConfig, OptionsType, RawFieldRecord, format_options_text, normalize, normalize_list, normalize_value, normalize_values,
    parse_options_text,
};
pub use metadata::{FormMetadata, FormSection};
pub use player::{ActionFormOptions, CustomPermission, DEFAULT_ACTION_FIELD, Player, PlayerPermissions, Workflow};
