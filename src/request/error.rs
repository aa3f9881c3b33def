//! Build-time validation errors.

use thiserror::Error;

use crate::models::monitor::MonitorVariant;

/// Errors raised while translating a declared configuration into a remote
/// request. Always fatal for the current operation and raised before any
/// remote effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A field's value is still unknown at build time. The declarative
    /// engine resolves unknowns before apply, so this indicates a caller bug
    /// and is surfaced rather than silently treated as unmanaged.
    #[error("value of `{field}` is unknown at build time")]
    UnknownValue {
        /// Path of the offending field.
        field: String,
    },

    /// A field was declared on a variant that does not carry it.
    #[error("`{field}` does not apply to {variant} monitors")]
    FieldNotApplicable {
        /// Path of the offending field.
        field: String,
        /// The monitor variant the field was declared on.
        variant: MonitorVariant,
    },

    /// A field the variant requires was not declared.
    #[error("{variant} monitors require `{field}`")]
    MissingRequiredField {
        /// Path of the missing field.
        field: String,
        /// The monitor variant requiring the field.
        variant: MonitorVariant,
    },

    /// Both body encodings were declared; at most one may be set.
    #[error("`json_body` and `form_body` are mutually exclusive")]
    ConflictingBodies,

    /// The structured body is not a JSON object or array.
    #[error("`json_body` must be a JSON object or array")]
    MalformedBody,

    /// The same contact id was assigned more than once.
    #[error("contact `{contact_id}` is assigned more than once")]
    DuplicateContact {
        /// The duplicated contact id.
        contact_id: String,
    },

    /// An update attempted to change the monitor variant, which is immutable
    /// after creation; the engine must replace the monitor instead.
    #[error("monitor variant cannot change from {prior} to {desired}; replacement required")]
    VariantChanged {
        /// Variant recorded in prior state.
        prior: MonitorVariant,
        /// Variant in the desired configuration.
        desired: MonitorVariant,
    },
}

impl ValidationError {
    /// Field path the error refers to, when it names one.
    pub fn field_path(&self) -> Option<String> {
        match self {
            ValidationError::UnknownValue { field } => Some(field.clone()),
            ValidationError::FieldNotApplicable { field, .. } => Some(field.clone()),
            ValidationError::MissingRequiredField { field, .. } => Some(field.clone()),
            ValidationError::ConflictingBodies => Some("json_body".to_string()),
            ValidationError::MalformedBody => Some("json_body".to_string()),
            ValidationError::DuplicateContact { contact_id } => {
                Some(format!("contacts[{contact_id}]"))
            }
            ValidationError::VariantChanged { .. } => Some("variant".to_string()),
        }
    }
}
