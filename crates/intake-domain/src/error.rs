use thiserror::Error;

/// Errores de validación local del dominio de intake.
///
/// Se producen antes de cualquier llamada remota: un `DomainError` nunca
/// implica que el gateway haya sido contactado.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{field} is required")]
    MissingField { field: String },
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },
    #[error("{value:?} is not a valid value for {field}")]
    NotAllowed { field: String, value: String },
    #[error("attachment is empty")]
    EmptyAttachment,
    #[error("attachment is {size} bytes, the limit is {max}")]
    AttachmentTooLarge { size: usize, max: usize },
    #[error("attachment {file_name:?} has an unsupported type")]
    UnsupportedAttachment { file_name: String },
}

impl DomainError {
    /// Campo afectado, si el error se refiere a uno concreto.
    pub fn field(&self) -> Option<&str> {
        match self {
            DomainError::MissingField { field }
            | DomainError::TooLong { field, .. }
            | DomainError::NotAllowed { field, .. } => Some(field),
            _ => None,
        }
    }
}
