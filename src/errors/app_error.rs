use intake_core::WizardError;
use thiserror::Error;

use super::core_error::CoreError;

/// Error de nivel aplicación: arranque o flujo de intake.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Error en el flujo de intake: {0}")]
    Wizard(#[from] WizardError),
}

impl AppError {
    /// Mensaje para el usuario final.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Core(e) => e.to_string(),
            AppError::Wizard(e) => e.user_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::{Operation, RemoteError};

    #[test]
    fn test_wizard_variant_uses_operation_message() {
        let err: AppError = WizardError::remote(Operation::SaveSelection, RemoteError::status(500, "x")).into();
        assert_eq!(err.user_message(), "Failed to save learning goals");
        assert!(err.to_string().starts_with("Error en el flujo de intake"));
    }

    #[test]
    fn test_core_variant_is_transparent() {
        let err: AppError = CoreError::Internal("fallo".into()).into();
        assert_eq!(err.to_string(), "Error interno: fallo");
    }
}
