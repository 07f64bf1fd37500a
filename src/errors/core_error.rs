use thiserror::Error;

/// Errores de arranque de la aplicación, previos a cualquier sesión.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Error interno: {0}")]
    Internal(String),
    #[error("Error de configuración: {0}")]
    Config(String),
    #[error("Error de cliente HTTP: {0}")]
    Adapter(#[from] intake_adapters::AdapterError),
}
