//! Errores de construcción de adaptadores (no de llamadas remotas: esas
//! son `RemoteError` del core).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}
