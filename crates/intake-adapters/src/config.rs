//! Configuración del cliente HTTP desde variables de entorno.
//! Convención `INTAKE_API_BASE_URL` y `INTAKE_HTTP_TIMEOUT_SECS`.

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

use crate::error::AdapterError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE_URL.to_string(),
               timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS) }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(),
               ..Self::default() }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Lee la configuración; variables ausentes toman el valor por defecto,
    /// valores ilegibles son error.
    pub fn from_env() -> Result<Self, AdapterError> {
        init_dotenv();
        Self::from_lookup(|k| env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AdapterError> {
        let mut cfg = Self::default();
        if let Some(url) = lookup("INTAKE_API_BASE_URL").filter(|v| !v.trim().is_empty()) {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AdapterError::Config(format!("INTAKE_API_BASE_URL must be an http(s) URL, got {url:?}")));
            }
            cfg.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(raw) = lookup("INTAKE_HTTP_TIMEOUT_SECS") {
            let secs: u64 = raw.trim()
                               .parse()
                               .map_err(|_| AdapterError::Config(format!("INTAKE_HTTP_TIMEOUT_SECS is not a number: {raw:?}")))?;
            cfg.timeout = Duration::from_secs(secs);
        }
        Ok(cfg)
    }
}
