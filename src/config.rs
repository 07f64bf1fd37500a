//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) una sola vez y expone `AppConfig`, que
//! agrupa la configuración del cliente HTTP y las reglas del formulario.
use intake_adapters::ApiConfig;
use intake_core::{ServiceGateway, SessionBuilder, WizardSession};
use intake_domain::{AttachmentRules, FieldRules, DEFAULT_MAX_ATTACHMENT_BYTES};
use once_cell::sync::Lazy;
use std::env;
use std::sync::Arc;

use crate::errors::core_error::CoreError;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv();
});

/// Configuración de la aplicación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Cliente HTTP: URL base y timeout.
    pub api: ApiConfig,
    /// Tamaño máximo del adjunto (IEP) en bytes.
    pub max_attachment_bytes: usize,
    /// Campos obligatorios del alta. Vacío: reglas de alumno por defecto.
    pub required_fields: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { api: ApiConfig::default(),
               max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
               required_fields: Vec::new() }
    }
}

impl AppConfig {
    /// Lee `INTAKE_*` del entorno (tras cargar `.env`).
    pub fn from_env() -> Result<Self, CoreError> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|k| env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let api = ApiConfig::from_lookup(&lookup)?;
        let max_attachment_bytes = match lookup("INTAKE_MAX_ATTACHMENT_BYTES") {
            Some(raw) => raw.trim()
                            .parse()
                            .map_err(|_| CoreError::Config(format!("INTAKE_MAX_ATTACHMENT_BYTES no es un número: {raw:?}")))?,
            None => DEFAULT_MAX_ATTACHMENT_BYTES,
        };
        let required_fields = lookup("INTAKE_REQUIRED_FIELDS").map(|raw| {
                                                                  raw.split(',')
                                                                     .map(str::trim)
                                                                     .filter(|s| !s.is_empty())
                                                                     .map(str::to_string)
                                                                     .collect()
                                                              })
                                                              .unwrap_or_default();
        Ok(Self { api,
                  max_attachment_bytes,
                  required_fields })
    }

    pub fn field_rules(&self) -> FieldRules {
        if self.required_fields.is_empty() {
            FieldRules::student()
        } else {
            FieldRules::required_names(self.required_fields.iter().cloned())
        }
    }

    pub fn attachment_rules(&self) -> AttachmentRules {
        AttachmentRules::default().with_max_bytes(self.max_attachment_bytes)
    }

    /// Builder de sesión con las reglas de esta configuración.
    pub fn session_builder(&self, gateway: Arc<dyn ServiceGateway>) -> SessionBuilder {
        WizardSession::builder(gateway).rules(self.field_rules())
                                       .attachment_rules(self.attachment_rules())
    }
}
