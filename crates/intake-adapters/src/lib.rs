//! intake-adapters: implementaciones de `ServiceGateway`.
//!
//! - `HttpGateway`: cliente reqwest contra el backend REST.
//! - `InMemoryGateway`: backend determinista en proceso (tests, demos).
//! - `ApiConfig`: configuración del cliente desde el entorno (`.env`).

pub mod config;
pub mod error;
pub mod http;
pub mod memory;

pub use config::{init_dotenv, ApiConfig, DEFAULT_BASE_URL};
pub use error::AdapterError;
pub use http::{HttpGateway, IDEMPOTENCY_HEADER};
pub use memory::{extract_goals_from_text, Extractor, InMemoryGateway, NO_BASELINE};
