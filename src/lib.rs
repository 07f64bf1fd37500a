//! Intakeflow Rust Library
//!
//! Este crate actúa como fachada de la aplicación:
//! - Expone `config` para cargar la configuración desde `.env`.
//! - Expone `errors` para errores de arranque y de flujo.
//! - Expone `demo`, el recorrido completo contra el backend en memoria.
//!
//! Los crates del workspace se re-exportan para clientes externos.

pub mod config;
pub mod demo;
pub mod errors;

pub use intake_adapters;
pub use intake_core;
pub use intake_domain;
