//! Errores de la aplicación: `CoreError` (configuración, IO, internos) y
//! `AppError`, que además envuelve los errores del flujo de intake.

pub mod app_error;
pub mod core_error;

pub use app_error::AppError;
pub use core_error::CoreError;
