//! Constantes del core.

/// Esquema de las claves de idempotencia. Forma parte del input del hash:
/// cambiarlo invalida todas las claves previas aunque los campos no cambien.
pub const IDEMPOTENCY_SCHEME: &str = "intake-v1";

/// Aviso (no error) cuando la extracción no encuentra objetivos.
pub const NOTHING_EXTRACTED_NOTICE: &str = "No learning goals were extracted from the IEP document.";

/// Aviso cuando, tras volver al formulario, se reenvían campos distintos de
/// los ya guardados: la entidad existe y no se modifica.
pub const ALREADY_CREATED_NOTICE: &str =
    "This student has already been added. Restore the saved name and grade, or start over to change them.";
