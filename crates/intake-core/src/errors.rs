//! Taxonomía de errores del core.
//!
//! - `Validation`: local, previo a la red; el gateway nunca fue contactado.
//! - `Sequence`: operación invocada fuera del orden permitido por la máquina
//!   de estados (error de programación si la UI deshabilita acciones inválidas).
//! - `Remote`: fallo de red, status no exitoso o respuesta malformada.

use intake_domain::{DomainError, EntityId, EntryId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::session::WizardStep;

/// Operaciones remotas del gateway. Cada una tiene su mensaje de cara al usuario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    CreatePrimary,
    Extract,
    SaveSelection,
    Like,
    Unlike,
    FetchAll,
    FetchPrimary,
}

impl Operation {
    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::CreatePrimary => "Failed to add student",
            Operation::Extract => "Error processing IEP file",
            Operation::SaveSelection => "Failed to save learning goals",
            Operation::Like | Operation::Unlike => "Failed to update like",
            Operation::FetchAll => "Failed to load journal entries",
            Operation::FetchPrimary => "Failed to load student",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::CreatePrimary => "create_primary",
            Operation::Extract => "extract",
            Operation::SaveSelection => "save_selection",
            Operation::Like => "like",
            Operation::Unlike => "unlike",
            Operation::FetchAll => "fetch_all",
            Operation::FetchPrimary => "fetch_primary",
        };
        f.write_str(s)
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

/// Error devuelto por el gateway remoto.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("remote error{}: {message}", status_suffix(.status))]
pub struct RemoteError {
    /// Status HTTP si la respuesta llegó a existir.
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self { status: Some(status),
               message: message.into() }
    }

    /// Fallo de transporte (sin respuesta).
    pub fn transport(message: impl Into<String>) -> Self {
        Self { status: None,
               message: message.into() }
    }

    /// La respuesta llegó pero no respeta el contrato.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self { status: None,
               message: format!("malformed response: {}", message.into()) }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceError {
    #[error("another transition is already in flight")]
    Busy,
    #[error("operation requires step {expected}, session is at {actual}")]
    WrongStep { expected: WizardStep, actual: WizardStep },
    #[error("no entity has been created yet")]
    MissingEntity,
    #[error("entity {entity_id} already exists with different fields")]
    AlreadyCreated { entity_id: EntityId },
    #[error("no items selected")]
    EmptySelection,
    #[error("item is not among the extracted candidates")]
    UnknownItem,
    #[error("response discarded: session moved from generation {started} to {current}")]
    StaleResponse { started: u64, current: u64 },
    #[error("unknown entry {0}")]
    UnknownEntry(EntryId),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WizardError {
    #[error("validation failed: {0}")]
    Validation(#[from] DomainError),
    #[error("out of sequence: {0}")]
    Sequence(#[from] SequenceError),
    #[error("{operation} failed: {source}")]
    Remote {
        operation: Operation,
        #[source]
        source: RemoteError,
    },
}

impl WizardError {
    pub fn remote(operation: Operation, source: RemoteError) -> Self {
        WizardError::Remote { operation, source }
    }

    /// Texto de cara al usuario. Las tres clases nunca comparten mensaje.
    pub fn user_message(&self) -> String {
        match self {
            WizardError::Validation(e) => e.to_string(),
            WizardError::Sequence(_) => "This action is not available right now".to_string(),
            WizardError::Remote { operation, .. } => operation.failure_message().to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, WizardError::Validation(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, WizardError::Sequence(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, WizardError::Remote { .. })
    }
}
