//! Tipos de evento de la sesión y estructura `SessionEvent`.
//!
//! Cada transición del `WizardSession` deja uno o más eventos en su
//! `EventStore` y los entrega a los listeners registrados. El enum
//! `SessionEventKind` es el contrato observable de la máquina de estados.
use chrono::{DateTime, Utc};
use intake_domain::EntityId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::Operation;
use crate::session::WizardStep;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEventKind {
    /// Primer evento de cada generación.
    SessionStarted { generation: u64 },
    StepChanged { from: WizardStep, to: WizardStep },
    /// La validación local rechazó la entrada; no hubo llamada remota.
    ValidationFailed { field: Option<String>, message: String },
    PrimaryCreated { entity_id: EntityId, idempotency_key: String },
    /// Reintento con la entidad ya confirmada: no se vuelve a crear.
    PrimaryReused { entity_id: EntityId },
    CandidatesExtracted { count: usize, attachment_digest: String },
    SelectionChanged { selected: usize },
    SelectionCommitted { entity_id: EntityId, count: usize },
    TransitionFailed { operation: Operation, message: String },
    SessionReset { generation: u64 },
    SessionAbandoned { generation: u64 },
    /// Respuesta que llegó para una generación ya descartada.
    StaleResponseDiscarded { started: u64, current: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub seq: u64, // asignado por el EventStore (orden append)
    pub session_id: Uuid,
    pub kind: SessionEventKind,
    pub ts: DateTime<Utc>,
}

/// Listener de eventos. Se invoca fuera de cualquier lock de la sesión, por
/// lo que puede consultar la sesión libremente.
pub type EventListener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;
