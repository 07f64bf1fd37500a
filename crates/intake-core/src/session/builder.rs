//! Builder de `WizardSession`.

use intake_domain::{AttachmentRules, FieldRules};
use std::sync::Arc;

use super::WizardSession;
use crate::event::{EventStore, InMemoryEventStore};
use crate::gateway::ServiceGateway;

/// Configura reglas y almacenamiento de eventos antes de abrir la sesión.
pub struct SessionBuilder<E: EventStore = InMemoryEventStore> {
    gateway: Arc<dyn ServiceGateway>,
    rules: FieldRules,
    attachment_rules: AttachmentRules,
    events: E,
}

impl SessionBuilder<InMemoryEventStore> {
    pub fn new(gateway: Arc<dyn ServiceGateway>) -> Self {
        Self { gateway,
               rules: FieldRules::student(),
               attachment_rules: AttachmentRules::default(),
               events: InMemoryEventStore::default() }
    }
}

impl<E: EventStore> SessionBuilder<E> {
    /// Reglas de los campos obligatorios (por defecto: alumno).
    pub fn rules(mut self, rules: FieldRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn attachment_rules(mut self, rules: AttachmentRules) -> Self {
        self.attachment_rules = rules;
        self
    }

    /// Sustituye el store de eventos.
    pub fn event_store<E2: EventStore>(self, events: E2) -> SessionBuilder<E2> {
        SessionBuilder { gateway: self.gateway,
                         rules: self.rules,
                         attachment_rules: self.attachment_rules,
                         events }
    }

    pub fn build(self) -> WizardSession<E> {
        WizardSession::from_parts(self.gateway, self.rules, self.attachment_rules, self.events)
    }
}
