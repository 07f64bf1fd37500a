//! Core WizardSession implementation

use indexmap::IndexSet;
use intake_domain::{Attachment, AttachmentRules, DomainError, EntityId, FieldRules, Goal, PrimaryFields};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::{SessionBuilder, WizardStep};
use crate::constants::{ALREADY_CREATED_NOTICE, IDEMPOTENCY_SCHEME, NOTHING_EXTRACTED_NOTICE};
use crate::errors::{Operation, RemoteError, SequenceError, WizardError};
use crate::event::{EventListener, EventStore, InMemoryEventStore, SessionEvent, SessionEventKind};
use crate::gateway::ServiceGateway;
use crate::hashing::hash_value;

/// Consumidor final: recibe el `entity_id` cuando la sesión llega a `Complete`.
pub type CompletionListener = Arc<dyn Fn(EntityId) + Send + Sync>;

/// Vista inmutable del estado de la sesión en un instante.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub generation: u64,
    pub step: WizardStep,
    pub entity_id: Option<EntityId>,
    pub candidates: Vec<Goal>,
    pub selected: Vec<Goal>,
    pub error_message: Option<String>,
    pub notice: Option<String>,
    pub busy: bool,
}

pub(crate) struct SessionState<E> {
    session_id: Uuid,
    step: WizardStep,
    entity_id: Option<EntityId>,
    // Campos (normalizados) con los que se creó `entity_id`.
    committed_fields: Option<PrimaryFields>,
    candidates: Vec<Goal>,
    selected: IndexSet<Goal>,
    error_message: Option<String>,
    notice: Option<String>,
    busy: bool,
    generation: u64,
    idempotency_key: Option<String>,
    events: E,
    // Eventos pendientes de entregar a los listeners (fuera del lock).
    outbox: Vec<SessionEvent>,
    completed: Option<EntityId>,
}

impl<E: EventStore> SessionState<E> {
    fn new(session_id: Uuid, events: E) -> Self {
        let mut st = Self { session_id,
                            step: WizardStep::Form,
                            entity_id: None,
                            committed_fields: None,
                            candidates: Vec::new(),
                            selected: IndexSet::new(),
                            error_message: None,
                            notice: None,
                            busy: false,
                            generation: 0,
                            idempotency_key: None,
                            events,
                            outbox: Vec::new(),
                            completed: None };
        st.emit(SessionEventKind::SessionStarted { generation: 0 });
        st
    }

    fn emit(&mut self, kind: SessionEventKind) {
        let ev = self.events.append_kind(self.session_id, kind);
        self.outbox.push(ev);
    }

    fn set_step(&mut self, to: WizardStep) {
        if self.step != to {
            let from = self.step;
            self.step = to;
            self.emit(SessionEventKind::StepChanged { from, to });
        }
    }

    fn expect_step(&self, expected: WizardStep) -> Result<(), SequenceError> {
        if self.step != expected {
            return Err(SequenceError::WrongStep { expected,
                                                  actual: self.step });
        }
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), SequenceError> {
        if self.busy {
            return Err(SequenceError::Busy);
        }
        Ok(())
    }

    /// Descarta todo lo acumulado y abre una generación nueva.
    fn restart(&mut self) {
        self.entity_id = None;
        self.committed_fields = None;
        self.candidates.clear();
        self.selected.clear();
        self.error_message = None;
        self.notice = None;
        self.idempotency_key = None;
        self.busy = false;
        self.generation += 1;
    }

    fn check_generation(&mut self, started: u64) -> Result<(), SequenceError> {
        if self.generation != started {
            let current = self.generation;
            warn!("session {}: discarding response from generation {} (current {})", self.session_id, started, current);
            self.emit(SessionEventKind::StaleResponseDiscarded { started, current });
            return Err(SequenceError::StaleResponse { started, current });
        }
        Ok(())
    }

    fn fail_validation(&mut self, err: DomainError) -> WizardError {
        debug!("session {}: validation failed: {}", self.session_id, err);
        self.error_message = Some(err.to_string());
        self.emit(SessionEventKind::ValidationFailed { field: err.field().map(str::to_string),
                                                       message: err.to_string() });
        WizardError::Validation(err)
    }

    fn fail_remote(&mut self, operation: Operation, source: RemoteError) -> WizardError {
        warn!("session {}: {} failed: {}", self.session_id, operation, source);
        self.error_message = Some(operation.failure_message().to_string());
        self.emit(SessionEventKind::TransitionFailed { operation,
                                                       message: source.to_string() });
        WizardError::remote(operation, source)
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot { session_id: self.session_id,
                          generation: self.generation,
                          step: self.step,
                          entity_id: self.entity_id,
                          candidates: self.candidates.clone(),
                          selected: self.selected.iter().cloned().collect(),
                          error_message: self.error_message.clone(),
                          notice: self.notice.clone(),
                          busy: self.busy }
    }
}

/// Libera `busy` al salir de la transición (éxito, error, panic o future
/// cancelado), salvo que la sesión ya haya cambiado de generación.
struct BusyGuard<'a, E: EventStore> {
    session: &'a WizardSession<E>,
    generation: u64,
}

impl<E: EventStore> Drop for BusyGuard<'_, E> {
    fn drop(&mut self) {
        let mut st = self.session.lock();
        if st.generation == self.generation {
            st.busy = false;
        }
    }
}

enum PrimaryStep {
    Create { key: String },
    Reuse(EntityId),
}

/// Sesión de intake: máquina de estados Form → GoalSelection → Complete que
/// secuencia las llamadas al `ServiceGateway`.
///
/// Todas las operaciones toman `&self`: el estado vive tras un `Mutex` que
/// nunca se mantiene a través de un `.await`, de modo que una UI puede
/// compartir la sesión entre handlers. La exclusión entre transiciones la da
/// el flag `busy`, no el lock.
pub struct WizardSession<E: EventStore = InMemoryEventStore> {
    gateway: Arc<dyn ServiceGateway>,
    rules: FieldRules,
    attachment_rules: AttachmentRules,
    session_id: Uuid,
    state: Mutex<SessionState<E>>,
    listeners: Mutex<Vec<EventListener>>,
    completion_listeners: Mutex<Vec<CompletionListener>>,
}

impl WizardSession<InMemoryEventStore> {
    /// Sesión con reglas de alumno por defecto y eventos en memoria.
    pub fn new(gateway: Arc<dyn ServiceGateway>) -> Self {
        Self::builder(gateway).build()
    }

    pub fn builder(gateway: Arc<dyn ServiceGateway>) -> SessionBuilder<InMemoryEventStore> {
        SessionBuilder::new(gateway)
    }
}

impl<E: EventStore> WizardSession<E> {
    pub(crate) fn from_parts(gateway: Arc<dyn ServiceGateway>,
                             rules: FieldRules,
                             attachment_rules: AttachmentRules,
                             events: E)
                             -> Self {
        let session_id = Uuid::new_v4();
        info!("session {session_id}: started");
        Self { gateway,
               rules,
               attachment_rules,
               session_id,
               state: Mutex::new(SessionState::new(session_id, events)),
               listeners: Mutex::new(Vec::new()),
               completion_listeners: Mutex::new(Vec::new()) }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Aplica una mutación síncrona y entrega los eventos resultantes.
    fn mutate<R>(&self, f: impl FnOnce(&mut SessionState<E>) -> Result<R, WizardError>) -> Result<R, WizardError> {
        let res = {
            let mut st = self.lock();
            f(&mut *st)
        };
        self.flush();
        res
    }

    /// Entrega eventos pendientes y la notificación de completado. Se llama
    /// siempre sin el lock tomado: los listeners pueden consultar la sesión.
    fn flush(&self) {
        let (events, completed) = {
            let mut st = self.lock();
            (std::mem::take(&mut st.outbox), st.completed.take())
        };
        if !events.is_empty() {
            let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner).clone();
            for ev in &events {
                for l in &listeners {
                    l(ev);
                }
            }
        }
        if let Some(entity_id) = completed {
            let listeners = self.completion_listeners
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .clone();
            for l in &listeners {
                l(entity_id);
            }
        }
    }

    /// Registra un listener para cada evento de la sesión.
    pub fn subscribe(&self, listener: impl Fn(&SessionEvent) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Registra el consumidor que recibe el `entity_id` al completar.
    pub fn on_complete(&self, listener: impl Fn(EntityId) + Send + Sync + 'static) {
        self.completion_listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Valida y crea la entidad primaria; si hay adjunto, encadena la
    /// extracción de candidatos.
    ///
    /// Con la entidad ya confirmada en esta generación (p.ej. tras un fallo de
    /// extracción o un `back`), no se vuelve a llamar a `create_primary`; si
    /// los campos difieren de los guardados se rechaza con
    /// `SequenceError::AlreadyCreated` y `notice`, sin tocar la entidad.
    pub async fn submit_primary(&self,
                                fields: &PrimaryFields,
                                attachment: Option<&Attachment>)
                                -> Result<WizardStep, WizardError> {
        let res = self.submit_primary_inner(fields, attachment).await;
        self.flush();
        res
    }

    async fn submit_primary_inner(&self,
                                  fields: &PrimaryFields,
                                  attachment: Option<&Attachment>)
                                  -> Result<WizardStep, WizardError> {
        let fields = fields.trimmed();
        let (guard, primary) = {
            let mut st = self.lock();
            st.ensure_idle()?;
            st.expect_step(WizardStep::Form)?;
            st.error_message = None;
            st.notice = None;
            if let Err(e) = self.rules.validate(&fields) {
                return Err(st.fail_validation(e));
            }
            if let Some(a) = attachment {
                if let Err(e) = self.attachment_rules.validate(a) {
                    return Err(st.fail_validation(e));
                }
            }
            let primary = match st.entity_id {
                Some(entity_id) => {
                    if st.committed_fields.as_ref() != Some(&fields) {
                        info!("session {}: fields changed after entity {} was created", self.session_id, entity_id);
                        st.notice = Some(ALREADY_CREATED_NOTICE.to_string());
                        return Err(SequenceError::AlreadyCreated { entity_id }.into());
                    }
                    PrimaryStep::Reuse(entity_id)
                }
                None => {
                    let key = idempotency_key(st.session_id, st.generation, &fields);
                    st.idempotency_key = Some(key.clone());
                    PrimaryStep::Create { key }
                }
            };
            st.busy = true;
            (BusyGuard { session: self,
                         generation: st.generation },
             primary)
        };

        let entity_id = match primary {
            PrimaryStep::Reuse(id) => {
                info!("session {}: entity {} already confirmed, skipping create", self.session_id, id);
                self.lock().emit(SessionEventKind::PrimaryReused { entity_id: id });
                id
            }
            PrimaryStep::Create { key } => {
                debug!("session {}: create_primary key={}", self.session_id, key);
                let res = self.gateway.create_primary(&fields, &key).await;
                let mut st = self.lock();
                st.check_generation(guard.generation)?;
                match res {
                    Ok(id) => {
                        info!("session {}: entity {} created", self.session_id, id);
                        st.entity_id = Some(id);
                        st.committed_fields = Some(fields.clone());
                        st.emit(SessionEventKind::PrimaryCreated { entity_id: id,
                                                                   idempotency_key: key });
                        id
                    }
                    Err(e) => return Err(st.fail_remote(Operation::CreatePrimary, e)),
                }
            }
        };

        match attachment {
            Some(a) => self.run_extraction(a, guard.generation).await,
            None => {
                let mut st = self.lock();
                st.set_step(WizardStep::Complete);
                st.completed = Some(entity_id);
                Ok(WizardStep::Complete)
            }
        }
    }

    /// Extrae candidatos para la entidad ya creada. Reintento manual tras un
    /// fallo de extracción: la entidad no se vuelve a crear.
    pub async fn extract_candidates(&self, attachment: &Attachment) -> Result<WizardStep, WizardError> {
        let res = self.extract_candidates_inner(attachment).await;
        self.flush();
        res
    }

    async fn extract_candidates_inner(&self, attachment: &Attachment) -> Result<WizardStep, WizardError> {
        let guard = {
            let mut st = self.lock();
            st.ensure_idle()?;
            st.expect_step(WizardStep::Form)?;
            if st.entity_id.is_none() {
                return Err(SequenceError::MissingEntity.into());
            }
            st.error_message = None;
            st.notice = None;
            if let Err(e) = self.attachment_rules.validate(attachment) {
                return Err(st.fail_validation(e));
            }
            st.busy = true;
            BusyGuard { session: self,
                        generation: st.generation }
        };
        self.run_extraction(attachment, guard.generation).await
    }

    // Requiere `busy` ya tomado por el llamador.
    async fn run_extraction(&self, attachment: &Attachment, generation: u64) -> Result<WizardStep, WizardError> {
        let digest = attachment.digest();
        debug!("session {}: extract {} ({} bytes, sha256={})",
               self.session_id,
               attachment.file_name,
               attachment.len(),
               digest);
        let res = self.gateway.extract(attachment).await;
        let mut st = self.lock();
        st.check_generation(generation)?;
        let goals = match res {
            Ok(goals) => goals,
            Err(e) => return Err(st.fail_remote(Operation::Extract, e)),
        };
        // Identidad estructural: duplicados exactos se colapsan, orden del servidor.
        let unique: IndexSet<Goal> = goals.into_iter().collect();
        let count = unique.len();
        st.candidates = unique.into_iter().collect();
        st.selected.clear();
        if count == 0 {
            info!("session {}: extraction returned no goals", self.session_id);
            st.notice = Some(NOTHING_EXTRACTED_NOTICE.to_string());
        }
        st.emit(SessionEventKind::CandidatesExtracted { count,
                                                        attachment_digest: digest });
        st.set_step(WizardStep::GoalSelection);
        Ok(WizardStep::GoalSelection)
    }

    /// Alterna un candidato en la selección (identidad estructural). Devuelve
    /// si el item quedó seleccionado.
    pub fn toggle_selection(&self, item: &Goal) -> Result<bool, WizardError> {
        self.mutate(|st| {
                st.ensure_idle()?;
                st.expect_step(WizardStep::GoalSelection)?;
                if !st.candidates.contains(item) {
                    return Err(SequenceError::UnknownItem.into());
                }
                let now_selected = if st.selected.shift_remove(item) {
                    false
                } else {
                    st.selected.insert(item.clone());
                    true
                };
                let selected = st.selected.len();
                st.emit(SessionEventKind::SelectionChanged { selected });
                Ok(now_selected)
            })
    }

    /// Guarda la selección (en orden de elección) y completa la sesión.
    pub async fn commit_selection(&self) -> Result<WizardStep, WizardError> {
        let res = self.commit_selection_inner().await;
        self.flush();
        res
    }

    async fn commit_selection_inner(&self) -> Result<WizardStep, WizardError> {
        let (guard, entity_id, items) = {
            let mut st = self.lock();
            st.ensure_idle()?;
            st.expect_step(WizardStep::GoalSelection)?;
            if st.selected.is_empty() {
                return Err(SequenceError::EmptySelection.into());
            }
            let entity_id = st.entity_id.ok_or(SequenceError::MissingEntity)?;
            st.error_message = None;
            st.busy = true;
            let items: Vec<Goal> = st.selected.iter().cloned().collect();
            (BusyGuard { session: self,
                         generation: st.generation },
             entity_id,
             items)
        };

        debug!("session {}: save_selection entity={} items={}", self.session_id, entity_id, items.len());
        let res = self.gateway.save_selection(entity_id, &items).await;
        let mut st = self.lock();
        st.check_generation(guard.generation)?;
        match res {
            Ok(()) => {
                info!("session {}: {} goals saved for entity {}", self.session_id, items.len(), entity_id);
                st.emit(SessionEventKind::SelectionCommitted { entity_id,
                                                               count: items.len() });
                st.set_step(WizardStep::Complete);
                st.completed = Some(entity_id);
                Ok(WizardStep::Complete)
            }
            Err(e) => Err(st.fail_remote(Operation::SaveSelection, e)),
        }
    }

    /// Vuelve a `Form` desde `Complete`, descartando todo el progreso.
    pub fn reset(&self) -> Result<(), WizardError> {
        self.mutate(|st| {
                if !st.step.is_terminal() {
                    return Err(SequenceError::WrongStep { expected: WizardStep::Complete,
                                                          actual: st.step }.into());
                }
                st.restart();
                let generation = st.generation;
                st.emit(SessionEventKind::SessionReset { generation });
                st.set_step(WizardStep::Form);
                st.emit(SessionEventKind::SessionStarted { generation });
                Ok(())
            })
    }

    /// Vuelve de `GoalSelection` a `Form` conservando la entidad creada.
    pub fn back(&self) -> Result<(), WizardError> {
        self.mutate(|st| {
                st.ensure_idle()?;
                st.expect_step(WizardStep::GoalSelection)?;
                st.candidates.clear();
                st.selected.clear();
                st.notice = None;
                st.error_message = None;
                st.set_step(WizardStep::Form);
                Ok(())
            })
    }

    /// Descarta la sesión desde cualquier etapa, incluso con una llamada en
    /// vuelo: su respuesta se ignorará por generación.
    pub fn abandon(&self) {
        let _ = self.mutate(|st| {
                        let was_busy = st.busy;
                        st.restart();
                        let generation = st.generation;
                        if was_busy {
                            info!("session {}: abandoned with a request in flight", st.session_id);
                        }
                        st.emit(SessionEventKind::SessionAbandoned { generation });
                        st.set_step(WizardStep::Form);
                        st.emit(SessionEventKind::SessionStarted { generation });
                        Ok(())
                    });
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn step(&self) -> WizardStep {
        self.lock().step
    }

    pub fn entity_id(&self) -> Option<EntityId> {
        self.lock().entity_id
    }

    pub fn candidates(&self) -> Vec<Goal> {
        self.lock().candidates.clone()
    }

    pub fn selected(&self) -> Vec<Goal> {
        self.lock().selected.iter().cloned().collect()
    }

    pub fn is_selected(&self, item: &Goal) -> bool {
        self.lock().selected.contains(item)
    }

    pub fn error_message(&self) -> Option<String> {
        self.lock().error_message.clone()
    }

    pub fn notice(&self) -> Option<String> {
        self.lock().notice.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    /// Estado del botón "guardar": en selección, con algo elegido y sin vuelo.
    pub fn can_commit(&self) -> bool {
        let st = self.lock();
        st.step == WizardStep::GoalSelection && !st.selected.is_empty() && !st.busy
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Última clave de idempotencia usada para `create_primary`.
    pub fn idempotency_key(&self) -> Option<String> {
        self.lock().idempotency_key.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    /// Eventos registrados para esta sesión.
    pub fn events(&self) -> Vec<SessionEvent> {
        let st = self.lock();
        st.events.list(self.session_id)
    }
}

/// Clave estable para `(sesión, generación, campos)`: mismos campos en un
/// reintento producen la misma clave; campos distintos, otra.
pub fn idempotency_key(session_id: Uuid, generation: u64, fields: &PrimaryFields) -> String {
    hash_value(&json!({
        "scheme": IDEMPOTENCY_SCHEME,
        "session_id": session_id.to_string(),
        "generation": generation,
        "fields": fields.to_json(),
    }))
}
