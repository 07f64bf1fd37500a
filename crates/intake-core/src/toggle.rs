//! Toggle optimista de "me gusta" con contador autoritativo.
//!
//! El par `(count, active)` expuesto sólo cambia con respuestas confirmadas
//! del gateway: el contador nunca se calcula localmente.

use intake_domain::EntryId;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::{Operation, WizardError};
use crate::gateway::ServiceGateway;

/// Listener de cambios de contador (vistas agregadas).
pub type CountListener = Arc<dyn Fn(u64) + Send + Sync>;

/// Resultado de `OptimisticToggle::toggle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// El servidor confirmó; `count` es su valor autoritativo.
    Confirmed { count: u64, active: bool },
    /// Ya había una petición en vuelo: no se emitió ninguna llamada.
    Skipped,
    /// El gateway falló; estado intacto y error disponible en `take_error`.
    Failed,
    /// La respuesta llegó tras un `reseed` y se ignoró.
    Discarded,
}

#[derive(Debug)]
struct ToggleState {
    count: u64,
    active: bool,
    pending: bool,
    generation: u64,
    last_error: Option<WizardError>,
}

// Limpia `pending` al terminar la petición, también si el future se descarta.
struct PendingGuard<'a> {
    toggle: &'a OptimisticToggle,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.toggle.lock().pending = false;
    }
}

pub struct OptimisticToggle {
    item_id: EntryId,
    gateway: Arc<dyn ServiceGateway>,
    state: Mutex<ToggleState>,
    listeners: Mutex<Vec<CountListener>>,
}

impl OptimisticToggle {
    pub fn new(item_id: EntryId, gateway: Arc<dyn ServiceGateway>) -> Self {
        Self::seeded(item_id, gateway, 0, false)
    }

    /// Toggle sembrado con datos autoritativos (contador y estado del viewer).
    pub fn seeded(item_id: EntryId, gateway: Arc<dyn ServiceGateway>, count: u64, active: bool) -> Self {
        Self { item_id,
               gateway,
               state: Mutex::new(ToggleState { count,
                                               active,
                                               pending: false,
                                               generation: 0,
                                               last_error: None }),
               listeners: Mutex::new(Vec::new()) }
    }

    fn lock(&self) -> MutexGuard<'_, ToggleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, count: u64) {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner).clone();
        for l in &listeners {
            l(count);
        }
    }

    pub fn on_count_change(&self, listener: impl Fn(u64) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Alterna el estado contra el servidor. La operación (like/unlike) se
    /// elige a partir del último `active` confirmado.
    pub async fn toggle(&self) -> ToggleOutcome {
        let (guard, generation, was_active) = {
            let mut st = self.lock();
            if st.pending {
                debug!("entry {}: toggle ignored, request in flight", self.item_id);
                return ToggleOutcome::Skipped;
            }
            st.pending = true;
            st.last_error = None;
            (PendingGuard { toggle: self }, st.generation, st.active)
        };

        let (operation, res) = if was_active {
            (Operation::Unlike, self.gateway.unlike(self.item_id).await)
        } else {
            (Operation::Like, self.gateway.like(self.item_id).await)
        };

        let outcome = {
            let mut st = self.lock();
            if st.generation != generation {
                info!("entry {}: {} response discarded after reseed", self.item_id, operation);
                ToggleOutcome::Discarded
            } else {
                match res {
                    Ok(count) => {
                        st.count = count;
                        st.active = !was_active;
                        debug!("entry {}: {} confirmed, count={}", self.item_id, operation, count);
                        ToggleOutcome::Confirmed { count,
                                                   active: st.active }
                    }
                    Err(e) => {
                        warn!("entry {}: {} failed: {}", self.item_id, operation, e);
                        st.last_error = Some(WizardError::remote(operation, e));
                        ToggleOutcome::Failed
                    }
                }
            }
        };
        drop(guard);

        if let ToggleOutcome::Confirmed { count, .. } = outcome {
            self.notify(count);
        }
        outcome
    }

    /// Re-siembra desde datos recién cargados. Una respuesta en vuelo de
    /// antes del reseed se descarta.
    pub fn reseed(&self, count: u64, active: bool) {
        let changed = {
            let mut st = self.lock();
            st.generation += 1;
            let changed = st.count != count;
            st.count = count;
            st.active = active;
            changed
        };
        if changed {
            self.notify(count);
        }
    }

    /// Consume el último error (una sola vez).
    pub fn take_error(&self) -> Option<WizardError> {
        self.lock().last_error.take()
    }

    pub fn item_id(&self) -> EntryId {
        self.item_id
    }

    pub fn count(&self) -> u64 {
        self.lock().count
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn is_pending(&self) -> bool {
        self.lock().pending
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }
}

impl std::fmt::Debug for OptimisticToggle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        f.debug_struct("OptimisticToggle")
         .field("item_id", &self.item_id)
         .field("count", &st.count)
         .field("active", &st.active)
         .field("pending", &st.pending)
         .finish()
    }
}
