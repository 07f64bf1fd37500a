//! Feed del diario: entradas cargadas más un toggle de "me gusta" por entrada.
//!
//! Cada toggle escribe sus contadores confirmados de vuelta en la lista, de
//! modo que `entries()` y los toggles nunca divergen.

use dashmap::DashMap;
use intake_domain::{EntryId, JournalEntry};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::{Operation, SequenceError, WizardError};
use crate::gateway::ServiceGateway;
use crate::toggle::{OptimisticToggle, ToggleOutcome};

type SharedEntries = Arc<Mutex<Vec<JournalEntry>>>;

pub struct JournalFeed {
    gateway: Arc<dyn ServiceGateway>,
    entries: SharedEntries,
    toggles: DashMap<EntryId, Arc<OptimisticToggle>>,
}

fn lock_entries(entries: &Mutex<Vec<JournalEntry>>) -> MutexGuard<'_, Vec<JournalEntry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JournalFeed {
    pub fn new(gateway: Arc<dyn ServiceGateway>) -> Self {
        Self { gateway,
               entries: Arc::new(Mutex::new(Vec::new())),
               toggles: DashMap::new() }
    }

    /// Recarga las entradas y re-siembra los toggles. Si falla, se conservan
    /// las entradas anteriores.
    pub async fn load(&self) -> Result<usize, WizardError> {
        let fetched = match self.gateway.fetch_all().await {
            Ok(list) => list,
            Err(e) => {
                warn!("feed: fetch_all failed: {}", e);
                return Err(WizardError::remote(Operation::FetchAll, e));
            }
        };
        let ids: HashSet<EntryId> = fetched.iter().map(|e| e.id).collect();
        let seeds: Vec<(EntryId, u64, bool)> = fetched.iter()
                                                      .map(|e| (e.id, e.like_count, e.liked.unwrap_or(false)))
                                                      .collect();
        let count = fetched.len();
        *lock_entries(&self.entries) = fetched;

        self.toggles.retain(|id, _| ids.contains(id));
        for (id, like_count, liked) in seeds {
            // La referencia del DashMap se suelta antes de re-sembrar.
            let existing = self.toggles.get(&id).map(|t| Arc::clone(t.value()));
            match existing {
                Some(toggle) => toggle.reseed(like_count, liked),
                None => {
                    let toggle = Arc::new(OptimisticToggle::seeded(id, self.gateway.clone(), like_count, liked));
                    let weak = Arc::downgrade(&self.entries);
                    toggle.on_count_change(move |c| {
                              if let Some(entries) = weak.upgrade() {
                                  if let Some(e) = lock_entries(&entries).iter_mut().find(|e| e.id == id) {
                                      e.like_count = c;
                                  }
                              }
                          });
                    self.toggles.insert(id, toggle);
                }
            }
        }
        info!("feed: loaded {} entries", count);
        Ok(count)
    }

    /// Alterna el "me gusta" de una entrada. Un fallo remoto se devuelve como
    /// error (consumiendo el del toggle).
    pub async fn toggle_like(&self, id: EntryId) -> Result<ToggleOutcome, WizardError> {
        let toggle = self.toggle(id).ok_or(SequenceError::UnknownEntry(id))?;
        let outcome = toggle.toggle().await;
        debug!("feed: entry {} toggle -> {:?}", id, outcome);
        if outcome == ToggleOutcome::Failed {
            if let Some(err) = toggle.take_error() {
                return Err(err);
            }
        }
        Ok(outcome)
    }

    /// Entradas en orden del servidor, con contador y `liked` del toggle.
    pub fn entries(&self) -> Vec<JournalEntry> {
        let mut list = lock_entries(&self.entries).clone();
        for e in &mut list {
            if let Some(t) = self.toggle(e.id) {
                e.like_count = t.count();
                e.liked = Some(t.is_active());
            }
        }
        list
    }

    pub fn get(&self, id: EntryId) -> Option<JournalEntry> {
        self.entries().into_iter().find(|e| e.id == id)
    }

    pub fn toggle(&self, id: EntryId) -> Option<Arc<OptimisticToggle>> {
        self.toggles.get(&id).map(|t| Arc::clone(t.value()))
    }

    pub fn len(&self) -> usize {
        lock_entries(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
