//! Backend en memoria, determinista, para tests y demos.
//!
//! - Alumnos con ids incrementales; la misma clave de idempotencia devuelve
//!   el mismo id.
//! - Extracción configurable; por defecto aplica las reglas regex
//!   `Goal N: ...` / `Baseline: ...` sobre el texto del adjunto.
//! - "Me gusta" por entrada, uno por visitante.
//! - Fallos inyectables por operación, antes o después de aplicar la escritura.

use async_trait::async_trait;
use indexmap::IndexMap;
use intake_core::{Operation, RemoteError, ServiceGateway};
use intake_domain::{Attachment, EntityId, EntryId, Goal, JournalEntry, PrimaryFields, StoredGoal, StudentRecord};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const NO_BASELINE: &str = "No baseline found";
const DEFAULT_VIEWER: &str = "anonymous";

static GOAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Goal \d+:?\s*([^.]+\.)").expect("valid regex"));
static BASELINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Baseline:?\s*([^.]+\.)").expect("valid regex"));

/// Extrae pares objetivo/baseline de un texto: el i-ésimo objetivo se empareja
/// con el i-ésimo baseline, o con `NO_BASELINE` si no hay tantos.
pub fn extract_goals_from_text(text: &str) -> Vec<Goal> {
    let baselines: Vec<&str> = BASELINE_RE.captures_iter(text)
                                          .filter_map(|c| c.get(1))
                                          .map(|m| m.as_str().trim())
                                          .collect();
    GOAL_RE.captures_iter(text)
           .filter_map(|c| c.get(1))
           .enumerate()
           .map(|(i, m)| Goal::new(m.as_str().trim(), baselines.get(i).copied().unwrap_or(NO_BASELINE)))
           .collect()
}

/// Extractor de candidatos a partir de un adjunto.
pub type Extractor = Arc<dyn Fn(&Attachment) -> Vec<Goal> + Send + Sync>;

fn text_extractor() -> Extractor {
    Arc::new(|a: &Attachment| extract_goals_from_text(&String::from_utf8_lossy(&a.bytes)))
}

#[derive(Default)]
struct MemoryState {
    students: IndexMap<EntityId, StudentRecord>,
    keys: HashMap<String, EntityId>,
    next_goal_id: u64,
    entries: IndexMap<EntryId, JournalEntry>,
    likers: HashMap<EntryId, HashSet<String>>,
    failures: HashMap<Operation, VecDeque<RemoteError>>,
    // Fallos que se devuelven tras aplicar la operación (respuesta perdida).
    late_failures: HashMap<Operation, VecDeque<RemoteError>>,
    calls: HashMap<Operation, usize>,
}

impl MemoryState {
    fn begin(&mut self, op: Operation) -> Result<(), RemoteError> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => {
                debug!("memory gateway: injected failure for {op}");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn finish<T>(&mut self, op: Operation, value: T) -> Result<T, RemoteError> {
        match self.late_failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => {
                debug!("memory gateway: {op} applied, reporting injected failure");
                Err(err)
            }
            None => Ok(value),
        }
    }
}

pub struct InMemoryGateway {
    state: Mutex<MemoryState>,
    extractor: Extractor,
    viewer: String,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self { state: Mutex::new(MemoryState::default()),
               extractor: text_extractor(),
               viewer: DEFAULT_VIEWER.to_string() }
    }

    pub fn with_extractor(mut self, extractor: impl Fn(&Attachment) -> Vec<Goal> + Send + Sync + 'static) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Identidad del visitante para la que se registran los "me gusta".
    pub fn with_viewer(mut self, viewer: impl Into<String>) -> Self {
        self.viewer = viewer.into();
        self
    }

    pub fn with_entries(self, entries: impl IntoIterator<Item = JournalEntry>) -> Self {
        {
            let mut st = self.lock();
            for e in entries {
                st.entries.insert(e.id, e);
            }
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// La próxima llamada a `op` fallará con `err`.
    pub fn fail_next(&self, op: Operation, err: RemoteError) {
        self.lock().failures.entry(op).or_default().push_back(err);
    }

    /// La próxima llamada a `op` se aplica igualmente, pero responde con `err`:
    /// el servidor guardó y el cliente sólo ve el fallo.
    pub fn fail_after_commit(&self, op: Operation, err: RemoteError) {
        self.lock().late_failures.entry(op).or_default().push_back(err);
    }

    /// Número de llamadas recibidas para `op` (incluidas las fallidas).
    pub fn calls(&self, op: Operation) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn student(&self, id: EntityId) -> Option<StudentRecord> {
        self.lock().students.get(&id).cloned()
    }

    pub fn student_count(&self) -> usize {
        self.lock().students.len()
    }
}

#[async_trait]
impl ServiceGateway for InMemoryGateway {
    async fn create_primary(&self, fields: &PrimaryFields, idempotency_key: &str) -> Result<EntityId, RemoteError> {
        let mut st = self.lock();
        st.begin(Operation::CreatePrimary)?;
        if let Some(id) = st.keys.get(idempotency_key) {
            let id = *id;
            debug!("memory gateway: key {idempotency_key} already used for student {id}");
            return st.finish(Operation::CreatePrimary, id);
        }
        let id = st.students.len() as EntityId + 1;
        let record = StudentRecord { id,
                                     name: fields.get("name").unwrap_or_default().to_string(),
                                     grade: fields.get("grade").unwrap_or_default().to_string(),
                                     goals: Vec::new() };
        st.students.insert(id, record);
        st.keys.insert(idempotency_key.to_string(), id);
        st.finish(Operation::CreatePrimary, id)
    }

    async fn extract(&self, attachment: &Attachment) -> Result<Vec<Goal>, RemoteError> {
        self.lock().begin(Operation::Extract)?;
        if attachment.is_empty() {
            return Err(RemoteError::status(400, "No file selected"));
        }
        Ok((self.extractor)(attachment))
    }

    async fn save_selection(&self, id: EntityId, items: &[Goal]) -> Result<(), RemoteError> {
        let mut st = self.lock();
        st.begin(Operation::SaveSelection)?;
        let mut next = st.next_goal_id;
        let student = st.students
                        .get_mut(&id)
                        .ok_or_else(|| RemoteError::status(404, format!("student {id} not found")))?;
        for g in items {
            next += 1;
            student.goals.push(StoredGoal { id: Some(next),
                                            text: g.text.clone(),
                                            baseline: Some(g.baseline.clone()) });
        }
        st.next_goal_id = next;
        st.finish(Operation::SaveSelection, ())
    }

    async fn like(&self, id: EntryId) -> Result<u64, RemoteError> {
        let mut st = self.lock();
        st.begin(Operation::Like)?;
        if !st.entries.contains_key(&id) {
            return Err(RemoteError::status(404, format!("entry {id} not found")));
        }
        let added = st.likers.entry(id).or_default().insert(self.viewer.clone());
        let entry = st.entries
                      .get_mut(&id)
                      .ok_or_else(|| RemoteError::status(404, format!("entry {id} not found")))?;
        if added {
            entry.like_count += 1;
        }
        let count = entry.like_count;
        st.finish(Operation::Like, count)
    }

    async fn unlike(&self, id: EntryId) -> Result<u64, RemoteError> {
        let mut st = self.lock();
        st.begin(Operation::Unlike)?;
        if !st.entries.contains_key(&id) {
            return Err(RemoteError::status(404, format!("entry {id} not found")));
        }
        let removed = st.likers.get_mut(&id).is_some_and(|set| set.remove(&self.viewer));
        let entry = st.entries
                      .get_mut(&id)
                      .ok_or_else(|| RemoteError::status(404, format!("entry {id} not found")))?;
        if removed {
            entry.like_count = entry.like_count.saturating_sub(1);
        }
        let count = entry.like_count;
        st.finish(Operation::Unlike, count)
    }

    async fn fetch_all(&self) -> Result<Vec<JournalEntry>, RemoteError> {
        let mut st = self.lock();
        st.begin(Operation::FetchAll)?;
        let list = st.entries
                     .values()
                     .map(|e| {
                         let mut e = e.clone();
                         e.liked = Some(st.likers.get(&e.id).is_some_and(|s| s.contains(&self.viewer)));
                         e
                     })
                     .collect();
        Ok(list)
    }

    async fn fetch_primary(&self, id: EntityId) -> Result<StudentRecord, RemoteError> {
        let mut st = self.lock();
        st.begin(Operation::FetchPrimary)?;
        st.students
          .get(&id)
          .cloned()
          .ok_or_else(|| RemoteError::status(404, format!("student {id} not found")))
    }
}
