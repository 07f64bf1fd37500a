//! Gateway guionizado para los tests unitarios del crate.
//!
//! Cada operación consume la siguiente respuesta de su cola; con la cola
//! vacía responde con un valor neutro. Con `gated()`, las operaciones de
//! escritura avisan por `entered` y esperan a `gate` antes de responder.

use async_trait::async_trait;
use intake_domain::{Attachment, EntityId, EntryId, Goal, JournalEntry, PrimaryFields, StudentRecord};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

use crate::errors::RemoteError;
use crate::gateway::ServiceGateway;

type Queue<T> = Mutex<VecDeque<Result<T, RemoteError>>>;

#[derive(Default)]
pub(crate) struct StubGateway {
    creates: Queue<EntityId>,
    extracts: Queue<Vec<Goal>>,
    saves: Queue<()>,
    likes: Queue<u64>,
    unlikes: Queue<u64>,
    fetches: Queue<Vec<JournalEntry>>,
    pub create_calls: AtomicUsize,
    pub extract_calls: AtomicUsize,
    pub save_calls: AtomicUsize,
    pub like_calls: AtomicUsize,
    pub unlike_calls: AtomicUsize,
    pub saved: Mutex<Vec<Goal>>,
    gated: bool,
    pub entered: Notify,
    pub gate: Notify,
}

fn push<T>(queue: &Queue<T>, r: Result<T, RemoteError>) {
    queue.lock().unwrap().push_back(r);
}

fn pop<T>(queue: &Queue<T>, fallback: T) -> Result<T, RemoteError> {
    queue.lock().unwrap().pop_front().unwrap_or(Ok(fallback))
}

impl StubGateway {
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }
    pub fn with_create(self, r: Result<EntityId, RemoteError>) -> Self {
        push(&self.creates, r);
        self
    }
    pub fn with_extract(self, r: Result<Vec<Goal>, RemoteError>) -> Self {
        push(&self.extracts, r);
        self
    }
    pub fn with_save(self, r: Result<(), RemoteError>) -> Self {
        push(&self.saves, r);
        self
    }
    pub fn with_like(self, r: Result<u64, RemoteError>) -> Self {
        push(&self.likes, r);
        self
    }
    pub fn with_unlike(self, r: Result<u64, RemoteError>) -> Self {
        push(&self.unlikes, r);
        self
    }
    pub fn with_fetch(self, r: Result<Vec<JournalEntry>, RemoteError>) -> Self {
        push(&self.fetches, r);
        self
    }

    async fn checkpoint(&self) {
        if self.gated {
            self.entered.notify_one();
            self.gate.notified().await;
        }
    }
}

#[async_trait]
impl ServiceGateway for StubGateway {
    async fn create_primary(&self, _fields: &PrimaryFields, _key: &str) -> Result<EntityId, RemoteError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.checkpoint().await;
        pop(&self.creates, 1)
    }

    async fn extract(&self, _attachment: &Attachment) -> Result<Vec<Goal>, RemoteError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        pop(&self.extracts, vec![])
    }

    async fn save_selection(&self, _id: EntityId, items: &[Goal]) -> Result<(), RemoteError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        *self.saved.lock().unwrap() = items.to_vec();
        pop(&self.saves, ())
    }

    async fn like(&self, _id: EntryId) -> Result<u64, RemoteError> {
        self.like_calls.fetch_add(1, Ordering::SeqCst);
        self.checkpoint().await;
        pop(&self.likes, 1)
    }

    async fn unlike(&self, _id: EntryId) -> Result<u64, RemoteError> {
        self.unlike_calls.fetch_add(1, Ordering::SeqCst);
        self.checkpoint().await;
        pop(&self.unlikes, 0)
    }

    async fn fetch_all(&self) -> Result<Vec<JournalEntry>, RemoteError> {
        pop(&self.fetches, vec![])
    }

    async fn fetch_primary(&self, id: EntityId) -> Result<StudentRecord, RemoteError> {
        Err(RemoteError::status(404, format!("student {id} not found")))
    }
}

pub(crate) fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
