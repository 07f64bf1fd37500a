//! Definiciones de eventos de sesión, trait EventStore y listeners.

mod store;
mod types;

pub use store::{EventStore, InMemoryEventStore};
pub use types::{EventListener, SessionEvent, SessionEventKind};
