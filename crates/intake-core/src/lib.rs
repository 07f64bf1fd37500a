//! intake-core: sesión de intake, toggle optimista y feed del diario sobre
//! un `ServiceGateway` inyectado.

pub mod constants;
pub mod errors;
pub mod event;
pub mod feed;
pub mod gateway;
pub mod hashing;
pub mod session;
pub mod toggle;

#[cfg(test)]
pub(crate) mod testing;

pub use constants::{ALREADY_CREATED_NOTICE, IDEMPOTENCY_SCHEME, NOTHING_EXTRACTED_NOTICE};
pub use errors::{Operation, RemoteError, SequenceError, WizardError};
pub use event::{EventListener, EventStore, InMemoryEventStore, SessionEvent, SessionEventKind};
pub use feed::JournalFeed;
pub use gateway::ServiceGateway;
pub use session::{idempotency_key, CompletionListener, SessionBuilder, SessionSnapshot, WizardSession, WizardStep};
pub use toggle::{CountListener, OptimisticToggle, ToggleOutcome};
