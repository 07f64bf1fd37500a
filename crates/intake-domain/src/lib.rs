// intake-domain: tipos de valor del intake de alumnos y del diario
pub mod attachment;
pub mod entry;
pub mod error;
pub mod fields;
pub mod goal;

pub use attachment::{Attachment, AttachmentRules, DEFAULT_MAX_ATTACHMENT_BYTES};
pub use entry::{EntityId, EntryId, JournalEntry, StudentRecord};
pub use error::DomainError;
pub use fields::{FieldRule, FieldRules, PrimaryFields, STUDENT_GRADES};
pub use goal::{Goal, StoredGoal};
