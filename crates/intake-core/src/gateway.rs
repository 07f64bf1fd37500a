//! Contrato del servicio remoto consumido por el core.
//!
//! El core nunca implementa este trait: recibe una instancia construida
//! explícitamente (`Arc<dyn ServiceGateway>`), lo que permite dobles de test
//! y evita un cliente global de módulo.

use async_trait::async_trait;
use intake_domain::{Attachment, EntityId, EntryId, Goal, JournalEntry, PrimaryFields, StudentRecord};

use crate::errors::RemoteError;

#[async_trait]
pub trait ServiceGateway: Send + Sync {
    /// Crea la entidad primaria. `idempotency_key` es estable para reintentos
    /// con los mismos campos dentro de la misma generación de sesión.
    async fn create_primary(&self, fields: &PrimaryFields, idempotency_key: &str) -> Result<EntityId, RemoteError>;

    /// Extrae objetivos candidatos del documento. Puede devolver lista vacía.
    async fn extract(&self, attachment: &Attachment) -> Result<Vec<Goal>, RemoteError>;

    async fn save_selection(&self, id: EntityId, items: &[Goal]) -> Result<(), RemoteError>;

    /// Devuelve el contador autoritativo tras aplicar el "me gusta".
    async fn like(&self, id: EntryId) -> Result<u64, RemoteError>;

    async fn unlike(&self, id: EntryId) -> Result<u64, RemoteError>;

    async fn fetch_all(&self) -> Result<Vec<JournalEntry>, RemoteError>;

    async fn fetch_primary(&self, id: EntityId) -> Result<StudentRecord, RemoteError>;
}
