use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::goal::StoredGoal;

/// Identificador de una entidad primaria (alumno) asignado por el servidor.
pub type EntityId = u64;
/// Identificador de una entrada del diario.
pub type EntryId = u64;

/// Entrada del diario de viaje tal como la devuelve `GET /entries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    pub title: String,
    #[serde(rename = "content")]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "date_created")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "likes_count")]
    pub like_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Estado "me gusta" del visitante si el servidor lo informa.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
}

impl JournalEntry {
    pub fn new(id: EntryId, title: impl Into<String>, body: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self { id,
               title: title.into(),
               body: body.into(),
               tags: Vec::new(),
               created_at,
               like_count: 0,
               location: None,
               liked: None }
    }

    pub fn with_likes(mut self, like_count: u64) -> Self {
        self.like_count = like_count;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Alumno persistido, con sus objetivos guardados.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: EntityId,
    pub name: String,
    pub grade: String,
    #[serde(default)]
    pub goals: Vec<StoredGoal>,
}
