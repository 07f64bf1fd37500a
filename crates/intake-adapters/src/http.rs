//! `ServiceGateway` sobre HTTP (reqwest) con el layout REST del backend:
//!
//! - `POST /students` (multipart `name`, `grade`; cabecera `Idempotency-Key`)
//! - `POST /extract-goals` (multipart `iep_file`)
//! - `POST /students/{id}/goals` (JSON `{goals}`)
//! - `GET /students/{id}`, `GET /entries`
//! - `POST /entries/{id}/like` y `/unlike`
//!
//! Cualquier status no 2xx, fallo de transporte, cuerpo `success: false` o
//! JSON malformado termina en `RemoteError`.

use async_trait::async_trait;
use intake_core::{RemoteError, ServiceGateway};
use intake_domain::{Attachment, EntityId, EntryId, Goal, JournalEntry, PrimaryFields, StudentRecord};
use log::{debug, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ApiConfig;
use crate::error::AdapterError;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Deserialize)]
struct StudentCreated {
    student_id: EntityId,
}

#[derive(Deserialize)]
struct GoalsExtracted {
    #[serde(default)]
    goals: Vec<Goal>,
}

#[derive(Deserialize)]
struct LikeCount {
    likes_count: u64,
}

// `GET /entries` puede responder la lista desnuda o envuelta.
#[derive(Deserialize)]
#[serde(untagged)]
enum EntriesBody {
    List(Vec<JournalEntry>),
    Wrapped { entries: Vec<JournalEntry> },
}

fn error_message(body: &Value) -> Option<String> {
    body.get("error")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(config: &ApiConfig) -> Result<Self, AdapterError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client,
                  base_url: config.base_url.trim_end_matches('/').to_string() })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Traduce la respuesta a `T` o a `RemoteError`, conservando el status.
    async fn decode<T: DeserializeOwned>(op: &str, sent: Result<Response, reqwest::Error>) -> Result<T, RemoteError> {
        let resp = sent.map_err(|e| {
                           warn!("{op}: transport error: {e}");
                           RemoteError::transport(e.to_string())
                       })?;
        let status = resp.status();
        let bytes = resp.bytes()
                        .await
                        .map_err(|e| RemoteError::transport(format!("{op}: reading body: {e}")))?;
        let body: Option<Value> = serde_json::from_slice(&bytes).ok();

        if !status.is_success() {
            let msg = body.as_ref()
                          .and_then(error_message)
                          .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            warn!("{op}: status {} ({msg})", status.as_u16());
            return Err(RemoteError::status(status.as_u16(), msg));
        }
        let body = body.ok_or_else(|| RemoteError::malformed(format!("{op}: body is not JSON")))?;
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            let msg = error_message(&body).unwrap_or_else(|| "request was not successful".to_string());
            warn!("{op}: server reported failure: {msg}");
            return Err(RemoteError::status(status.as_u16(), msg));
        }
        serde_json::from_value(body).map_err(|e| RemoteError::malformed(format!("{op}: {e}")))
    }
}

#[async_trait]
impl ServiceGateway for HttpGateway {
    async fn create_primary(&self, fields: &PrimaryFields, idempotency_key: &str) -> Result<EntityId, RemoteError> {
        let mut form = Form::new();
        for (name, value) in fields.iter() {
            form = form.text(name.to_string(), value.to_string());
        }
        debug!("POST /students key={idempotency_key}");
        let sent = self.client
                       .post(self.url("students"))
                       .header(IDEMPOTENCY_HEADER, idempotency_key)
                       .multipart(form)
                       .send()
                       .await;
        let created: StudentCreated = Self::decode("create_primary", sent).await?;
        Ok(created.student_id)
    }

    async fn extract(&self, attachment: &Attachment) -> Result<Vec<Goal>, RemoteError> {
        let part = || Part::bytes(attachment.bytes.clone()).file_name(attachment.file_name.clone());
        let part = part().mime_str(&attachment.content_type).unwrap_or_else(|_| part());
        debug!("POST /extract-goals file={} ({} bytes)", attachment.file_name, attachment.len());
        let sent = self.client
                       .post(self.url("extract-goals"))
                       .multipart(Form::new().part("iep_file", part))
                       .send()
                       .await;
        let extracted: GoalsExtracted = Self::decode("extract", sent).await?;
        Ok(extracted.goals)
    }

    async fn save_selection(&self, id: EntityId, items: &[Goal]) -> Result<(), RemoteError> {
        debug!("POST /students/{id}/goals count={}", items.len());
        let sent = self.client
                       .post(self.url(&format!("students/{id}/goals")))
                       .json(&json!({ "goals": items }))
                       .send()
                       .await;
        let _: Value = Self::decode("save_selection", sent).await?;
        Ok(())
    }

    async fn like(&self, id: EntryId) -> Result<u64, RemoteError> {
        let sent = self.client.post(self.url(&format!("entries/{id}/like"))).send().await;
        let body: LikeCount = Self::decode("like", sent).await?;
        Ok(body.likes_count)
    }

    async fn unlike(&self, id: EntryId) -> Result<u64, RemoteError> {
        let sent = self.client.post(self.url(&format!("entries/{id}/unlike"))).send().await;
        let body: LikeCount = Self::decode("unlike", sent).await?;
        Ok(body.likes_count)
    }

    async fn fetch_all(&self) -> Result<Vec<JournalEntry>, RemoteError> {
        let sent = self.client.get(self.url("entries")).send().await;
        Ok(match Self::decode::<EntriesBody>("fetch_all", sent).await? {
               EntriesBody::List(list) => list,
               EntriesBody::Wrapped { entries } => entries,
           })
    }

    async fn fetch_primary(&self, id: EntityId) -> Result<StudentRecord, RemoteError> {
        let sent = self.client.get(self.url(&format!("students/{id}"))).send().await;
        Self::decode("fetch_primary", sent).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let gw = HttpGateway::new(&ApiConfig::new("http://localhost:5000/api/")).unwrap();
        assert_eq!(gw.base_url(), "http://localhost:5000/api");
        assert_eq!(gw.url("/students/3/goals"), "http://localhost:5000/api/students/3/goals");
    }

    #[test]
    fn error_message_prefers_error_key() {
        assert_eq!(error_message(&json!({"success": false, "error": "No file uploaded"})).as_deref(),
                   Some("No file uploaded"));
        assert_eq!(error_message(&json!({"message": "gone"})).as_deref(), Some("gone"));
        assert_eq!(error_message(&json!({"success": false})), None);
    }
}
