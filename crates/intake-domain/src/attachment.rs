//! Documento adjunto (IEP) y sus reglas de aceptación.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::DomainError;

/// Límite por defecto: 10 MiB.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// Archivo subido por el usuario. El contenido viaja tal cual al servicio
/// de extracción; aquí sólo se valida y se identifica por digest.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { file_name: file_name.into(),
               content_type: content_type.into(),
               bytes }
    }

    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(file_name, "application/pdf", bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Extensión en minúsculas, sin el punto.
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    /// SHA-256 hex del contenido (trazabilidad en logs y eventos).
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
    }
}

// El contenido puede ser grande: Debug muestra sólo metadatos.
impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
         .field("file_name", &self.file_name)
         .field("content_type", &self.content_type)
         .field("len", &self.bytes.len())
         .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRules {
    pub max_bytes: usize,
    /// Extensiones aceptadas, en minúsculas y sin punto.
    pub allowed_extensions: Vec<String>,
}

impl Default for AttachmentRules {
    fn default() -> Self {
        Self { max_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
               allowed_extensions: vec!["pdf".to_string()] }
    }
}

impl AttachmentRules {
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn validate(&self, attachment: &Attachment) -> Result<(), DomainError> {
        if attachment.is_empty() {
            return Err(DomainError::EmptyAttachment);
        }
        if attachment.len() > self.max_bytes {
            return Err(DomainError::AttachmentTooLarge { size: attachment.len(),
                                                         max: self.max_bytes });
        }
        let ext_ok = attachment.extension()
                               .map(|ext| self.allowed_extensions.iter().any(|a| *a == ext))
                               .unwrap_or(false);
        if !ext_ok {
            return Err(DomainError::UnsupportedAttachment { file_name: attachment.file_name.clone() });
        }
        Ok(())
    }
}
