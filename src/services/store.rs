//! Document store adapter — the seam to the external persistence service.
//!
//! DESIGN
//! ======
//! The realtime server consumes exactly two operations from the document
//! store: read-document-by-id and write-document-by-id. `DocumentStore` is
//! the trait seam; `HttpStore` speaks JSON to the real store, `MemoryStore`
//! backs unconfigured deployments and tests. Retry policy lives in the
//! saver, not here: an adapter call is a single attempt.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::Document;

const LOAD_TIMEOUT_SECS: u64 = 5;
const SAVE_TIMEOUT_SECS: u64 = 10;
const CONNECT_TIMEOUT_SECS: u64 = 2;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(String),
    #[error("store request timed out after {0}s")]
    Timeout(u64),
    #[error("store returned status {status}")]
    Status { status: u16 },
    #[error("store response decode failed: {0}")]
    Decode(String),
}

/// Read/write access to whiteboard documents by room id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the stored document, or `None` when the store has no record.
    async fn load(&self, room_id: &str) -> Result<Option<Document>, StoreError>;

    /// Overwrite the stored document with the given snapshot.
    async fn save(&self, room_id: &str, document: &Document) -> Result<(), StoreError>;
}

// =============================================================================
// HTTP STORE
// =============================================================================

/// Adapter for a document store reached over HTTP:
/// `GET {base}/documents/{room_id}` and `PUT {base}/documents/{room_id}`.
pub struct HttpStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpStore {
    /// # Errors
    ///
    /// Returns `Request` if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub(crate) fn document_url(&self, room_id: &str) -> String {
        format!("{}/documents/{room_id}", self.base_url)
    }
}

fn request_error(e: &reqwest::Error, timeout_secs: u64) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout(timeout_secs)
    } else {
        StoreError::Request(e.to_string())
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn load(&self, room_id: &str) -> Result<Option<Document>, StoreError> {
        let response = self
            .http
            .get(self.document_url(room_id))
            .timeout(std::time::Duration::from_secs(LOAD_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| request_error(&e, LOAD_TIMEOUT_SECS))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Status { status: response.status().as_u16() });
        }

        let document = response
            .json::<Document>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(Some(document))
    }

    async fn save(&self, room_id: &str, document: &Document) -> Result<(), StoreError> {
        let response = self
            .http
            .put(self.document_url(room_id))
            .timeout(std::time::Duration::from_secs(SAVE_TIMEOUT_SECS))
            .json(document)
            .send()
            .await
            .map_err(|e| request_error(&e, SAVE_TIMEOUT_SECS))?;

        if !response.status().is_success() {
            return Err(StoreError::Status { status: response.status().as_u16() });
        }
        Ok(())
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Process-local store used when no `STORE_URL` is configured, and in tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, Document>>,
}

impl MemoryStore {
    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self, room_id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.inner.read().await.get(room_id).cloned())
    }

    async fn save(&self, room_id: &str, document: &Document) -> Result<(), StoreError> {
        self.inner.write().await.insert(room_id.to_string(), document.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
