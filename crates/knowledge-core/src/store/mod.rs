//! Document storage abstraction.
//!
//! The [`DocumentStore`] trait is the only way request handlers reach
//! persisted data. Backends (SQLite, in-memory) translate a [`Filter`]
//! into their own query form and return [`StoredDocument`]s with string
//! identifiers.
//!
//! A process holds exactly one [`StoreHandle`], built once at startup. It
//! is either connected to a backend or explicitly disconnected; every
//! operation checks that state first, so a missing database surfaces as
//! [`StoreError::Unavailable`] instead of a crash.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::filter::Filter;
use crate::models::StoredDocument;

/// Failure of a store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No backend is connected.
    #[error("Database not available. Check DATABASE_URL and DATABASE_NAME environment variables.")]
    Unavailable,
    /// The backend rejected or failed the operation.
    #[error("database error: {0}")]
    Backend(String),
    /// A document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Abstract document store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`name`](DocumentStore::name) | Logical database name |
/// | [`insert`](DocumentStore::insert) | Insert a document, returning its new id |
/// | [`find`](DocumentStore::find) | Documents matching a filter, insertion order, capped |
/// | [`list_collection_names`](DocumentStore::list_collection_names) | Collections holding documents |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &str;

    /// Insert `document` into `collection`.
    ///
    /// The store assigns the identifier and stamps `created_at` /
    /// `updated_at`. Any `id` or `_id` key in `document` is ignored.
    async fn insert(&self, collection: &str, document: Map<String, Value>)
        -> Result<String, StoreError>;

    /// Return at most `limit` documents of `collection` matching `filter`,
    /// oldest first.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<StoredDocument>, StoreError>;

    async fn list_collection_names(&self) -> Result<Vec<String>, StoreError>;
}

/// Process-wide handle to the document store.
#[derive(Clone)]
pub enum StoreHandle {
    Connected(Arc<dyn DocumentStore>),
    Disconnected,
}

impl StoreHandle {
    pub fn connected<S: DocumentStore + 'static>(store: S) -> Self {
        StoreHandle::Connected(Arc::new(store))
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, StoreHandle::Connected(_))
    }

    /// The connected backend, or [`StoreError::Unavailable`].
    pub fn store(&self) -> Result<&Arc<dyn DocumentStore>, StoreError> {
        match self {
            StoreHandle::Connected(store) => Ok(store),
            StoreHandle::Disconnected => Err(StoreError::Unavailable),
        }
    }

    pub async fn insert(
        &self,
        collection: &str,
        document: Map<String, Value>,
    ) -> Result<String, StoreError> {
        self.store()?.insert(collection, document).await
    }

    pub async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.store()?.find(collection, filter, limit).await
    }

    pub async fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
        self.store()?.list_collection_names().await
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreHandle::Connected(store) => write!(f, "Connected({})", store.name()),
            StoreHandle::Disconnected => f.write_str("Disconnected"),
        }
    }
}

/// Prepare a document body for insertion: strip identifier keys and set
/// `created_at` / `updated_at` to the current UTC time.
pub fn prepare_document(mut document: Map<String, Value>) -> Map<String, Value> {
    document.remove("id");
    document.remove("_id");
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    document.insert("created_at".to_string(), Value::String(now.clone()));
    document.insert("updated_at".to_string(), Value::String(now));
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_disconnected_handle_reports_unavailable() {
        let handle = StoreHandle::Disconnected;
        assert!(!handle.is_connected());
        let err = handle.insert("knowledgeitem", Map::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable));
        let err = handle
            .find("knowledgeitem", &Filter::All, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable));
        assert!(handle.list_collection_names().await.is_err());
    }

    #[test]
    fn test_prepare_document_stamps_and_strips_ids() {
        let mut body = Map::new();
        body.insert("_id".into(), json!("x"));
        body.insert("id".into(), json!("y"));
        body.insert("title".into(), json!("T"));
        let prepared = prepare_document(body);
        assert!(!prepared.contains_key("_id"));
        assert!(!prepared.contains_key("id"));
        assert_eq!(prepared["created_at"], prepared["updated_at"]);
        assert!(prepared["created_at"].as_str().unwrap().ends_with('Z'));
    }
}
