//! Knowledge item schema.
//!
//! A [`NewKnowledgeItem`] is what a client sends; [`KnowledgeItem::validate`]
//! turns it into the persisted shape or rejects it with a
//! [`ValidationError`]. Validation always runs before a write.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Create-request body as received from a client.
#[derive(Debug, Clone, Deserialize)]
pub struct NewKnowledgeItem {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub source: Option<String>,
}

/// A validated knowledge item, ready to be written to a store.
///
/// The identifier is not part of the item: the store assigns it on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Reason a create request was rejected before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
}

impl KnowledgeItem {
    /// Apply the schema to a create request.
    pub fn validate(input: NewKnowledgeItem) -> Result<Self, ValidationError> {
        if input.title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        Ok(Self {
            title: input.title,
            content: input.content,
            tags: input.tags.unwrap_or_default(),
            source: input.source,
        })
    }

    /// Convert into a JSON document for [`DocumentStore::insert`](crate::store::DocumentStore::insert).
    pub fn to_document(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            // A struct with named fields always serialises to an object.
            _ => serde_json::Map::new(),
        }
    }
}

/// A document read back from a store.
///
/// Serialises flat, with the store-assigned identifier under `id`:
///
/// ```json
/// { "id": "6f1c...", "title": "T1", "content": "hello world", "tags": ["go"] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDocument {
    pub id: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl StoredDocument {
    /// Build a document from its identifier and stored body, dropping any
    /// identifier keys the body may carry so that `id` is the only one.
    pub fn new(id: impl Into<String>, mut fields: serde_json::Map<String, serde_json::Value>) -> Self {
        fields.remove("id");
        fields.remove("_id");
        Self {
            id: id.into(),
            fields,
        }
    }
}
