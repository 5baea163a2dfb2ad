//! In-memory [`DocumentStore`] for tests and local development.
//!
//! Collections are vectors behind a `std::sync::RwLock`, so documents
//! come back in insertion order. Filters are evaluated with
//! [`Filter::matches`].

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::filter::Filter;
use crate::models::StoredDocument;

use super::{prepare_document, DocumentStore, StoreError};

/// In-memory store, cleared when dropped.
pub struct InMemoryStore {
    name: String,
    collections: RwLock<BTreeMap<String, Vec<StoredDocument>>>,
}

impl InMemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collections: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(
        &self,
        collection: &str,
        document: Map<String, Value>,
    ) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let doc = StoredDocument::new(id.clone(), prepare_document(document));
        let mut collections = self.collections.write().map_err(poisoned)?;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(id)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| filter.matches(&d.fields))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::default();
        for (title, content, tags) in [
            ("T1", "hello world", json!(["go"])),
            ("T2", "World of Rust", json!(["rust", "golang"])),
            ("T3", "nothing here", json!([])),
        ] {
            store
                .insert(
                    "knowledgeitem",
                    body(json!({"title": title, "content": content, "tags": tags})),
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_insert_assigns_unique_ids() {
        let store = InMemoryStore::default();
        let a = store
            .insert("knowledgeitem", body(json!({"title": "a"})))
            .await
            .unwrap();
        let b = store
            .insert("knowledgeitem", body(json!({"title": "b"})))
            .await
            .unwrap();
        assert!(!a.is_empty());
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_find_all_in_insertion_order() {
        let store = seeded().await;
        let docs = store.find("knowledgeitem", &Filter::All, 50).await.unwrap();
        let titles: Vec<_> = docs.iter().map(|d| d.fields["title"].clone()).collect();
        assert_eq!(titles, vec![json!("T1"), json!("T2"), json!("T3")]);
    }

    #[tokio::test]
    async fn test_find_respects_limit() {
        let store = seeded().await;
        let docs = store.find("knowledgeitem", &Filter::All, 1).await.unwrap();
        assert_eq!(docs.len(), 1);
        let docs = store.find("knowledgeitem", &Filter::All, 0).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_find_by_tag_and_query() {
        let store = seeded().await;
        let by_tag = store
            .find("knowledgeitem", &Filter::for_listing(Some("go"), None), 50)
            .await
            .unwrap();
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].fields["title"], "T1");

        let by_q = store
            .find("knowledgeitem", &Filter::for_listing(None, Some("world")), 50)
            .await
            .unwrap();
        assert_eq!(by_q.len(), 2);

        let both = store
            .find(
                "knowledgeitem",
                &Filter::for_listing(Some("rust"), Some("world")),
                50,
            )
            .await
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].fields["title"], "T2");
    }

    #[tokio::test]
    async fn test_unknown_collection_is_empty() {
        let store = seeded().await;
        let docs = store.find("other", &Filter::All, 50).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_list_collection_names() {
        let store = seeded().await;
        store
            .insert("audit", body(json!({"event": "x"})))
            .await
            .unwrap();
        assert_eq!(
            store.list_collection_names().await.unwrap(),
            vec!["audit".to_string(), "knowledgeitem".to_string()]
        );
    }
}
