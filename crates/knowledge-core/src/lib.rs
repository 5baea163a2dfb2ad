//! # Knowledge Core
//!
//! Shared logic for Chat Knowledge: the knowledge item schema, the typed
//! listing filter, the document store abstraction, and an in-memory store.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. Storage
//! backends with native I/O live in the `chat-knowledge` crate and
//! implement [`store::DocumentStore`].

pub mod filter;
pub mod models;
pub mod store;

/// Name of the collection that holds every knowledge item.
pub const KNOWLEDGE_COLLECTION: &str = "knowledgeitem";
