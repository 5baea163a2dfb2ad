//! # Chat Knowledge
//!
//! A small HTTP backend for storing and searching knowledge items: titled
//! pieces of content with optional tags and source attribution.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────────┐
//! │   HTTP   │──▶│  Validation  │──▶│ DocumentStore  │
//! │  (axum)  │   │ KnowledgeItem│   │ SQLite / memory│
//! └──────────┘   └──────────────┘   └────────────────┘
//! ```
//!
//! The schema, filter builder, and store trait live in `knowledge-core`;
//! this crate adds configuration, the SQLite adapter, and the server.
//!
//! ## Quick Start
//!
//! ```bash
//! export DATABASE_URL=sqlite:data/knowledge.sqlite
//! chat-knowledge init           # create the schema
//! chat-knowledge serve          # listen on 0.0.0.0:$PORT (default 8000)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`db`] | Connection and store selection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite document store |
//! | [`server`] | HTTP routes |

pub mod config;
pub mod db;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
