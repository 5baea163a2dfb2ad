//! SQLite-backed [`DocumentStore`].
//!
//! Documents live as JSON text in a single `documents` table keyed by
//! `(database, collection)`. A [`Filter`] becomes a parameterised `WHERE`
//! clause built with SQLite's JSON1 functions:
//!
//! | Filter | SQL |
//! |--------|-----|
//! | `TagEquals(t)` | `EXISTS (SELECT 1 FROM json_each(body, '$.tags') ... value = ?)` |
//! | `TextMatchesAny` | not pushed down; rows are checked with [`Filter::matches`] |
//! | `And` | clauses AND-ed |
//!
//! When any clause is not pushed down, `LIMIT` is applied after the
//! in-process check instead of in SQL.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use knowledge_core::filter::Filter;
use knowledge_core::models::StoredDocument;
use knowledge_core::store::{prepare_document, DocumentStore, StoreError};

use crate::{db, migrate};

pub struct SqliteStore {
    pool: SqlitePool,
    database: String,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }

    /// Connect to `url` and make sure the schema exists.
    pub async fn open(url: &str, database: &str) -> anyhow::Result<Self> {
        let pool = db::connect(url).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool, database))
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Append the SQL form of `filter` to `qb`.
///
/// Returns `false` when part of the filter was left out of the SQL and the
/// fetched rows still have to be checked with [`Filter::matches`]. Text
/// matching is always left out: SQLite's `lower()` folds ASCII only, while
/// the reference matcher folds Unicode.
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) -> bool {
    match filter {
        Filter::All => {
            qb.push("1");
            true
        }
        Filter::TagEquals(tag) => {
            qb.push(
                "EXISTS (SELECT 1 FROM json_each(body, '$.tags') AS t \
                 WHERE t.type = 'text' AND t.value = ",
            );
            qb.push_bind(tag.clone());
            qb.push(")");
            true
        }
        Filter::TextMatchesAny { .. } => {
            qb.push("1");
            false
        }
        Filter::And(clauses) => {
            if clauses.is_empty() {
                qb.push("1");
                return true;
            }
            let mut exact = true;
            qb.push("(");
            for (i, clause) in clauses.iter().enumerate() {
                if i > 0 {
                    qb.push(" AND ");
                }
                exact &= push_filter(qb, clause);
            }
            qb.push(")");
            exact
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn name(&self) -> &str {
        &self.database
    }

    async fn insert(
        &self,
        collection: &str,
        document: Map<String, Value>,
    ) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let body = prepare_document(document);
        let created_at = body
            .get("created_at")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let body = serde_json::to_string(&body)?;

        sqlx::query(
            "INSERT INTO documents (id, database, collection, body, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&self.database)
        .bind(collection)
        .bind(&body)
        .bind(&created_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(id)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT id, body FROM documents WHERE database = ");
        qb.push_bind(self.database.clone());
        qb.push(" AND collection = ");
        qb.push_bind(collection.to_string());
        let exact = if filter.is_all() {
            true
        } else {
            qb.push(" AND ");
            push_filter(&mut qb, filter)
        };
        qb.push(" ORDER BY seq");
        if exact {
            qb.push(" LIMIT ");
            qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = qb.build().fetch_all(&self.pool).await.map_err(backend)?;

        let mut docs = Vec::new();
        for row in &rows {
            if docs.len() >= limit {
                break;
            }
            let id: String = row.get("id");
            let body: String = row.get("body");
            let fields: Map<String, Value> = serde_json::from_str(&body)?;
            if exact || filter.matches(&fields) {
                docs.push(StoredDocument::new(id, fields));
            }
        }
        Ok(docs)
    }

    async fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT collection FROM documents WHERE database = ? ORDER BY collection",
        )
        .bind(&self.database)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }
}
