//! Database connection and store selection.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use knowledge_core::store::memory::InMemoryStore;
use knowledge_core::store::StoreHandle;

use crate::config::DbConfig;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

const MEMORY_SCHEME: &str = "memory://";

/// Open a SQLite pool for `url` (`sqlite:<path>`, `sqlite::memory:`, or a bare path).
pub async fn connect(url: &str) -> Result<SqlitePool> {
    let url = if url.starts_with("sqlite:") {
        url.to_string()
    } else {
        format!("sqlite:{}", url)
    };
    let in_memory = url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(&url)
        .with_context(|| "Invalid DATABASE_URL")?
        .create_if_missing(true);

    if !in_memory {
        // Ensure parent directory exists
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| "Failed to create database directory")?;
            }
        }
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    // Each connection to `:memory:` is a separate database.
    let max_connections = if in_memory { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .with_context(|| "Failed to connect to database")?;

    Ok(pool)
}

/// Build the process-wide store handle from configuration.
///
/// Never fails: a missing URL or a connection error yields
/// [`StoreHandle::Disconnected`] and the server keeps running.
pub async fn open_store(db: &DbConfig) -> StoreHandle {
    let name = db.database_name();
    let Some(url) = db.url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, running without a database");
        return StoreHandle::Disconnected;
    };

    if url.starts_with(MEMORY_SCHEME) {
        tracing::info!(backend = "memory", database = name, "database connected");
        return StoreHandle::connected(InMemoryStore::new(name));
    }

    match SqliteStore::open(url, name).await {
        Ok(store) => {
            tracing::info!(backend = "sqlite", database = name, "database connected");
            StoreHandle::connected(store)
        }
        Err(e) => {
            tracing::error!("database unavailable, running without a database: {:#}", e);
            StoreHandle::Disconnected
        }
    }
}

/// Create the schema for the configured database. Used by the `init` command.
pub async fn init_database(db: &DbConfig) -> Result<()> {
    let url = db
        .url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;

    if url.starts_with(MEMORY_SCHEME) {
        println!("In-memory store needs no initialization.");
        return Ok(());
    }

    let pool = connect(url).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;

    println!("Database initialized successfully.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_no_url_is_disconnected() {
        let handle = open_store(&DbConfig::default()).await;
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn test_memory_url_connects() {
        let db = DbConfig {
            url: Some("memory://".into()),
            name: Some("chat".into()),
        };
        let handle = open_store(&db).await;
        assert_eq!(handle.store().unwrap().name(), "chat");
    }

    #[tokio::test]
    async fn test_sqlite_url_creates_file_in_new_directory() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("kb.sqlite");
        let db = DbConfig {
            url: Some(format!("sqlite:{}", path.display())),
            name: None,
        };
        let handle = open_store(&db).await;
        assert!(handle.is_connected());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_unreachable_database_is_disconnected() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let db = DbConfig {
            url: Some(format!("sqlite:{}", blocker.join("kb.sqlite").display())),
            name: None,
        };
        let handle = open_store(&db).await;
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn test_init_database_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let db = DbConfig {
            url: Some(tmp.path().join("kb.sqlite").display().to_string()),
            name: None,
        };
        init_database(&db).await.unwrap();
        init_database(&db).await.unwrap();
    }

    #[tokio::test]
    async fn test_init_database_requires_url() {
        assert!(init_database(&DbConfig::default()).await.is_err());
    }
}
