//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Fixed banner message |
//! | `GET`  | `/api/hello` | Fixed greeting |
//! | `GET`  | `/test` | Backend and database diagnostics (always 200) |
//! | `POST` | `/api/knowledge` | Validate and store a knowledge item |
//! | `GET`  | `/api/knowledge` | List items, filtered by `tag` and `q`, capped by `limit` |
//!
//! # Error Contract
//!
//! Errors carry a single human-readable field:
//!
//! ```json
//! { "detail": "title must not be empty" }
//! ```
//!
//! Creating an item answers `400` for any failure, whether the body was
//! rejected or the store failed. Listing answers `400` for a malformed
//! query string and `5xx` when the store fails.
//!
//! # CORS
//!
//! Any origin, method, and header is accepted and credentials are allowed.
//! Origins are mirrored back rather than answered with `*`, since browsers
//! refuse a wildcard origin on credentialed requests.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use knowledge_core::filter::Filter;
use knowledge_core::models::{KnowledgeItem, NewKnowledgeItem, StoredDocument};
use knowledge_core::store::{StoreError, StoreHandle};
use knowledge_core::KNOWLEDGE_COLLECTION;

use crate::config::Config;
use crate::db;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone, Debug)]
pub struct AppState {
    pub store: StoreHandle,
    /// Whether `DATABASE_URL` was set in the environment. The value itself is never exposed.
    pub database_url_set: bool,
    /// Whether `DATABASE_NAME` or `DATABASE_ID` was set in the environment.
    pub database_name_set: bool,
}

impl AppState {
    pub fn new(config: &Config, store: StoreHandle) -> Self {
        Self {
            store,
            database_url_set: config.env.database_url,
            database_name_set: config.env.database_name,
        }
    }
}

/// Starts the HTTP server, connecting to the configured database first.
///
/// A database that is missing or unreachable does not stop the server:
/// it starts disconnected and reports so on `GET /test`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = db::open_store(&config.db).await;
    run_server_with_store(config, store).await
}

/// Starts the HTTP server with an already-built store handle.
///
/// Returns an error only if the listen address cannot be bound.
pub async fn run_server_with_store(config: &Config, store: StoreHandle) -> anyhow::Result<()> {
    let bind_addr = config.server.bind_addr();
    let app = build_router(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the router with CORS and request tracing layers.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Router::new()
        .route("/", get(handle_root))
        .route("/api/hello", get(handle_hello))
        .route("/test", get(handle_diagnostics))
        .route(
            "/api/knowledge",
            get(handle_list_knowledge).post(handle_add_knowledge),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

fn bad_request(detail: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        detail: detail.into(),
    }
}

/// Maps a store failure on a read path to a server error: `503` when no
/// database is connected, `500` otherwise.
fn store_failure(err: StoreError) -> ApiError {
    let status = match err {
        StoreError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Backend(_) | StoreError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiError {
        status,
        detail: err.to_string(),
    }
}

// ============ GET / and GET /api/hello ============

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

async fn handle_root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Chat Knowledge Backend Running",
    })
}

async fn handle_hello() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Hello from the backend API!",
    })
}

// ============ GET /test ============

/// JSON response body for `GET /test`.
#[derive(Debug, Serialize)]
pub struct DiagnosticReport {
    pub backend: String,
    pub database: String,
    pub database_url: String,
    pub database_name: String,
    pub connection_status: String,
    pub collections: Vec<String>,
}

const MAX_REPORTED_COLLECTIONS: usize = 10;
const MAX_ERROR_CHARS: usize = 50;

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn presence(set: bool) -> String {
    let text = if set { "✅ Set" } else { "❌ Not Set" };
    text.to_string()
}

/// Builds the diagnostic report. Store errors are folded into the
/// `database` text; this never fails.
pub async fn diagnose(state: &AppState) -> DiagnosticReport {
    let mut report = DiagnosticReport {
        backend: "✅ Running".to_string(),
        database: "❌ Not Available".to_string(),
        database_url: presence(state.database_url_set),
        database_name: presence(state.database_name_set),
        connection_status: "Not Connected".to_string(),
        collections: Vec::new(),
    };

    match state.store.store() {
        Ok(store) => {
            report.database = "✅ Available".to_string();
            report.connection_status = "Connected".to_string();
            match store.list_collection_names().await {
                Ok(names) => {
                    report.collections = names.into_iter().take(MAX_REPORTED_COLLECTIONS).collect();
                    report.database = "✅ Connected & Working".to_string();
                }
                Err(e) => {
                    tracing::warn!("listing collections failed: {}", e);
                    report.database = format!(
                        "⚠️  Connected but Error: {}",
                        truncate_chars(&e.to_string(), MAX_ERROR_CHARS)
                    );
                }
            }
        }
        Err(_) => {
            report.database = "⚠️  Available but not initialized".to_string();
        }
    }

    report
}

async fn handle_diagnostics(State(state): State<AppState>) -> Json<DiagnosticReport> {
    Json(diagnose(&state).await)
}

// ============ POST /api/knowledge ============

#[derive(Serialize)]
struct AddKnowledgeResponse {
    id: String,
    message: &'static str,
}

/// Validates the body, then inserts it into the `knowledgeitem` collection.
///
/// Every failure, including an unavailable store, is a `400`.
async fn handle_add_knowledge(
    State(state): State<AppState>,
    payload: Result<Json<NewKnowledgeItem>, JsonRejection>,
) -> Result<Json<AddKnowledgeResponse>, ApiError> {
    let Json(input) = payload.map_err(|e| bad_request(e.body_text()))?;
    let item = KnowledgeItem::validate(input).map_err(|e| bad_request(e.to_string()))?;

    let id = state
        .store
        .insert(KNOWLEDGE_COLLECTION, item.to_document())
        .await
        .map_err(|e| {
            tracing::warn!("insert failed: {}", e);
            bad_request(e.to_string())
        })?;

    tracing::info!(id = %id, "knowledge item added");
    Ok(Json(AddKnowledgeResponse {
        id,
        message: "Knowledge added",
    }))
}

// ============ GET /api/knowledge ============

/// Query string for `GET /api/knowledge`.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub tag: Option<String>,
    pub q: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Serialize)]
struct ListKnowledgeResponse {
    items: Vec<StoredDocument>,
}

async fn handle_list_knowledge(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ListKnowledgeResponse>, ApiError> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    let filter = Filter::for_listing(params.tag.as_deref(), params.q.as_deref());

    let items = state
        .store
        .find(KNOWLEDGE_COLLECTION, &filter, params.limit)
        .await
        .map_err(|e| {
            tracing::error!("listing knowledge items failed: {}", e);
            store_failure(e)
        })?;

    Ok(Json(ListKnowledgeResponse { items }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use knowledge_core::store::memory::InMemoryStore;
    use knowledge_core::store::DocumentStore;
    use serde_json::{Map, Value};

    /// A store whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl DocumentStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }

        async fn insert(&self, _: &str, _: Map<String, Value>) -> Result<String, StoreError> {
            Err(StoreError::Backend("disk I/O error".into()))
        }

        async fn find(
            &self,
            _: &str,
            _: &Filter,
            _: usize,
        ) -> Result<Vec<StoredDocument>, StoreError> {
            Err(StoreError::Backend("disk I/O error".into()))
        }

        async fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Backend(
                "connection reset by peer while reading the collection catalogue".into(),
            ))
        }
    }

    fn state(store: StoreHandle) -> AppState {
        AppState {
            store,
            database_url_set: true,
            database_name_set: false,
        }
    }

    #[test]
    fn test_state_reports_env_presence_not_file_config() {
        let mut config = Config::default();
        config.db.url = Some("memory://".into());
        config.db.name = Some("from-file".into());
        let state = AppState::new(&config, StoreHandle::Disconnected);
        assert!(!state.database_url_set);
        assert!(!state.database_name_set);

        config.env.database_url = true;
        let state = AppState::new(&config, StoreHandle::Disconnected);
        assert!(state.database_url_set);
        assert!(!state.database_name_set);
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 50), "abc");
    }

    #[tokio::test]
    async fn test_diagnose_disconnected() {
        let report = diagnose(&state(StoreHandle::Disconnected)).await;
        assert_eq!(report.backend, "✅ Running");
        assert_eq!(report.database, "⚠️  Available but not initialized");
        assert_eq!(report.connection_status, "Not Connected");
        assert_eq!(report.database_url, "✅ Set");
        assert_eq!(report.database_name, "❌ Not Set");
        assert!(report.collections.is_empty());
    }

    #[tokio::test]
    async fn test_diagnose_connected_lists_at_most_ten_collections() {
        let store = InMemoryStore::default();
        for i in 0..12 {
            store
                .insert(&format!("c{:02}", i), Map::new())
                .await
                .unwrap();
        }
        let report = diagnose(&state(StoreHandle::connected(store))).await;
        assert_eq!(report.database, "✅ Connected & Working");
        assert_eq!(report.connection_status, "Connected");
        assert_eq!(report.collections.len(), 10);
        assert_eq!(report.collections[0], "c00");
    }

    #[tokio::test]
    async fn test_diagnose_folds_store_error_into_text() {
        let report = diagnose(&state(StoreHandle::connected(BrokenStore))).await;
        assert_eq!(report.connection_status, "Connected");
        let detail = report
            .database
            .strip_prefix("⚠️  Connected but Error: ")
            .unwrap();
        assert_eq!(detail.chars().count(), 50);
        assert!(detail.starts_with("database error: connection reset"));
    }

    #[test]
    fn test_store_failure_status() {
        assert_eq!(
            store_failure(StoreError::Unavailable).status,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            store_failure(StoreError::Backend("x".into())).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
