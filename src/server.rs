//! JSON HTTP server.
//!
//! Exposes the parser and both search paths over a small tool-style API so
//! that UIs and other processes can use Contact Search without linking it.
//! Each request is answered on its own; debouncing is the caller's job, so
//! no coordinator is involved here.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/tools/parse` | `{query}` → structured query |
//! | `POST` | `/tools/search` | `{query, limit?, remote?}` → `{query, results, source, remoteUnavailable}` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `remote_disabled` (400).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use contact_search_core::models::{
    Dictionaries, RecordSnapshot, ResultSource, SearchResult, StructuredQuery,
};
use contact_search_core::remote::{self, RemoteSearch};
use contact_search_core::{parse, search};

use crate::config::Config;
use crate::remote::create_remote;
use crate::snapshot;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    snapshot: RecordSnapshot,
    dictionaries: Arc<Dictionaries>,
    remote: Option<Arc<dyn RemoteSearch>>,
    final_limit: usize,
}

impl AppState {
    pub fn new(
        snapshot: RecordSnapshot,
        dictionaries: Dictionaries,
        remote: Option<Arc<dyn RemoteSearch>>,
        final_limit: usize,
    ) -> Self {
        Self {
            snapshot,
            dictionaries: Arc::new(dictionaries),
            remote,
            final_limit,
        }
    }
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let (snapshot, dictionaries) = snapshot::load(config)?;
    let remote = create_remote(&config.remote)?;
    let state = AppState::new(snapshot, dictionaries, remote, config.retrieval.final_limit);

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        bind = %bind_addr,
        records = state.snapshot.len(),
        remote = state.remote.as_ref().map(|r| r.name()).unwrap_or("disabled"),
        "server listening"
    );
    println!("Contact Search server listening on http://{}", bind_addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Build the router. Exposed for embedding and in-process tests.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/tools/parse", post(handle_parse))
        .route("/tools/search", post(handle_search))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn remote_disabled() -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "remote_disabled".to_string(),
        message: "remote search is disabled in config".to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /tools/parse ============

#[derive(Deserialize)]
struct ParseRequest {
    query: String,
}

async fn handle_parse(
    State(state): State<AppState>,
    Json(req): Json<ParseRequest>,
) -> Result<Json<StructuredQuery>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    Ok(Json(parse::parse(&req.query, &state.dictionaries)))
}

// ============ POST /tools/search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
    /// Ask the remote endpoint instead of the local parser.
    #[serde(default)]
    remote: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    query: StructuredQuery,
    results: Vec<SearchResult>,
    source: ResultSource,
    remote_unavailable: bool,
}

/// Handler for `POST /tools/search`.
///
/// With `remote: true`, a remote failure falls back to the deterministic
/// results and sets `remoteUnavailable`; it is never an HTTP error.
async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let limit = req.limit.unwrap_or(state.final_limit);
    if limit == 0 {
        return Err(bad_request("limit must be >= 1"));
    }

    let mut response = if req.remote {
        let remote = state.remote.clone().ok_or_else(remote_disabled)?;
        match remote.call_remote(&req.query, &state.dictionaries).await {
            Ok(resp) => SearchResponse {
                query: remote::remote_query(&req.query, &resp),
                results: remote::apply(&resp, state.snapshot.records()),
                source: ResultSource::Llm,
                remote_unavailable: false,
            },
            Err(err) => {
                tracing::warn!(error = %err, "remote search failed; answering deterministically");
                let mut fallback = deterministic(&state, &req.query);
                fallback.remote_unavailable = true;
                fallback
            }
        }
    } else {
        deterministic(&state, &req.query)
    };

    response.results.retain(|r| r.score > 0.0);
    response.results.truncate(limit);
    Ok(Json(response))
}

fn deterministic(state: &AppState, raw: &str) -> SearchResponse {
    let query = parse::parse(raw, &state.dictionaries);
    let results = search::execute(&query, state.snapshot.records());
    SearchResponse {
        query,
        results,
        source: ResultSource::Deterministic,
        remote_unavailable: false,
    }
}
