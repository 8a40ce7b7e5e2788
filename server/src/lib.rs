use axum::{extract::{Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use kbsearch_core::persist::{load_snapshot, IndexPaths};
use kbsearch_core::{Error, SearchHit, Snapshot, SnapshotHandle, DEFAULT_LIMIT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub index_dir: PathBuf,
    /// Used when a request has no `k`.
    pub default_limit: usize,
    /// Requests asking for more are clamped to this.
    pub max_limit: usize,
    pub admin_token: Option<String>,
}

impl ServerConfig {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self { index_dir: index_dir.into(), default_limit: DEFAULT_LIMIT, max_limit: 100, admin_token: None }
    }

    /// Pick up `ADMIN_TOKEN` from the environment.
    pub fn with_env(mut self) -> Self {
        self.admin_token = std::env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty());
        self
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub k: Option<i64>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    /// Documents that matched, before `k` was applied.
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Deserialize)]
pub struct DocParams {
    pub path: String,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub snapshots: Arc<SnapshotHandle>,
}

type ApiError = (StatusCode, String);

fn api_error(err: Error) -> ApiError {
    let status = match err {
        Error::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Load the snapshot under `config.index_dir` and publish it. On failure the
/// handle keeps whatever it held before.
pub fn reload(config: &ServerConfig, snapshots: &SnapshotHandle) -> kbsearch_core::Result<Arc<Snapshot>> {
    let (snapshot, meta) = load_snapshot(&IndexPaths::new(&config.index_dir))?;
    tracing::info!(created_at = %meta.created_at, num_docs = meta.num_docs, "loaded index");
    snapshots.publish(snapshot);
    snapshots.current()
}

pub fn build_app(config: ServerConfig) -> Router {
    let snapshots = Arc::new(SnapshotHandle::new());
    if let Err(err) = reload(&config, &snapshots) {
        tracing::warn!(index = %config.index_dir.display(), %err, "no index loaded, serving 503 until reload");
    }
    router(AppState { config: Arc::new(config), snapshots })
}

pub fn router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc", get(doc_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let limit = match params.k {
        None => state.config.default_limit,
        Some(k) if k <= 0 => return Err(api_error(Error::InvalidArgument(format!("k must be positive, got {k}")))),
        Some(k) => (k as usize).min(state.config.max_limit),
    };
    let snapshot = state.snapshots.current().map_err(api_error)?;
    let found = snapshot.search_counted(&params.q, limit).map_err(api_error)?;
    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: params.q,
        took_ms: elapsed.as_millis(),
        took_s: elapsed.as_secs_f64(),
        total_hits: found.total_hits,
        results: found.hits,
    }))
}

pub async fn doc_handler(State(state): State<AppState>, Query(params): Query<DocParams>) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = state.snapshots.current().map_err(api_error)?;
    let doc = snapshot
        .documents
        .get(&params.path)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no document {:?}", params.path)))?;
    Ok(Json(serde_json::json!({
        "path": params.path,
        "title": doc.title,
        "tags": doc.tags,
        "word_count": doc.word_count,
    })))
}

async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    // reading and decoding a large snapshot blocks, keep it off the async workers
    let AppState { config, snapshots } = state;
    let loaded = tokio::task::spawn_blocking(move || reload(&config, &snapshots))
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, format!("reload task failed: {err}")))?;
    let snapshot = loaded.map_err(|err| {
        tracing::error!(%err, "index reload failed, keeping previous snapshot");
        (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
    })?;
    Ok(Json(serde_json::json!({ "num_docs": snapshot.num_docs(), "num_terms": snapshot.num_terms() })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.config.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
