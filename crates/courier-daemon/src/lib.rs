//! HTTP control surface.
//!
//! One axum router over shared state: the broker behind a mutex (all queue
//! mutations are serialized through it), the per-provider bridge queues, and
//! the shared bridge result store. Bodies are JSON; every success reply
//! carries `"ok": true` and errors map onto plain HTTP status codes.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use courier_bridge::{RequestQueue, ResultStore};
use courier_broker::Broker;
use courier_policy::Whitelist;
use courier_store::StateStore;
use courier_types::{CourierError, Provider, StatePaths, WhitelistEntry};

#[derive(Clone)]
pub struct AppState {
    broker: Arc<tokio::sync::Mutex<Broker>>,
    queues: Arc<HashMap<Provider, RequestQueue>>,
    results: Arc<ResultStore>,
}

impl AppState {
    pub fn broker(&self) -> &Arc<tokio::sync::Mutex<Broker>> {
        &self.broker
    }

    /// The one result store fronting `bridge_results.json`. Dispatchers
    /// must write through this instance, not a fresh one over the same
    /// path, or concurrent records can overwrite each other.
    pub fn results(&self) -> &Arc<ResultStore> {
        &self.results
    }
}

/// Load the persisted documents under `paths` and assemble shared state.
pub fn build_state(paths: &StatePaths) -> Result<AppState, CourierError> {
    paths
        .ensure_root()
        .map_err(|e| CourierError::Config(format!("cannot create state dir: {e}")))?;

    let store = StateStore::open(paths.state_file())?;
    let whitelist = Whitelist::load_or_default(paths.whitelist_file())?;
    let broker = Broker::new(store, whitelist);

    let queues: HashMap<Provider, RequestQueue> = Provider::ALL
        .into_iter()
        .map(|p| (p, RequestQueue::new(p, paths.bridge_queue_file(p))))
        .collect();

    Ok(AppState {
        broker: Arc::new(tokio::sync::Mutex::new(broker)),
        queues: Arc::new(queues),
        results: Arc::new(ResultStore::new(paths.bridge_results_file())),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/enqueue", post(enqueue))
        .route("/approve", post(approve))
        .route("/execute-now", post(execute_now))
        .route("/next", get(next_item))
        .route("/whitelist", get(get_whitelist).put(put_whitelist))
        .route("/bridge-request", post(bridge_request))
        .route("/bridge-result/{id}", get(bridge_result))
        .with_state(state)
}

fn error_response(err: CourierError) -> Response {
    let status = match &err {
        CourierError::NotFound(_) => StatusCode::NOT_FOUND,
        CourierError::Forbidden(_) => StatusCode::FORBIDDEN,
        CourierError::BadRequest(_) => StatusCode::BAD_REQUEST,
        CourierError::Store(_) | CourierError::Bridge(_) | CourierError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "ok": false, "error": err.to_string() }))).into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Response {
    Json(json!({
        "ok": true,
        "now": Utc::now(),
        "pid": std::process::id(),
    }))
    .into_response()
}

#[derive(serde::Deserialize)]
struct EnqueueBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

async fn enqueue(State(state): State<AppState>, Json(body): Json<EnqueueBody>) -> Response {
    let mut broker = state.broker.lock().await;
    match broker.enqueue(&body.kind, body.payload) {
        Ok(entry) => Json(json!({ "ok": true, "entry": entry })).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(serde::Deserialize)]
struct ApproveBody {
    id: Uuid,
    approved: bool,
    #[serde(default)]
    by: Option<String>,
}

async fn approve(State(state): State<AppState>, Json(body): Json<ApproveBody>) -> Response {
    let by = body.by.as_deref().unwrap_or("operator");
    let mut broker = state.broker.lock().await;
    match broker.approve(body.id, body.approved, by) {
        Ok(item) => Json(json!({ "ok": true, "item": item })).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(serde::Deserialize)]
struct ExecuteBody {
    id: Uuid,
}

async fn execute_now(State(state): State<AppState>, Json(body): Json<ExecuteBody>) -> Response {
    let mut broker = state.broker.lock().await;
    match broker.execute_now(body.id).await {
        Ok(result) => Json(json!({ "ok": true, "result": result })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn next_item(State(state): State<AppState>) -> Response {
    let broker = state.broker.lock().await;
    match broker.next() {
        Some(item) => Json(json!({ "ok": true, "item": item })).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn get_whitelist(State(state): State<AppState>) -> Response {
    let broker = state.broker.lock().await;
    Json(json!({ "ok": true, "entries": broker.whitelist_entries() })).into_response()
}

async fn put_whitelist(
    State(state): State<AppState>,
    Json(entries): Json<Vec<WhitelistEntry>>,
) -> Response {
    let mut broker = state.broker.lock().await;
    match broker.replace_whitelist(entries) {
        Ok(()) => {
            Json(json!({ "ok": true, "entries": broker.whitelist_entries() })).into_response()
        }
        Err(err) => error_response(err),
    }
}

#[derive(serde::Deserialize)]
struct BridgeRequestBody {
    #[serde(rename = "type")]
    provider: String,
    prompt: String,
    #[serde(default)]
    context: Option<String>,
}

async fn bridge_request(
    State(state): State<AppState>,
    Json(body): Json<BridgeRequestBody>,
) -> Response {
    let provider: Provider = match body.provider.parse() {
        Ok(p) => p,
        Err(e) => return error_response(CourierError::BadRequest(e)),
    };
    if body.prompt.is_empty() {
        return error_response(CourierError::BadRequest("missing 'prompt'".into()));
    }
    let queue = &state.queues[&provider];
    match queue.append(body.prompt, body.context) {
        Ok(request) => Json(json!({ "ok": true, "id": request.id })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn bridge_result(State(state): State<AppState>, UrlPath(id): UrlPath<Uuid>) -> Response {
    match state.results.get(id) {
        Some(result) => Json(json!({ "ok": true, "result": result })).into_response(),
        None => error_response(CourierError::NotFound(format!("no bridge result {id}"))),
    }
}
