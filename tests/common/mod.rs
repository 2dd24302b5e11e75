//! In-process stand-in for the Endee REST API and an OpenAI-compatible
//! embeddings endpoint, served by axum on a background thread.

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use endee_mcp::{
    application::EndeeService,
    infrastructure::{EndeeClient, ProviderSelector},
    settings::{EmbeddingSettings, EndeeSettings, ProviderMode, Settings},
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// Dimension of the vectors produced by the mock embeddings endpoint.
pub const MOCK_EMBEDDING_DIM: usize = 8;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
}

#[derive(Debug, Default)]
pub struct MockIndex {
    pub dim: usize,
    pub sparse_dim: usize,
    pub space_type: String,
    pub precision: String,
    pub vectors: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub indexes: BTreeMap<String, MockIndex>,
    pub backups: Vec<String>,
    pub requests: Vec<RecordedRequest>,
    /// Upsert batches containing any of these ids fail with HTTP 500.
    pub failing_ids: HashSet<String>,
    pub last_search: Option<Value>,
    /// Input count of every embeddings request, in arrival order.
    pub embedding_batches: Vec<usize>,
}

pub type SharedState = Arc<Mutex<MockState>>;

pub struct MockServer {
    pub base_url: String,
    pub state: SharedState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockServer {
    pub fn start() -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        let state: SharedState = Arc::new(Mutex::new(MockState::default()));
        let app = router(Arc::clone(&state));
        let (tx, rx) = oneshot::channel::<()>();

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = rx.await;
                    })
                    .await
                    .unwrap();
            });
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            shutdown: Some(tx),
        }
    }

    pub fn endee_settings(&self) -> EndeeSettings {
        EndeeSettings::new(self.base_url.clone())
    }

    pub fn embedding_settings(&self, mode: ProviderMode) -> EmbeddingSettings {
        let mut settings = EmbeddingSettings::with_mode(mode);
        settings.openai_api_key = "sk-test".into();
        settings.openai_base_url = format!("{}/openai", self.base_url);
        settings
    }

    pub fn settings(&self, mode: ProviderMode) -> Settings {
        Settings {
            endee: self.endee_settings(),
            embedding: self.embedding_settings(mode),
            ..Settings::default()
        }
    }

    pub fn client(&self) -> EndeeClient {
        EndeeClient::new(&self.endee_settings())
    }

    pub fn service(&self, mode: ProviderMode) -> EndeeService {
        self.service_with(self.settings(mode))
    }

    pub fn service_with(&self, settings: Settings) -> EndeeService {
        let database = Arc::new(EndeeClient::new(&settings.endee));
        let embeddings = Arc::new(ProviderSelector::new(settings.embedding.clone()));
        EndeeService::new(database, embeddings, Arc::new(settings))
    }

    pub fn add_index(&self, name: &str, dim: usize, sparse_dim: usize) {
        self.state.lock().indexes.insert(
            name.to_string(),
            MockIndex {
                dim,
                sparse_dim,
                space_type: "cosine".into(),
                precision: "int8d".into(),
                vectors: BTreeMap::new(),
            },
        );
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    pub fn vector_count(&self, index: &str) -> usize {
        self.state
            .lock()
            .indexes
            .get(index)
            .map(|i| i.vectors.len())
            .unwrap_or(0)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Deterministic embedding used by the mock OpenAI endpoint.
pub fn mock_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; MOCK_EMBEDDING_DIM];
    for (i, byte) in text.bytes().enumerate() {
        vector[i % MOCK_EMBEDDING_DIM] += f32::from(byte);
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/stats", get(stats))
        .route("/api/v1/index/create", post(create_index))
        .route("/api/v1/index/list", get(list_indexes))
        .route("/api/v1/index/:name/info", get(index_info))
        .route("/api/v1/index/:name/delete", delete(delete_index))
        .route("/api/v1/index/:name/vector/insert", post(insert_vectors))
        .route("/api/v1/index/:name/vector/get", post(get_vector))
        .route("/api/v1/index/:name/vector/:id/delete", delete(delete_vector))
        .route("/api/v1/index/:name/vectors/delete", delete(delete_by_filter))
        .route("/api/v1/index/:name/search", post(search))
        .route("/api/v1/index/:name/filters/update", post(update_filters))
        .route("/api/v1/index/:name/backup", post(create_backup))
        .route("/api/v1/backups", get(list_backups))
        .route("/api/v1/backups/:name/restore", post(restore_backup))
        .route("/api/v1/backups/:name", delete(delete_backup))
        .route("/openai/embeddings", post(embeddings))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), record))
        .with_state(state)
}

async fn record(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.lock().requests.push(RecordedRequest {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        authorization,
    });
    next.run(request).await
}

fn not_found(what: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("{what} not found")).into_response()
}

fn msgpack<T: Serialize>(value: &T) -> Response {
    (
        [(header::CONTENT_TYPE, "application/msgpack")],
        rmp_serde::to_vec_named(value).unwrap(),
    )
        .into_response()
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": "mock" }))
}

async fn stats(State(state): State<SharedState>) -> Json<Value> {
    let state = state.lock();
    let vectors: usize = state.indexes.values().map(|i| i.vectors.len()).sum();
    Json(json!({ "total_indexes": state.indexes.len(), "total_vectors": vectors }))
}

async fn create_index(State(state): State<SharedState>, Json(body): Json<Value>) -> Response {
    let name = body["index_name"].as_str().unwrap_or_default().to_string();
    let mut state = state.lock();
    if state.indexes.contains_key(&name) {
        return (StatusCode::CONFLICT, "Index already exists").into_response();
    }
    state.indexes.insert(
        name,
        MockIndex {
            dim: body["dim"].as_u64().unwrap_or(0) as usize,
            sparse_dim: body["sparse_dim"].as_u64().unwrap_or(0) as usize,
            space_type: body["space_type"].as_str().unwrap_or("cosine").into(),
            precision: body["precision"].as_str().unwrap_or("int8d").into(),
            vectors: BTreeMap::new(),
        },
    );
    "Index created successfully".into_response()
}

fn describe(name: &str, index: &MockIndex) -> Value {
    json!({
        "index_name": name,
        "dim": index.dim,
        "sparse_dim": index.sparse_dim,
        "space_type": index.space_type,
        "precision": index.precision,
        "M": 16,
        "total_elements": index.vectors.len(),
    })
}

async fn list_indexes(State(state): State<SharedState>) -> Json<Value> {
    let state = state.lock();
    let indexes: Vec<Value> = state
        .indexes
        .iter()
        .map(|(name, index)| describe(name, index))
        .collect();
    Json(json!({ "indexes": indexes }))
}

async fn index_info(State(state): State<SharedState>, Path(name): Path<String>) -> Response {
    match state.lock().indexes.get(&name) {
        Some(index) => Json(describe(&name, index)).into_response(),
        None => not_found("Index"),
    }
}

async fn delete_index(State(state): State<SharedState>, Path(name): Path<String>) -> Response {
    match state.lock().indexes.remove(&name) {
        Some(_) => "Index deleted successfully".into_response(),
        None => not_found("Index"),
    }
}

async fn insert_vectors(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(items): Json<Vec<Value>>,
) -> Response {
    let mut state = state.lock();
    let failing = items.iter().any(|item| {
        item["id"]
            .as_str()
            .is_some_and(|id| state.failing_ids.contains(id))
    });
    if failing {
        return (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response();
    }
    let Some(index) = state.indexes.get_mut(&name) else {
        return not_found("Index");
    };
    for item in &items {
        let len = item["vector"].as_array().map(Vec::len).unwrap_or(0);
        if len != index.dim {
            return (
                StatusCode::BAD_REQUEST,
                format!("dimension mismatch: expected {}, got {len}", index.dim),
            )
                .into_response();
        }
    }
    for item in items {
        let id = item["id"].as_str().unwrap_or_default().to_string();
        index.vectors.insert(id, item);
    }
    StatusCode::OK.into_response()
}

#[derive(Deserialize)]
struct IdBody {
    id: String,
}

async fn get_vector(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(body): Json<IdBody>,
) -> Response {
    let state = state.lock();
    match state.indexes.get(&name).and_then(|i| i.vectors.get(&body.id)) {
        Some(item) => msgpack(item),
        None => not_found("Vector"),
    }
}

async fn delete_vector(
    State(state): State<SharedState>,
    Path((name, id)): Path<(String, String)>,
) -> Response {
    let mut state = state.lock();
    match state.indexes.get_mut(&name).and_then(|i| i.vectors.remove(&id)) {
        Some(_) => "Vector deleted successfully".into_response(),
        None => not_found("Vector"),
    }
}

/// Supports `[{"field": {"$eq": value}}]` conditions only.
fn matches_filter(item: &Value, conditions: &[Value]) -> bool {
    conditions.iter().all(|condition| {
        condition.as_object().is_some_and(|clauses| {
            clauses.iter().all(|(field, clause)| {
                let expected = clause.get("$eq").unwrap_or(clause);
                item["filter"].get(field) == Some(expected)
            })
        })
    })
}

async fn delete_by_filter(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let conditions = body["filter"].as_array().cloned().unwrap_or_default();
    let mut state = state.lock();
    let Some(index) = state.indexes.get_mut(&name) else {
        return not_found("Index");
    };
    let before = index.vectors.len();
    index
        .vectors
        .retain(|_, item| !matches_filter(item, &conditions));
    format!("{} vectors deleted", before - index.vectors.len()).into_response()
}

#[derive(Serialize)]
struct MockHit {
    id: String,
    similarity: f32,
    distance: f32,
    meta: Option<Value>,
    filter: Option<Value>,
    vector: Option<Vec<f32>>,
}

fn as_f32_vec(value: &Value) -> Vec<f32> {
    value
        .as_array()
        .map(|a| a.iter().filter_map(Value::as_f64).map(|v| v as f32).collect())
        .unwrap_or_default()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let nb = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

async fn search(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if name == "corrupt" {
        return ([(header::CONTENT_TYPE, "application/msgpack")], vec![0xc1u8, 0x00]).into_response();
    }

    let mut state = state.lock();
    state.last_search = Some(body.clone());
    let Some(index) = state.indexes.get(&name) else {
        return not_found("Index");
    };

    let query = as_f32_vec(&body["vector"]);
    let k = body["k"].as_u64().unwrap_or(10) as usize;
    let include_vectors = body["include_vectors"].as_bool().unwrap_or(false);
    let conditions: Vec<Value> = body["filter"]
        .as_str()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();

    let mut hits: Vec<MockHit> = index
        .vectors
        .values()
        .filter(|item| matches_filter(item, &conditions))
        .map(|item| {
            let stored = as_f32_vec(&item["vector"]);
            let similarity = cosine(&query, &stored);
            MockHit {
                id: item["id"].as_str().unwrap_or_default().to_string(),
                similarity,
                distance: 1.0 - similarity,
                meta: item.get("meta").cloned(),
                filter: item.get("filter").cloned(),
                vector: include_vectors.then_some(stored),
            }
        })
        .collect();
    hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    hits.truncate(k);
    msgpack(&hits)
}

async fn update_filters(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock();
    let Some(index) = state.indexes.get_mut(&name) else {
        return not_found("Index");
    };
    let mut updated = 0;
    for update in body["updates"].as_array().cloned().unwrap_or_default() {
        let id = update["id"].as_str().unwrap_or_default();
        if let Some(item) = index.vectors.get_mut(id) {
            item["filter"] = update["filter"].clone();
            updated += 1;
        }
    }
    format!("{updated} filters updated").into_response()
}

async fn create_backup(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock();
    if !state.indexes.contains_key(&name) {
        return not_found("Index");
    }
    state
        .backups
        .push(body["name"].as_str().unwrap_or_default().to_string());
    "Backup created successfully".into_response()
}

async fn list_backups(State(state): State<SharedState>) -> Json<Value> {
    let state = state.lock();
    let backups: Vec<Value> = state
        .backups
        .iter()
        .enumerate()
        .map(|(i, name)| {
            // mix both shapes Endee has used for backup entries
            if i % 2 == 0 {
                Value::from(name.clone())
            } else {
                json!({ "name": name, "timestamp": 1_700_000_000, "size_mb": 1.5 })
            }
        })
        .collect();
    Json(json!({ "backups": backups }))
}

async fn restore_backup(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock();
    if !state.backups.contains(&name) {
        return not_found("Backup");
    }
    let target = body["target_index_name"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    state.indexes.entry(target).or_default();
    "Backup restored successfully".into_response()
}

async fn delete_backup(State(state): State<SharedState>, Path(name): Path<String>) -> Response {
    let mut state = state.lock();
    let before = state.backups.len();
    state.backups.retain(|b| b != &name);
    if state.backups.len() == before {
        return not_found("Backup");
    }
    "Backup deleted successfully".into_response()
}

#[derive(Deserialize)]
struct EmbeddingsBody {
    input: Vec<String>,
}

async fn embeddings(State(state): State<SharedState>, Json(body): Json<EmbeddingsBody>) -> Response {
    state.lock().embedding_batches.push(body.input.len());
    if body.input.iter().any(|text| text == "FAIL") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream model error").into_response();
    }
    // reversed on purpose: clients must reorder by `index`
    let data: Vec<Value> = body
        .input
        .iter()
        .enumerate()
        .rev()
        .map(|(index, text)| json!({ "object": "embedding", "index": index, "embedding": mock_embedding(text) }))
        .collect();
    Json(json!({ "object": "list", "data": data, "model": "mock" })).into_response()
}
