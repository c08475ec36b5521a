//! In-memory fake of the engine's HTTP API, served by axum on 127.0.0.1:0.
//!
//! Speaks the modern response dialect (`acknowledged`, `_version`, per-item
//! `status`) for the subset of endpoints the cluster client uses. Each
//! instance is one cluster; failures are injected per instance.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use switchyard::config::ClusterConfig;
use switchyard::types::ClusterRole;

#[derive(Debug, Default)]
struct FakeIndex {
    aliases: BTreeSet<String>,
    /// (type, id) → source
    docs: BTreeMap<(String, String), Value>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Inner {
    indices: BTreeMap<String, FakeIndex>,
    fail_all: bool,
    fail_alias_removals: bool,
    rejected_bulk_ids: BTreeSet<String>,
    requests: usize,
}

type Shared = Arc<Mutex<Inner>>;

/// One fake cluster.
pub struct FakeEngine {
    pub port: u16,
    inner: Shared,
}

impl FakeEngine {
    pub async fn start() -> Self {
        Self::start_dropping_first(0).await
    }

    /// Like `start`, but the first `connections` accepted connections are
    /// closed before a request is read, as a flaky network would.
    pub async fn start_dropping_first(connections: usize) -> Self {
        let inner: Shared = Arc::new(Mutex::new(Inner::default()));
        let app = router(inner.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            for _ in 0..connections {
                if let Ok((stream, _)) = listener.accept().await {
                    drop(stream);
                }
            }
            axum::serve(listener, app).await.unwrap();
        });
        Self { port, inner }
    }

    pub fn cluster_config(&self, name: &str, role: ClusterRole) -> ClusterConfig {
        ClusterConfig {
            name: name.to_string(),
            host: "127.0.0.1".to_string(),
            port: self.port,
            role,
        }
    }

    /// Every request answers 500 while set.
    pub fn fail_all(&self, fail: bool) {
        self.inner.lock().unwrap().fail_all = fail;
    }

    /// `_aliases` calls containing a `remove` action answer 500 while set.
    pub fn fail_alias_removals(&self, fail: bool) {
        self.inner.lock().unwrap().fail_alias_removals = fail;
    }

    /// Bulk items with this id are answered with a per-item 404.
    pub fn reject_bulk_id(&self, id: &str) {
        self.inner
            .lock()
            .unwrap()
            .rejected_bulk_ids
            .insert(id.to_string());
    }

    pub fn index_names(&self) -> Vec<String> {
        self.inner.lock().unwrap().indices.keys().cloned().collect()
    }

    pub fn holders(&self, alias: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .indices
            .iter()
            .filter(|(_, i)| i.aliases.contains(alias))
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn is_closed(&self, index: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .indices
            .get(index)
            .map(|i| i.closed)
            .unwrap_or(false)
    }

    pub fn document(&self, index: &str, doc_type: &str, id: &str) -> Option<Value> {
        self.inner
            .lock()
            .unwrap()
            .indices
            .get(index)
            .and_then(|i| i.docs.get(&(doc_type.to_string(), id.to_string())))
            .cloned()
    }

    pub fn document_count(&self, index: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .indices
            .get(index)
            .map(|i| i.docs.len())
            .unwrap_or(0)
    }

    pub fn requests(&self) -> usize {
        self.inner.lock().unwrap().requests
    }
}

/// A port nothing listens on.
pub async fn unreachable_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn router(inner: Shared) -> Router {
    Router::new()
        .route("/_aliases", get(get_aliases).post(post_aliases))
        .route("/_alias/:alias", get(head_alias))
        .route("/_bulk", post(bulk))
        .route("/:index", put(create_index).delete(delete_index))
        .route("/:index/_refresh", post(refresh))
        .route("/:index/_close", post(close))
        .route("/:index/_search", post(search))
        .route("/:index/:doc_type/:id", put(store).delete(delete_doc))
        .route("/:index/:doc_type/:id/_update", post(update))
        .layer(axum::middleware::from_fn_with_state(inner.clone(), gate))
        .with_state(inner)
}

async fn gate(
    State(inner): State<Shared>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let fail = {
        let mut guard = inner.lock().unwrap();
        guard.requests += 1;
        guard.fail_all
    };
    if fail {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "injected failure", "status": 500})),
        )
            .into_response();
    }
    next.run(request).await
}

fn missing(index: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": format!("IndexMissingException[[{index}] missing]"), "status": 404})),
    )
        .into_response()
}

/// Concrete indices behind a name: the index itself or every alias holder.
fn targets(inner: &Inner, name: &str) -> Vec<String> {
    if inner.indices.contains_key(name) {
        return vec![name.to_string()];
    }
    inner
        .indices
        .iter()
        .filter(|(_, i)| i.aliases.contains(name))
        .map(|(n, _)| n.clone())
        .collect()
}

fn write_target(inner: &Inner, name: &str) -> Option<String> {
    match targets(inner, name).as_slice() {
        [one] => Some(one.clone()),
        _ => None,
    }
}

async fn get_aliases(State(inner): State<Shared>) -> Json<Value> {
    let guard = inner.lock().unwrap();
    let mut body = serde_json::Map::new();
    for (name, index) in &guard.indices {
        let aliases: serde_json::Map<String, Value> =
            index.aliases.iter().map(|a| (a.clone(), json!({}))).collect();
        body.insert(name.clone(), json!({ "aliases": aliases }));
    }
    Json(Value::Object(body))
}

async fn post_aliases(State(inner): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut guard = inner.lock().unwrap();
    let actions = body["actions"].as_array().cloned().unwrap_or_default();
    let removes = actions.iter().any(|a| a.get("remove").is_some());
    if removes && guard.fail_alias_removals {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "injected alias removal failure", "status": 500})),
        )
            .into_response();
    }
    for action in &actions {
        let (kind, spec) = match action.as_object().and_then(|o| o.iter().next()) {
            Some(pair) => pair,
            None => continue,
        };
        let index = spec["index"].as_str().unwrap_or_default().to_string();
        let alias = spec["alias"].as_str().unwrap_or_default().to_string();
        let Some(target) = guard.indices.get_mut(&index) else {
            return missing(&index);
        };
        match kind.as_str() {
            "add" => {
                target.aliases.insert(alias);
            }
            "remove" => {
                if !target.aliases.remove(&alias) {
                    return (
                        StatusCode::NOT_FOUND,
                        Json(json!({"error": format!("AliasMissingException[{alias}]"), "status": 404})),
                    )
                        .into_response();
                }
            }
            _ => {}
        }
    }
    Json(json!({"acknowledged": true})).into_response()
}

async fn head_alias(State(inner): State<Shared>, Path(alias): Path<String>) -> StatusCode {
    let guard = inner.lock().unwrap();
    if guard.indices.values().any(|i| i.aliases.contains(&alias)) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn create_index(State(inner): State<Shared>, Path(index): Path<String>) -> Response {
    let mut guard = inner.lock().unwrap();
    if guard.indices.contains_key(&index) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": {"type": "index_already_exists_exception", "index": index},
                "status": 400
            })),
        )
            .into_response();
    }
    guard.indices.insert(index, FakeIndex::default());
    Json(json!({"acknowledged": true})).into_response()
}

async fn delete_index(State(inner): State<Shared>, Path(index): Path<String>) -> Response {
    let mut guard = inner.lock().unwrap();
    match guard.indices.remove(&index) {
        Some(_) => Json(json!({"acknowledged": true})).into_response(),
        None => missing(&index),
    }
}

async fn refresh(State(inner): State<Shared>, Path(index): Path<String>) -> Response {
    let guard = inner.lock().unwrap();
    if targets(&guard, &index).is_empty() {
        return missing(&index);
    }
    Json(json!({"_shards": {"total": 1, "successful": 1, "failed": 0}})).into_response()
}

async fn close(State(inner): State<Shared>, Path(index): Path<String>) -> Response {
    let mut guard = inner.lock().unwrap();
    match guard.indices.get_mut(&index) {
        Some(i) => {
            i.closed = true;
            Json(json!({"acknowledged": true})).into_response()
        }
        None => missing(&index),
    }
}

async fn search(
    State(inner): State<Shared>,
    Path(index): Path<String>,
    Json(query): Json<Value>,
) -> Response {
    let guard = inner.lock().unwrap();
    let names = targets(&guard, &index);
    if names.is_empty() {
        return missing(&index);
    }
    let mut hits = Vec::new();
    for name in &names {
        for ((doc_type, id), source) in &guard.indices[name].docs {
            hits.push(json!({"_index": name, "_type": doc_type, "_id": id, "_source": source}));
        }
    }
    let total = hits.len();
    let from = query["from"].as_u64().unwrap_or(0) as usize;
    let size = query["size"].as_u64().unwrap_or(10) as usize;
    let page: Vec<Value> = hits.into_iter().skip(from).take(size).collect();
    let mut body = json!({"took": 1, "hits": {"total": total, "hits": page}});
    if query.get("facets").is_some() {
        body["facets"] = json!({"type": {"_type": "terms", "total": total, "terms": []}});
    }
    Json(body).into_response()
}

async fn store(
    State(inner): State<Shared>,
    Path((index, doc_type, id)): Path<(String, String, String)>,
    Json(source): Json<Value>,
) -> Response {
    let mut guard = inner.lock().unwrap();
    let Some(target) = write_target(&guard, &index) else {
        return missing(&index);
    };
    let docs = &mut guard.indices.get_mut(&target).unwrap().docs;
    let created = docs.insert((doc_type.clone(), id.clone()), source).is_none();
    Json(json!({
        "_index": target, "_type": doc_type, "_id": id, "_version": 1, "created": created
    }))
    .into_response()
}

async fn delete_doc(
    State(inner): State<Shared>,
    Path((index, doc_type, id)): Path<(String, String, String)>,
) -> Response {
    let mut guard = inner.lock().unwrap();
    let Some(target) = write_target(&guard, &index) else {
        return missing(&index);
    };
    let docs = &mut guard.indices.get_mut(&target).unwrap().docs;
    match docs.remove(&(doc_type, id.clone())) {
        Some(_) => Json(json!({"found": true, "_id": id})).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"found": false, "_id": id}))).into_response(),
    }
}

async fn update(
    State(inner): State<Shared>,
    Path((index, doc_type, id)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = inner.lock().unwrap();
    let Some(target) = write_target(&guard, &index) else {
        return missing(&index);
    };
    let docs = &mut guard.indices.get_mut(&target).unwrap().docs;
    let Some(existing) = docs.get_mut(&(doc_type, id.clone())) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("DocumentMissingException[{id}]"), "status": 404})),
        )
            .into_response();
    };
    if let (Some(existing), Some(partial)) = (existing.as_object_mut(), body["doc"].as_object()) {
        for (k, v) in partial {
            existing.insert(k.clone(), v.clone());
        }
    }
    Json(json!({"_index": target, "_id": id, "_version": 2})).into_response()
}

async fn bulk(State(inner): State<Shared>, body: String) -> Json<Value> {
    let mut guard = inner.lock().unwrap();
    let lines: Vec<Value> = body
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    let mut items = Vec::new();
    let mut errors = false;
    for pair in lines.chunks(2) {
        let meta = &pair[0]["index"];
        let source = pair.get(1).cloned().unwrap_or(Value::Null);
        let index = meta["_index"].as_str().unwrap_or_default().to_string();
        let doc_type = meta["_type"].as_str().unwrap_or_default().to_string();
        let id = meta["_id"].as_str().unwrap_or_default().to_string();

        let target = write_target(&guard, &index);
        if guard.rejected_bulk_ids.contains(&id) || target.is_none() {
            errors = true;
            items.push(json!({"index": {
                "_index": index, "_id": id, "status": 404,
                "error": "DocumentMissingException"
            }}));
            continue;
        }
        if let Some(target) = target {
            guard
                .indices
                .get_mut(&target)
                .unwrap()
                .docs
                .insert((doc_type, id.clone()), source);
            items.push(json!({"index": {"_index": target, "_id": id, "_version": 1, "status": 201}}));
        }
    }
    Json(json!({"took": 2, "errors": errors, "items": items}))
}
