//! HTTP surface tests: an in-process node driven over real sockets.

use std::sync::Arc;

use serde_json::{json, Value};

use strand_client::HttpClient;
use strand_core::{ListOptions, Transaction};
use strand_node::{build_router, AppState};
use strand_schema::Schema;
use strand_store::{Backend, DataNode, MemoryStore};

async fn spawn_node() -> String {
    let backend: Arc<dyn Backend> =
        Arc::new(DataNode::new(Arc::new(Schema::builtin()), MemoryStore::new()));
    let app = build_router(AppState::new(backend), &[]);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn receive_and_read_routes() {
    let base = spawn_node().await;
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("{base}/api/v1/receive"))
        .json(&json!({"tx": ["mutable://open/hello", "world"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["accepted"], json!(true));
    assert_eq!(body["record"]["data"], json!("world"));

    let resp = http
        .get(format!("{base}/api/v1/read/mutable/open/hello"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let record: Value = resp.json().await.unwrap();
    assert_eq!(record["data"], json!("world"));
    assert!(record["ts"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn read_missing_is_404() {
    let base = spawn_node().await;
    let resp = reqwest::get(format!("{base}/api/v1/read/mutable/open/absent")).await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn unknown_program_is_400() {
    let base = spawn_node().await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/v1/receive"))
        .json(&json!({"tx": ["nosuch://program/x", 1]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], json!("UnknownProgram"));
}

#[tokio::test]
async fn immutable_conflict_is_400() {
    let base = spawn_node().await;
    let http = reqwest::Client::new();
    let url = format!("{base}/api/v1/receive");

    let first = http.post(&url).json(&json!({"tx": ["immutable://open/k", 1]})).send().await.unwrap();
    assert_eq!(first.status(), 200);

    let second = http.post(&url).json(&json!({"tx": ["immutable://open/k", 2]})).send().await.unwrap();
    assert_eq!(second.status(), 400);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["code"], json!("AlreadyExists"));
}

#[tokio::test]
async fn legacy_write_route_assembles_the_uri() {
    let base = spawn_node().await;
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("{base}/api/v1/write/mutable/open/notes/today"))
        .json(&json!({"value": {"text": "hi"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let record: Value = http
        .get(format!("{base}/api/v1/read/mutable/open/notes/today"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(record["data"]["text"], json!("hi"));
}

#[tokio::test]
async fn list_route_with_query_parameters() {
    let base = spawn_node().await;
    let http = reqwest::Client::new();
    for name in ["a", "b", "c"] {
        http.post(format!("{base}/api/v1/receive"))
            .json(&json!({"tx": [format!("mutable://open/docs/{name}"), 1]}))
            .send()
            .await
            .unwrap();
    }

    let body: Value = http
        .get(format!("{base}/api/v1/list/mutable/open/docs?page=1&limit=2&sortOrder=desc"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["pagination"]["total"], json!(3));
    assert_eq!(body["pagination"]["totalPages"], json!(2));
    assert_eq!(body["data"][0]["uri"], json!("mutable://open/docs/c"));
    assert_eq!(body["data"][0]["type"], json!("file"));
}

#[tokio::test]
async fn delete_route() {
    let base = spawn_node().await;
    let http = reqwest::Client::new();
    http.post(format!("{base}/api/v1/receive"))
        .json(&json!({"tx": ["mutable://open/x", 1]}))
        .send()
        .await
        .unwrap();

    let resp = http.delete(format!("{base}/api/v1/delete/mutable/open/x")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = http.delete(format!("{base}/api/v1/delete/mutable/open/x")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn health_and_schema_routes() {
    let base = spawn_node().await;

    let health: Value = reqwest::get(format!("{base}/api/v1/health")).await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], json!("ok"));

    let schema: Value = reqwest::get(format!("{base}/api/v1/schema")).await.unwrap().json().await.unwrap();
    let keys = schema["schema"].as_array().unwrap();
    assert!(keys.iter().any(|k| k == "mutable://open"));
}

#[tokio::test]
async fn http_client_implements_the_backend_contract() {
    let base = spawn_node().await;
    let client = HttpClient::new(&base);

    let res = client
        .receive(Transaction::new("mutable://open/via-client", json!({"n": 5})))
        .await;
    assert!(res.accepted, "{:?}", res.error);

    let read = client.read("mutable://open/via-client").await;
    assert_eq!(read.record.unwrap().data, json!({"n": 5}));

    let list = client.list("mutable://open", ListOptions::default()).await;
    assert_eq!(list.pagination.total, 1);

    let multi = client
        .read_multi(&["mutable://open/via-client".to_string(), "mutable://open/nope".to_string()])
        .await;
    assert!(!multi.success);
    assert!(multi.results[0].result.success);
    assert!(multi.results[1].result.is_not_found());

    let keys = client.program_keys().await;
    assert!(keys.contains(&"blob://open".to_string()));

    assert!(client.delete("mutable://open/via-client").await.success);
    assert!(!client.read("mutable://open/via-client").await.success);
}
