//! WebSocket surface tests: frame protocol, multiplexing and timeouts.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::{json, Value};

use strand_client::{WsClient, WsClientConfig};
use strand_core::{ListOptions, Transaction};
use strand_node::{build_router, AppState};
use strand_schema::Schema;
use strand_store::{Backend, DataNode, MemoryStore};

async fn spawn_node() -> (String, String) {
    let backend: Arc<dyn Backend> =
        Arc::new(DataNode::new(Arc::new(Schema::builtin()), MemoryStore::new()));
    let app = build_router(AppState::new(backend), &[]);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("ws://{addr}/api/v1/ws"), format!("http://{addr}"))
}

#[tokio::test]
async fn ws_client_round_trip() {
    let (ws_url, _) = spawn_node().await;
    let client = WsClient::connect(&ws_url, WsClientConfig::default()).await.unwrap();

    let res = client
        .receive(Transaction::new("mutable://open/ws", json!({"via": "ws"})))
        .await;
    assert!(res.accepted, "{:?}", res.error);

    let read = client.read("mutable://open/ws").await;
    assert_eq!(read.record.unwrap().data, json!({"via": "ws"}));

    let miss = client.read("mutable://open/missing").await;
    assert!(!miss.success);
    assert!(miss.is_not_found());

    let list = client.list("mutable://open", ListOptions::default()).await;
    assert_eq!(list.pagination.total, 1);

    let keys = client.program_keys().await;
    assert!(keys.contains(&"link://open".to_string()));

    assert!(client.delete("mutable://open/ws").await.success);
}

#[tokio::test]
async fn ws_rejections_carry_the_validator_error() {
    let (ws_url, _) = spawn_node().await;
    let client = WsClient::connect(&ws_url, WsClientConfig::default()).await.unwrap();

    let res = client
        .receive(Transaction::new("nosuch://program/x", json!(1)))
        .await;
    assert!(!res.accepted);
    assert_eq!(res.code.as_deref(), Some("UnknownProgram"));
}

#[tokio::test]
async fn ws_multiplexes_concurrent_requests() {
    let (ws_url, _) = spawn_node().await;
    let client = Arc::new(WsClient::connect(&ws_url, WsClientConfig::default()).await.unwrap());

    // Write 20 records concurrently over one connection.
    let writes = (0..20).map(|i| {
        let client = Arc::clone(&client);
        async move {
            client
                .receive(Transaction::new(format!("mutable://open/mux/{i}"), json!(i)))
                .await
        }
    });
    let results = join_all(writes).await;
    assert!(results.iter().all(|r| r.accepted));

    // And read them back concurrently.
    let reads = (0..20).map(|i| {
        let client = Arc::clone(&client);
        async move { client.read(&format!("mutable://open/mux/{i}")).await }
    });
    let reads = join_all(reads).await;
    for (i, read) in reads.iter().enumerate() {
        assert_eq!(read.record.as_ref().unwrap().data, json!(i));
    }
}

#[tokio::test]
async fn ws_read_multi_and_health() {
    let (ws_url, _) = spawn_node().await;
    let client = WsClient::connect(&ws_url, WsClientConfig::default()).await.unwrap();

    client.receive(Transaction::new("mutable://open/a", json!(1))).await;
    let multi = client
        .read_multi(&["mutable://open/a".to_string(), "mutable://open/b".to_string()])
        .await;
    assert!(!multi.success);
    assert_eq!(multi.results.len(), 2);
    assert!(multi.results[0].result.success);

    let health = client.health().await;
    assert_eq!(serde_json::to_value(health.status).unwrap(), json!("ok"));
}

#[tokio::test]
async fn ws_and_http_share_one_store() {
    let (ws_url, base) = spawn_node().await;
    let client = WsClient::connect(&ws_url, WsClientConfig::default()).await.unwrap();

    client
        .receive(Transaction::new("mutable://open/shared", json!("both")))
        .await;

    let record: Value = reqwest::get(format!("{base}/api/v1/read/mutable/open/shared"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(record["data"], json!("both"));
}

#[tokio::test]
async fn ws_connect_to_dead_server_fails() {
    // Bind a port, then drop the listener so nothing is serving.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = WsClientConfig {
        request_timeout: Duration::from_millis(500),
        ..Default::default()
    };
    assert!(WsClient::connect(&format!("ws://{addr}/api/v1/ws"), config).await.is_err());
}
