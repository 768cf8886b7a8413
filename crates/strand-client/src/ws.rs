//! WebSocket client for a remote node.
//!
//! One connection multiplexes every in-flight request: the client assigns a
//! fresh id per request and resolves responses from a pending-request map.
//! A dropped connection fails all pending requests and reconnects with
//! bounded-retry exponential backoff; once the retry budget is spent the
//! client stays closed and every further request fails fast.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use strand_core::{
    DeleteResult, HealthResult, HealthStatus, ListOptions, ListResult, ReadMultiResult,
    ReadResult, ReceiveResult, StrandError, Transaction,
};
use strand_store::Backend;

use crate::proto::{WsOp, WsRequest, WsResponse};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Mutex<HashMap<u64, oneshot::Sender<WsResponse>>>;

#[derive(Debug, Clone)]
pub struct WsClientConfig {
    /// Per-request expiry; on timeout the pending entry is dropped and the
    /// caller sees `RequestTimeout`.
    pub request_timeout: Duration,
    /// Reconnect budget after a drop. Once spent, the client stays closed.
    pub max_reconnect_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_reconnect_attempts: 5,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
        }
    }
}

pub struct WsClient {
    next_id: AtomicU64,
    pending: Arc<Pending>,
    out_tx: mpsc::Sender<Message>,
    closed: Arc<AtomicBool>,
    request_timeout: Duration,
}

fn unavailable(msg: impl std::fmt::Display) -> StrandError {
    StrandError::BackendUnavailable(msg.to_string())
}

impl WsClient {
    /// Connect to a node WebSocket endpoint, e.g. `ws://127.0.0.1:4000/api/v1/ws`.
    pub async fn connect(url: &str, config: WsClientConfig) -> Result<Self, StrandError> {
        let (stream, _) = connect_async(url).await.map_err(unavailable)?;
        info!(url, "websocket connected");

        let pending: Arc<Pending> = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let (out_tx, out_rx) = mpsc::channel::<Message>(64);

        let client = Self {
            next_id: AtomicU64::new(1),
            pending: Arc::clone(&pending),
            out_tx,
            closed: Arc::clone(&closed),
            request_timeout: config.request_timeout,
        };

        tokio::spawn(manage_connection(
            url.to_string(),
            config,
            stream,
            out_rx,
            pending,
            closed,
        ));

        Ok(client)
    }

    async fn request(&self, op: WsOp, payload: Value) -> Result<WsResponse, StrandError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(unavailable("websocket closed (reconnect budget spent)"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| StrandError::Storage("pending map lock poisoned".into()))?
            .insert(id, tx);

        let frame = WsRequest { id, op, payload };
        let text = serde_json::to_string(&frame)
            .map_err(|e| StrandError::Serialization(e.to_string()))?;
        if self.out_tx.send(Message::Text(text)).await.is_err() {
            self.forget(id);
            return Err(unavailable("websocket task stopped"));
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            // Sender dropped: the connection died and pending requests were
            // failed wholesale.
            Ok(Err(_)) => Err(unavailable("connection closed with request in flight")),
            Err(_) => {
                self.forget(id);
                Err(StrandError::RequestTimeout)
            }
        }
    }

    fn forget(&self, id: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&id);
        }
    }

    /// Issue a request and parse the returned envelope, or build a failure
    /// envelope from the transport error.
    async fn envelope<T: DeserializeOwned>(
        &self,
        op: WsOp,
        payload: Value,
        fail: impl FnOnce(&StrandError) -> T,
    ) -> T {
        let resp = match self.request(op, payload).await {
            Ok(resp) => resp,
            Err(e) => return fail(&e),
        };
        match resp.data {
            Some(data) => serde_json::from_value(data)
                .unwrap_or_else(|e| fail(&unavailable(format!("malformed response: {e}")))),
            None => fail(&unavailable(resp.error.unwrap_or_else(|| "empty response".into()))),
        }
    }
}

#[async_trait]
impl Backend for WsClient {
    async fn receive(&self, tx: Transaction) -> ReceiveResult {
        self.envelope(WsOp::Receive, json!({ "tx": tx }), ReceiveResult::rejected)
            .await
    }

    async fn read(&self, uri: &str) -> ReadResult {
        self.envelope(WsOp::Read, json!({ "uri": uri }), ReadResult::failed).await
    }

    async fn read_multi(&self, uris: &[String]) -> ReadMultiResult {
        self.envelope(WsOp::ReadMulti, json!({ "uris": uris }), |e| ReadMultiResult {
            success: false,
            results: Vec::new(),
            error: Some(e.to_string()),
        })
        .await
    }

    async fn list(&self, prefix: &str, opts: ListOptions) -> ListResult {
        let fail_opts = opts.clone();
        self.envelope(
            WsOp::List,
            json!({ "prefix": prefix, "options": opts }),
            move |e| ListResult::failed(e, &fail_opts),
        )
        .await
    }

    async fn delete(&self, uri: &str) -> DeleteResult {
        self.envelope(WsOp::Delete, json!({ "uri": uri }), DeleteResult::failed)
            .await
    }

    async fn health(&self) -> HealthResult {
        self.envelope(WsOp::Health, json!({}), |e| HealthResult {
            status: HealthStatus::Unavailable,
            message: Some(e.to_string()),
            details: None,
        })
        .await
    }

    async fn program_keys(&self) -> Vec<String> {
        #[derive(serde::Deserialize)]
        struct SchemaBody {
            schema: Vec<String>,
        }
        self.envelope::<SchemaBody>(WsOp::Schema, json!({}), |_| SchemaBody { schema: Vec::new() })
            .await
            .schema
    }

    async fn cleanup(&self) {
        if let Err(e) = self.request(WsOp::Cleanup, json!({})).await {
            warn!(error = %e, "remote cleanup failed");
        }
    }
}

// ── Connection management ────────────────────────────────────────────────────

/// Fail every pending request by dropping its completion sender.
fn fail_pending(pending: &Pending) {
    if let Ok(mut map) = pending.lock() {
        let dropped = map.len();
        map.clear();
        if dropped > 0 {
            warn!(dropped, "failed pending requests on socket close");
        }
    }
}

/// Pump one live connection. Returns `true` when the client itself was
/// dropped (manager should exit), `false` when the connection died and a
/// reconnect should be attempted.
async fn pump(stream: WsStream, out_rx: &mut mpsc::Receiver<Message>, pending: &Pending) -> bool {
    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(msg) => {
                    if sink.send(msg).await.is_err() {
                        return false;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return true;
                }
            },
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<WsResponse>(&text) {
                    Ok(resp) => {
                        let waiter = pending.lock().ok().and_then(|mut p| p.remove(&resp.id));
                        match waiter {
                            Some(tx) => { let _ = tx.send(resp); }
                            None => debug!(id = resp.id, "response for expired request"),
                        }
                    }
                    Err(e) => warn!(error = %e, "undecodable websocket frame"),
                },
                Some(Ok(Message::Close(_))) | None => return false,
                Some(Ok(_)) => {} // ping/pong/binary, nothing to do
                Some(Err(e)) => {
                    warn!(error = %e, "websocket read failed");
                    return false;
                }
            },
        }
    }
}

async fn manage_connection(
    url: String,
    config: WsClientConfig,
    mut stream: WsStream,
    mut out_rx: mpsc::Receiver<Message>,
    pending: Arc<Pending>,
    closed: Arc<AtomicBool>,
) {
    loop {
        let client_dropped = pump(stream, &mut out_rx, &pending).await;
        fail_pending(&pending);
        if client_dropped {
            return;
        }

        // Bounded-retry exponential backoff.
        let mut backoff = config.initial_backoff;
        let mut attempt = 0u32;
        stream = loop {
            attempt += 1;
            if attempt > config.max_reconnect_attempts {
                warn!(url, attempts = config.max_reconnect_attempts, "reconnect budget spent");
                closed.store(true, Ordering::SeqCst);
                return;
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(config.max_backoff);

            match connect_async(&url).await {
                Ok((stream, _)) => {
                    info!(url, attempt, "websocket reconnected");
                    break stream;
                }
                Err(e) => warn!(url, attempt, error = %e, "reconnect failed"),
            }
        };
    }
}
