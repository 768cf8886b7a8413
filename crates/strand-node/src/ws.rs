//! WebSocket surface: the `{id, type, payload}` frame protocol over the same
//! backend the HTTP routes serve.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use strand_client::proto::{WsOp, WsRequest, WsResponse};
use strand_core::{HealthStatus, ListOptions, Transaction};

use crate::http::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: AppState) {
    while let Some(frame) = socket.recv().await {
        let msg = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue, // ping/pong handled by axum
        };

        let response = match serde_json::from_str::<WsRequest>(&msg) {
            Ok(request) => dispatch(&state, request).await,
            Err(e) => {
                warn!(error = %e, "undecodable websocket request");
                WsResponse::err(0, format!("malformed request frame: {e}"))
            }
        };

        let text = match serde_json::to_string(&response) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "unencodable websocket response");
                continue;
            }
        };
        if socket.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
    debug!("websocket connection closed");
}

fn envelope_response(id: u64, success: bool, envelope: impl serde::Serialize, error: Option<String>) -> WsResponse {
    match serde_json::to_value(&envelope) {
        Ok(data) => WsResponse::ok_with(id, success, data, error),
        Err(e) => WsResponse::err(id, format!("response encoding failed: {e}")),
    }
}

async fn dispatch(state: &AppState, request: WsRequest) -> WsResponse {
    let id = request.id;
    match request.op {
        WsOp::Receive => {
            #[derive(Deserialize)]
            struct Payload {
                tx: Transaction,
            }
            match serde_json::from_value::<Payload>(request.payload) {
                Ok(p) => {
                    let result = state.backend.receive(p.tx).await;
                    let (accepted, error) = (result.accepted, result.error.clone());
                    envelope_response(id, accepted, result, error)
                }
                Err(e) => WsResponse::err(id, format!("receive payload must carry tx: {e}")),
            }
        }
        WsOp::Read => match uri_payload(request.payload) {
            Ok(uri) => {
                let result = state.explorer.read(&uri).await;
                let (success, error) = (result.success, result.error.clone());
                envelope_response(id, success, result, error)
            }
            Err(e) => WsResponse::err(id, e),
        },
        WsOp::ReadMulti => {
            #[derive(Deserialize)]
            struct Payload {
                uris: Vec<String>,
            }
            match serde_json::from_value::<Payload>(request.payload) {
                Ok(p) => {
                    let result = state.backend.read_multi(&p.uris).await;
                    let (success, error) = (result.success, result.error.clone());
                    envelope_response(id, success, result, error)
                }
                Err(e) => WsResponse::err(id, format!("readMulti payload must carry uris: {e}")),
            }
        }
        WsOp::List => {
            #[derive(Deserialize)]
            struct Payload {
                prefix: String,
                #[serde(default)]
                options: Option<ListOptions>,
            }
            match serde_json::from_value::<Payload>(request.payload) {
                Ok(p) => {
                    let opts = p.options.unwrap_or_default();
                    let result = state.explorer.list(&p.prefix, opts).await;
                    let (success, error) = (result.success, result.error.clone());
                    envelope_response(id, success, result, error)
                }
                Err(e) => WsResponse::err(id, format!("list payload must carry prefix: {e}")),
            }
        }
        WsOp::Delete => match uri_payload(request.payload) {
            Ok(uri) => {
                let result = state.backend.delete(&uri).await;
                let (success, error) = (result.success, result.error.clone());
                envelope_response(id, success, result, error)
            }
            Err(e) => WsResponse::err(id, e),
        },
        WsOp::Health => {
            let result = state.backend.health().await;
            let success = result.status == HealthStatus::Ok;
            let error = result.message.clone();
            envelope_response(id, success, result, error)
        }
        WsOp::Schema => {
            let keys = state.backend.program_keys().await;
            WsResponse::ok(id, json!({ "schema": keys }))
        }
        WsOp::Cleanup => {
            state.backend.cleanup().await;
            WsResponse::ok(id, json!({}))
        }
    }
}

fn uri_payload(payload: Value) -> Result<String, String> {
    payload
        .get("uri")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| "payload must carry a uri".into())
}
