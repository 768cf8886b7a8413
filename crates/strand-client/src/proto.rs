//! WebSocket frame format, shared between the node server and the client.
//!
//! Requests multiplex over one connection: the client assigns a fresh `id`
//! per request and matches responses back by it. `data` always carries the
//! full operation envelope, so WS and HTTP surfaces return identical shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operation selector inside a [`WsRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WsOp {
    Receive,
    Read,
    ReadMulti,
    List,
    Delete,
    Health,
    Schema,
    Cleanup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsRequest {
    pub id: u64,
    #[serde(rename = "type")]
    pub op: WsOp,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsResponse {
    pub id: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WsResponse {
    pub fn ok(id: u64, data: Value) -> Self {
        Self { id, success: true, data: Some(data), error: None }
    }

    pub fn ok_with(id: u64, success: bool, data: Value, error: Option<String>) -> Self {
        Self { id, success, data: Some(data), error }
    }

    pub fn err(id: u64, error: impl Into<String>) -> Self {
        Self { id, success: false, data: None, error: Some(error.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_frame_wire_shape() {
        let req = WsRequest { id: 7, op: WsOp::ReadMulti, payload: json!({"uris": []}) };
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire, json!({"id": 7, "type": "readMulti", "payload": {"uris": []}}));

        let back: WsRequest = serde_json::from_value(wire).unwrap();
        assert_eq!(back.op, WsOp::ReadMulti);
    }

    #[test]
    fn response_omits_empty_fields() {
        let wire = serde_json::to_value(WsResponse::ok(1, json!({"x": 1}))).unwrap();
        assert_eq!(wire, json!({"id": 1, "success": true, "data": {"x": 1}}));

        let wire = serde_json::to_value(WsResponse::err(2, "boom")).unwrap();
        assert_eq!(wire, json!({"id": 2, "success": false, "error": "boom"}));
    }
}
