pub mod http;
pub mod proto;
pub mod ws;

pub use http::HttpClient;
pub use proto::{WsOp, WsRequest, WsResponse};
pub use ws::{WsClient, WsClientConfig};
