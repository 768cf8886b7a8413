//! Node server library: HTTP/WebSocket transport over a storage backend.
//!
//! The binary in `main.rs` wires env config to a concrete backend; tests
//! build the same router in-process against an in-memory backend.

pub mod config;
pub mod error;
pub mod http;
pub mod ws;

pub use config::{NodeConfig, StoreKind};
pub use http::{build_router, AppState};
