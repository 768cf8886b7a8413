//! App backend library: per-tenant action endpoints that translate signed
//! tenant payloads into validated record writes.

pub mod actions;
pub mod config;
pub mod error;
pub mod routes;
pub mod tenant;

pub use actions::AppBackend;
pub use config::AppConfig;
pub use tenant::{ActionDef, StoredAppConfig, WriteTarget};
