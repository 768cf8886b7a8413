//! Wallet server library: credential-gated key custody and signed proxy
//! writes over two upstream record nodes.

pub mod config;
pub mod error;
pub mod google;
pub mod jwt;
pub mod password;
pub mod routes;
pub mod server;

pub use config::WalletConfig;
pub use server::{CredentialRequest, LoginRequest, ProxyWriteRequest, WalletServer};
