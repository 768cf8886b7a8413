//! strand-node — the record-store node binary.
//!
//! Startup sequence:
//!   1. Load env config (PORT, STORE_BACKEND, SCHEMA_MODULE, ALLOWED_ORIGINS)
//!   2. Build the schema registry (built-ins, plus the schema file if given)
//!   3. Open the record store and wrap it in the transaction pipeline
//!   4. Serve the HTTP + WebSocket surface until SIGINT/SIGTERM

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use strand_node::config::{NodeConfig, StoreKind};
use strand_node::http::{build_router, AppState};
use strand_schema::Schema;
use strand_store::{Backend, DataNode, MemoryStore, SledStore};

/// Drain budget after a shutdown signal before in-flight requests are cut.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,strand=debug".parse().expect("default filter parses")),
        )
        .init();

    let config = match NodeConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[strand-node] {e}");
            std::process::exit(1);
        }
    };

    let schema = match &config.schema_module {
        Some(path) => match Schema::from_file(path) {
            Ok(schema) => {
                info!(path = %path.display(), "schema module loaded");
                schema
            }
            Err(e) => {
                eprintln!("[strand-node] {e}");
                std::process::exit(1);
            }
        },
        None => Schema::builtin(),
    };
    let schema = Arc::new(schema);

    let backend: Arc<dyn Backend> = match &config.store {
        StoreKind::Memory => {
            info!("using in-memory record store");
            Arc::new(DataNode::new(schema, MemoryStore::new()))
        }
        StoreKind::Sled { path } => match SledStore::open(path) {
            Ok(store) => {
                info!(path = %path.display(), "using sled record store");
                Arc::new(DataNode::new(schema, store))
            }
            Err(e) => {
                eprintln!("[strand-node] {e}");
                std::process::exit(1);
            }
        },
    };

    let app = build_router(AppState::new(backend), &config.allowed_origins);

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(_) => {
            eprintln!("[strand-node] invalid listen address {}:{}", config.host, config.port);
            std::process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("[strand-node] failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    info!(%addr, "strand-node listening");

    // Graceful shutdown: drain in-flight requests up to the grace budget,
    // then cancel the rest.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        shutdown_rx.await.ok();
    });
    let mut server_task = tokio::spawn(async move {
        if let Err(e) = server.await {
            warn!(error = %e, "server error");
        }
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());
    if tokio::time::timeout(SHUTDOWN_GRACE, &mut server_task).await.is_err() {
        warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "drain budget spent, cancelling");
        server_task.abort();
    }
    info!("strand-node shut down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
