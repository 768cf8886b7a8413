//! strand-appd — the app backend binary.
//!
//! Exposes per-tenant action endpoints that translate appKey-signed payloads
//! into validated writes on the data node named by `DATA_NODE_URL`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use strand_app::actions::AppBackend;
use strand_app::config::AppConfig;
use strand_app::routes::build_router;
use strand_client::HttpClient;
use strand_store::Backend;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,strand=debug".parse().expect("default filter parses")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[strand-appd] {e}");
            std::process::exit(1);
        }
    };

    info!(
        data_node = %config.data_node_url,
        server_key = %config.identity.public_hex(),
        "starting app backend"
    );

    let data: Arc<dyn Backend> = Arc::new(HttpClient::new(&config.data_node_url));
    let backend = Arc::new(AppBackend::new(config.identity, config.encryption, data));
    let app = build_router(backend, &config.allowed_origins);

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(_) => {
            eprintln!("[strand-appd] invalid listen address {}:{}", config.host, config.port);
            std::process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("[strand-appd] failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    info!(%addr, "strand-appd listening");

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
    info!("strand-appd shut down");
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
