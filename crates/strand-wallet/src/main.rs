//! strand-walletd — the wallet server binary.
//!
//! Custodies per-user keys on a credential node and proxies authenticated
//! writes to a proxy node. Server identity/encryption keys, the JWT secret
//! and both upstream URLs come from the environment at boot and never change
//! at runtime.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use strand_client::HttpClient;
use strand_store::Backend;
use strand_wallet::config::WalletConfig;
use strand_wallet::routes::build_router;
use strand_wallet::server::WalletServer;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,strand=debug".parse().expect("default filter parses")),
        )
        .init();

    let config = match WalletConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[strand-walletd] {e}");
            std::process::exit(1);
        }
    };

    info!(
        credential = %config.credential_node_url,
        proxy = %config.proxy_node_url,
        server_key = %config.identity.public_hex(),
        "starting wallet server"
    );

    let credential: Arc<dyn Backend> = Arc::new(HttpClient::new(&config.credential_node_url));
    let proxy: Arc<dyn Backend> = Arc::new(HttpClient::new(&config.proxy_node_url));

    let host = config.host.clone();
    let port = config.port;
    let allowed_origins = config.allowed_origins.clone();
    let server = Arc::new(WalletServer::from_config(config, credential, proxy));
    let app = build_router(server, &allowed_origins);

    let addr: SocketAddr = match format!("{host}:{port}").parse() {
        Ok(addr) => addr,
        Err(_) => {
            eprintln!("[strand-walletd] invalid listen address {host}:{port}");
            std::process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("[strand-walletd] failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    info!(%addr, "strand-walletd listening");

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
    info!("strand-walletd shut down");
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
