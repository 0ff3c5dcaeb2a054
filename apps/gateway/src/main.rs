//! filegate HTTP gateway entry point.

mod config;

use std::sync::Arc;

use anyhow::Context;
use filegate_gateway::AppState;
use filegate_rpc::RpcClient;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting filegate gateway"
    );

    let config = config::GatewayConfig::load()?;
    tracing::info!(backend = %config.backend_addr, "configuration loaded");

    let client = RpcClient::new(config.backend_addr.clone())
        .with_connect_timeout(config.connect_timeout());
    let state = AppState::new(Arc::new(client.clone()))
        .with_chunk_size(config.chunk_size)
        .with_max_upload_bytes(config.max_upload_bytes);

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("cannot bind {}", config.listen_addr))?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            shutdown.cancel();
        }
    });

    filegate_gateway::serve(listener, filegate_gateway::router(state), cancel).await?;
    client.close();
    tracing::info!("filegate gateway stopped");
    Ok(())
}
