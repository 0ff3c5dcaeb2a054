//! filegate transfer service entry point.

mod config;

use anyhow::Context;
use filegate_rpc::RpcServer;
use filegate_service::FileService;
use filegate_storage::LocalStorage;
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
        "starting filegate server"
    );

    let config = config::ServerConfig::load()?;
    let storage = LocalStorage::open(&config.storage_root, config.chunk_size)
        .await
        .with_context(|| format!("cannot open storage root {}", config.storage_root.display()))?;
    tracing::info!(root = %storage.root().display(), "storage ready");

    let cancel = CancellationToken::new();
    let server = RpcServer::new(FileService::new(storage), cancel.clone());
    let listener = RpcServer::bind(config.listen_addr.as_str())
        .await
        .with_context(|| format!("cannot bind {}", config.listen_addr))?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            cancel.cancel();
        }
    });

    server.run(listener).await?;
    tracing::info!("filegate server stopped");
    Ok(())
}
