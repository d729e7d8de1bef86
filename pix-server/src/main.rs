use anyhow::Result;
use pix_server::ServerConfig;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = ServerConfig::from_env();
    let server = pix_server::build(&config).await?;

    let addr = config.addr();
    tracing::info!(
        %addr,
        store = server.blobs.store_name(),
        namespace = %config.namespace,
        "[pixvault] starting"
    );

    let blobs = server.blobs.clone();
    server.ax.listen(addr, shutdown_signal()).await?;

    blobs.close().await?;
    tracing::info!("[pixvault] stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
