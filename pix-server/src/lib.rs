mod app;
mod config;
mod services;

use std::sync::Arc;

use anyhow::Context;
use pix_axum::AxumApp;
use pix_blob::{BlobAdapter, BlobStore};

pub use config::ServerConfig;
pub use services::images::ImageService;

/// A wired server: the HTTP app plus the storage handle to close on shutdown.
pub struct PixServer {
    pub ax: AxumApp,
    pub blobs: BlobAdapter,
}

/// Open the configured store and wire the app around it.
pub async fn build(config: &ServerConfig) -> anyhow::Result<PixServer> {
    let store = pix_blob::open_store(&config.storage_url)
        .await
        .with_context(|| format!("failed to open storage '{}'", config.storage_url))?;
    Ok(build_with_store(config, store))
}

/// Wire the app around an already opened store.
pub fn build_with_store(config: &ServerConfig, store: Arc<dyn BlobStore>) -> PixServer {
    let blobs = BlobAdapter::from_shared(store, config.blob_config());
    let svcs = services::configure(config, blobs.clone());
    let ax = app::pix_app(config, svcs.images);

    PixServer { ax, blobs }
}
