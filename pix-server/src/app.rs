use std::sync::Arc;

use pix_axum::{axum_with, AxumApp};
use pix_core::ObjectService;

use crate::config::ServerConfig;

pub fn pix_app(config: &ServerConfig, images: Arc<dyn ObjectService>) -> AxumApp {
    axum_with(images, config.multipart_config(), &config.allowed_origins)
}
