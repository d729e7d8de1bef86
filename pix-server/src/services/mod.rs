use std::sync::Arc;

use pix_blob::BlobAdapter;
use pix_core::ObjectService;
use pix_validator::ImageValidator;

use crate::config::ServerConfig;

pub mod images;

pub struct PixServices {
    pub images: Arc<dyn ObjectService>,
}

pub fn configure(config: &ServerConfig, blobs: BlobAdapter) -> PixServices {
    let images: Arc<dyn ObjectService> = Arc::new(images::ImageService::new(
        blobs,
        ImageValidator::new(config.validation_rules()),
        config.max_files,
    ));

    PixServices { images }
}
