use std::sync::Arc;

use pix_core::ObjectService;

use crate::middlewares::multipart::MultipartConfig;

#[derive(Clone)]
pub struct PixAxumState {
    pub service: Arc<dyn ObjectService>,
    pub multipart: Arc<MultipartConfig>,
}

impl PixAxumState {
    pub fn new(service: Arc<dyn ObjectService>) -> Self {
        Self {
            service,
            multipart: Arc::new(MultipartConfig::default()),
        }
    }

    pub fn with_multipart(mut self, config: MultipartConfig) -> Self {
        self.multipart = Arc::new(config);
        self
    }
}
