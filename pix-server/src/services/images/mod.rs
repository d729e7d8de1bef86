pub mod images_service;
pub mod images_shared;

pub use images_service::ImageService;
