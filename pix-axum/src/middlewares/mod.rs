pub mod multipart;

pub use multipart::{MultipartConfig, UploadBatch};
