//! pix-core: transport-agnostic core for pixvault.

pub mod config;
pub mod context;
pub mod errors;
pub mod service;

pub use config::{PixConfig, PixConfigSnapshot};
pub use context::RequestContext;
pub use errors::{ErrorKind, PixError, PixResult};
pub use service::{
    too_many_files, BodyStream, FetchedObject, ObjectService, ObjectSummary, UploadFile,
};
