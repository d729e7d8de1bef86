use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;

use crate::context::RequestContext;
use crate::errors::PixError;

/// Body of a fetched object, yielded chunk by chunk.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// One candidate file of an upload batch.
///
/// `filename` and `content_type` are whatever the client sent; they are
/// stored verbatim and never used for decisions.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// Entry returned by `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectSummary {
    pub id: String,
    pub filename: String,
}

/// Result of `fetch`: the stored content type and a stream over the bytes.
pub struct FetchedObject {
    pub content_type: String,
    pub size_bytes: Option<u64>,
    pub body: BodyStream,
}

impl std::fmt::Debug for FetchedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedObject")
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

/// Rejection for a batch with more than `max` files.
pub fn too_many_files(max: usize) -> PixError {
    PixError::bad_request(format!("Too many files: at most {max} files per upload"))
}

/// Transport-agnostic image store service.
///
/// - `upload` → admit a batch, return one id per file in submission order
/// - `list`   → every stored object as `{id, filename}`
/// - `fetch`  → content type and bytes of one object
///
/// Implementations report failures as `anyhow::Error` carrying a
/// `PixError`, so adapters can map them to status codes.
#[async_trait]
pub trait ObjectService: Send + Sync {
    async fn upload(&self, ctx: &RequestContext, files: Vec<UploadFile>) -> Result<Vec<String>>;

    async fn list(&self, ctx: &RequestContext) -> Result<Vec<ObjectSummary>>;

    async fn fetch(&self, ctx: &RequestContext, id: &str) -> Result<FetchedObject>;
}
