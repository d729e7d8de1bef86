use async_trait::async_trait;
use crate::{BlobId, BlobResult, ByteStream};

/// Core blob storage operations - must be implemented by all storage backends
///
/// Every call is independent. Backends guarantee that a single `put` either
/// lands completely or not at all; nothing spans calls.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob from a stream
    async fn put(
        &self,
        key: &str,
        meta: &ObjectMeta,
        stream: ByteStream,
    ) -> BlobResult<PutResult>;

    /// Get a blob as a stream
    async fn get(&self, key: &str) -> BlobResult<GetResult>;

    /// Get blob metadata without content
    async fn head(&self, key: &str) -> BlobResult<ObjectHead>;

    /// List every blob whose key starts with `prefix`
    async fn list(&self, prefix: &str) -> BlobResult<Vec<BlobInfo>>;

    /// Delete a blob. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Release connections or handles held by the store
    async fn close(&self) -> BlobResult<()> {
        Ok(())
    }
}

/// Metadata stored next to the payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

impl ObjectMeta {
    pub fn new(content_type: Option<String>, filename: Option<String>) -> Self {
        Self {
            content_type,
            filename,
        }
    }
}

/// Result of a successful put operation
#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: Option<String>,
    pub size_bytes: u64,
}

/// Result of a get operation
pub struct GetResult {
    pub stream: ByteStream,
    pub size_bytes: Option<u64>,
    pub content_type: Option<String>,
    pub filename: Option<String>,
    pub etag: Option<String>,
}

impl std::fmt::Debug for GetResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetResult")
            .field("size_bytes", &self.size_bytes)
            .field("content_type", &self.content_type)
            .field("filename", &self.filename)
            .field("etag", &self.etag)
            .finish_non_exhaustive()
    }
}

/// Metadata about a blob
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub filename: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<i64>,
}

/// Listing entry
#[derive(Debug, Clone)]
pub struct BlobInfo {
    pub key: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub filename: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<i64>,
}

/// Strategy for mapping blob ids to storage keys
pub trait BlobKeyStrategy: Send + Sync {
    /// Generate a key for a blob
    fn object_key(&self, namespace: &str, blob_id: &BlobId) -> String;

    /// Prefix shared by every key of a namespace
    fn namespace_prefix(&self, namespace: &str) -> String;

    /// Recover the blob id from a key listed under `namespace`
    fn blob_id(&self, namespace: &str, key: &str) -> Option<BlobId>;
}

/// Default key strategy: namespace/blob_id
#[derive(Debug, Clone)]
pub struct DefaultKeyStrategy;

impl BlobKeyStrategy for DefaultKeyStrategy {
    fn object_key(&self, namespace: &str, blob_id: &BlobId) -> String {
        format!("{}{}", self.namespace_prefix(namespace), blob_id)
    }

    fn namespace_prefix(&self, namespace: &str) -> String {
        format!("{}/", namespace.trim_matches('/'))
    }

    fn blob_id(&self, namespace: &str, key: &str) -> Option<BlobId> {
        key.strip_prefix(&self.namespace_prefix(namespace))
            .and_then(BlobId::parse)
    }
}
