use serde::{Deserialize, Serialize};
use crate::{BlobId, ByteStream};

/// Receipt describing a stored blob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobReceipt {
    pub id: BlobId,
    pub key: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub filename: Option<String>,
    pub etag: Option<String>,
    pub created_at: i64,
}

impl BlobReceipt {
    /// Create a new blob receipt stamped with the current time
    pub fn new(id: BlobId, key: String, size_bytes: u64) -> Self {
        Self {
            id,
            key,
            size_bytes,
            content_type: None,
            filename: None,
            etag: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Set content type
    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set filename
    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Set etag
    pub fn with_etag<S: Into<String>>(mut self, etag: S) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Override the creation time (used when rebuilding from a listing)
    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Result of opening a blob for reading
pub struct OpenedBlob {
    pub receipt: BlobReceipt,
    pub stream: ByteStream,
    /// Known payload length, if the backend reported one
    pub content_length: Option<u64>,
}

impl OpenedBlob {
    pub fn new(receipt: BlobReceipt, stream: ByteStream, content_length: Option<u64>) -> Self {
        Self {
            receipt,
            stream,
            content_length,
        }
    }

    /// Stored content type, falling back to a generic binary type
    pub fn content_type(&self) -> &str {
        self.receipt
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream")
    }
}
