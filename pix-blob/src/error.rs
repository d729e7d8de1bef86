use thiserror::Error;

pub type BlobResult<T> = Result<T, BlobError>;

/// Failures of blob storage. `NotFound` is the only one a caller is expected
/// to handle; everything else is a refusal or a backend fault.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("no blob stored under '{key}'")]
    NotFound { key: String },

    #[error("blob of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: u64, max: u64 },

    #[error("object key '{key}' is not a safe relative path")]
    InvalidKey { key: String },

    #[error("unsupported storage url '{url}'")]
    UnsupportedUrl { url: String },

    #[error("storage backend failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unreadable blob metadata: {0}")]
    CorruptMetadata(#[from] serde_json::Error),
}

impl BlobError {
    /// Wrap a backend SDK or driver error.
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(error))
    }

    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
