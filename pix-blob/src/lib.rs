//! # pix-blob: blob storage for pixvault
//!
//! `pix-blob` stores opaque payloads with a little metadata (content type and
//! original filename) and hands them back as streams. It knows nothing about
//! images or HTTP.
//!
//! ## Quick Start
//!
//! ```rust
//! use pix_blob::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let adapter = BlobAdapter::new(MemoryBlobStore::new(), BlobConfig::default());
//! let ctx = BlobCtx::new("images");
//!
//! let put = BlobPut::new()
//!     .with_content_type("text/plain")
//!     .with_filename("hello.txt");
//! let receipt = adapter.put_bytes(&ctx, put, bytes::Bytes::from_static(b"hello")).await?;
//!
//! let opened = adapter.open(&ctx, &receipt.id).await?;
//! assert_eq!(opened.content_type(), "text/plain");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Your Service  │  ← Business logic only
//! ├─────────────────┤
//! │   BlobAdapter   │  ← ids, keys, size limits
//! ├─────────────────┤
//! │   BlobStore     │  ← memory / fs / s3
//! └─────────────────┘
//! ```
//!
//! Backends are picked at startup from a connection string, see [`open_store`].

pub mod adapter;
mod config;
mod connect;
mod error;
mod fs_store;
mod memory_store;
mod receipt;
mod s3_store;
pub mod store;
mod types;

pub use adapter::BlobAdapter;
pub use config::BlobConfig;
pub use connect::open_store;
pub use error::{BlobError, BlobResult};
pub use fs_store::FsBlobStore;
pub use memory_store::MemoryBlobStore;
pub use receipt::{BlobReceipt, OpenedBlob};
pub use s3_store::{S3CompatibleStore, S3StoreConfig};
pub use store::{
    BlobInfo, BlobKeyStrategy, BlobStore, DefaultKeyStrategy, GetResult, ObjectHead, ObjectMeta,
    PutResult,
};
pub use types::{bytes_stream, BlobCtx, BlobId, BlobPut, ByteStream};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobAdapter, BlobConfig, BlobCtx, BlobError, BlobId, BlobPut, BlobReceipt, BlobResult,
        BlobStore, ByteStream, MemoryBlobStore,
    };
}
