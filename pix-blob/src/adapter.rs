use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::{
    bytes_stream, BlobConfig, BlobCtx, BlobError, BlobId, BlobKeyStrategy, BlobPut, BlobReceipt,
    BlobResult, BlobStore, ByteStream, DefaultKeyStrategy, ObjectMeta, OpenedBlob,
};

/// The main blob adapter - this is what services embed
///
/// Owns id allocation and the id → key mapping, so services only ever see
/// `BlobId`s and backends only ever see keys.
#[derive(Clone)]
pub struct BlobAdapter {
    store: Arc<dyn BlobStore>,
    keys: Arc<dyn BlobKeyStrategy>,
    config: BlobConfig,
}

impl BlobAdapter {
    /// Create a new blob adapter
    pub fn new<S: BlobStore + 'static>(store: S, config: BlobConfig) -> Self {
        Self::from_shared(Arc::new(store), config)
    }

    /// Create from an already shared store handle
    pub fn from_shared(store: Arc<dyn BlobStore>, config: BlobConfig) -> Self {
        Self {
            store,
            keys: Arc::new(DefaultKeyStrategy),
            config,
        }
    }

    /// Store a blob from a stream under a freshly allocated id
    pub async fn put(
        &self,
        ctx: &BlobCtx,
        put: BlobPut,
        body: ByteStream,
    ) -> BlobResult<BlobReceipt> {
        if let Some(size) = put.size_hint {
            if size > self.config.max_blob_bytes {
                return Err(BlobError::TooLarge {
                    size,
                    max: self.config.max_blob_bytes,
                });
            }
        }

        let blob_id = BlobId::new();
        let key = self.keys.object_key(&ctx.namespace, &blob_id);
        let meta = ObjectMeta::new(put.content_type.clone(), put.filename.clone());

        let result = self.store.put(&key, &meta, body).await?;
        debug!(
            request_id = %ctx.request_id,
            store = self.store.name(),
            %key,
            size_bytes = result.size_bytes,
            "blob stored"
        );

        let mut receipt = BlobReceipt::new(blob_id, key, result.size_bytes);
        if let Some(ct) = put.content_type {
            receipt = receipt.with_content_type(ct);
        }
        if let Some(filename) = put.filename {
            receipt = receipt.with_filename(filename);
        }
        if let Some(etag) = result.etag {
            receipt = receipt.with_etag(etag);
        }

        Ok(receipt)
    }

    /// Store an in-memory buffer
    pub async fn put_bytes(
        &self,
        ctx: &BlobCtx,
        put: BlobPut,
        data: Bytes,
    ) -> BlobResult<BlobReceipt> {
        let put = put.with_size_hint(data.len() as u64);
        self.put(ctx, put, bytes_stream(data)).await
    }

    /// Open a blob for reading
    pub async fn open(&self, ctx: &BlobCtx, id: &BlobId) -> BlobResult<OpenedBlob> {
        let key = self.keys.object_key(&ctx.namespace, id);
        let get = self.store.get(&key).await?;

        let mut receipt = BlobReceipt::new(id.clone(), key, get.size_bytes.unwrap_or(0));
        if let Some(ct) = get.content_type {
            receipt = receipt.with_content_type(ct);
        }
        if let Some(filename) = get.filename {
            receipt = receipt.with_filename(filename);
        }
        if let Some(etag) = get.etag {
            receipt = receipt.with_etag(etag);
        }

        Ok(OpenedBlob::new(receipt, get.stream, get.size_bytes))
    }

    /// Metadata of one blob without its content
    pub async fn stat(&self, ctx: &BlobCtx, id: &BlobId) -> BlobResult<BlobReceipt> {
        let key = self.keys.object_key(&ctx.namespace, id);
        let head = self.store.head(&key).await?;

        let mut receipt = BlobReceipt::new(id.clone(), key, head.size_bytes);
        if let Some(ct) = head.content_type {
            receipt = receipt.with_content_type(ct);
        }
        if let Some(filename) = head.filename {
            receipt = receipt.with_filename(filename);
        }
        if let Some(etag) = head.etag {
            receipt = receipt.with_etag(etag);
        }
        if let Some(ts) = head.last_modified {
            receipt = receipt.with_created_at(ts);
        }

        Ok(receipt)
    }

    /// Every blob in the context's namespace. Keys that do not map back to a
    /// blob id (foreign objects in a shared bucket) are skipped.
    pub async fn list(&self, ctx: &BlobCtx) -> BlobResult<Vec<BlobReceipt>> {
        let prefix = self.keys.namespace_prefix(&ctx.namespace);
        let infos = self.store.list(&prefix).await?;

        let receipts = infos
            .into_iter()
            .filter_map(|info| {
                let id = self.keys.blob_id(&ctx.namespace, &info.key)?;
                let mut receipt = BlobReceipt::new(id, info.key, info.size_bytes);
                if let Some(ct) = info.content_type {
                    receipt = receipt.with_content_type(ct);
                }
                if let Some(filename) = info.filename {
                    receipt = receipt.with_filename(filename);
                }
                if let Some(etag) = info.etag {
                    receipt = receipt.with_etag(etag);
                }
                if let Some(ts) = info.last_modified {
                    receipt = receipt.with_created_at(ts);
                }
                Some(receipt)
            })
            .collect();

        Ok(receipts)
    }

    /// Delete a blob
    pub async fn delete(&self, ctx: &BlobCtx, id: &BlobId) -> BlobResult<()> {
        let key = self.keys.object_key(&ctx.namespace, id);
        self.store.delete(&key).await
    }

    /// Release the underlying store
    pub async fn close(&self) -> BlobResult<()> {
        self.store.close().await
    }

    /// Get configuration
    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    /// Context in the configured default namespace
    pub fn default_ctx(&self) -> BlobCtx {
        BlobCtx::new(self.config.namespace.clone())
    }

    /// Name of the backing store
    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }
}
