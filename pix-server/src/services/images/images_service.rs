use anyhow::{Context, Result};
use async_trait::async_trait;
use pix_blob::{BlobAdapter, BlobCtx, BlobId, BlobPut};
use pix_core::{FetchedObject, ObjectService, ObjectSummary, PixError, RequestContext, UploadFile};
use pix_validator::ImageValidator;
use tracing::{debug, info, instrument, warn};

use super::images_shared;

/// Image store over a blob adapter.
///
/// Uploads are all-or-nothing: every file is validated before the first
/// put, and a storage failure mid-batch deletes what the batch already wrote.
pub struct ImageService {
    blobs: BlobAdapter,
    validator: ImageValidator,
    max_files: usize,
}

impl ImageService {
    pub fn new(blobs: BlobAdapter, validator: ImageValidator, max_files: usize) -> Self {
        Self {
            blobs,
            validator,
            max_files,
        }
    }

    fn blob_ctx(&self, ctx: &RequestContext) -> BlobCtx {
        self.blobs
            .default_ctx()
            .with_request_id(ctx.request_id.clone())
    }

    /// Decode every file off the async workers; first failure wins.
    async fn validate_all(&self, files: Vec<UploadFile>) -> Result<Vec<UploadFile>> {
        let validator = self.validator.clone();
        let span = tracing::Span::current();
        let checked = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            for (index, file) in files.iter().enumerate() {
                let info = validator
                    .validate_bytes(&file.data, Some(file.content_type.as_str()))
                    .map_err(|err| {
                        let name = images_shared::display_name(&file.filename, index);
                        images_shared::validation_failure(&name, index, err)
                    })?;
                if !file.content_type.is_empty() && !info.matches_content_type(&file.content_type) {
                    debug!(
                        filename = %file.filename,
                        declared = %file.content_type,
                        detected = info.mime_type(),
                        "declared content type differs from image format"
                    );
                }
            }
            Ok::<_, PixError>(files)
        })
        .await
        .context("image validation task failed")?;

        Ok(checked?)
    }

    async fn roll_back(&self, ctx: &BlobCtx, stored: &[BlobId]) {
        for id in stored {
            if let Err(err) = self.blobs.delete(ctx, id).await {
                warn!(%id, error = %err, "failed to remove partially uploaded image");
            }
        }
    }
}

#[async_trait]
impl ObjectService for ImageService {
    #[instrument(skip_all, fields(request_id = %ctx.request_id, files = files.len()))]
    async fn upload(&self, ctx: &RequestContext, files: Vec<UploadFile>) -> Result<Vec<String>> {
        images_shared::check_batch_size(files.len(), self.max_files)?;
        let files = self.validate_all(files).await?;

        let blob_ctx = self.blob_ctx(ctx);
        let mut stored: Vec<BlobId> = Vec::with_capacity(files.len());

        for file in files {
            let content_type = if file.content_type.is_empty() {
                images_shared::FALLBACK_CONTENT_TYPE.to_string()
            } else {
                file.content_type
            };
            let put = BlobPut::new()
                .with_content_type(content_type)
                .with_filename(file.filename);

            match self.blobs.put_bytes(&blob_ctx, put, file.data).await {
                Ok(receipt) => stored.push(receipt.id),
                Err(err) => {
                    warn!(written = stored.len(), error = %err, "upload failed, rolling back batch");
                    self.roll_back(&blob_ctx, &stored).await;
                    return Err(images_shared::put_failure(err));
                }
            }
        }

        info!(count = stored.len(), "images stored");
        Ok(stored.into_iter().map(|id| id.to_string()).collect())
    }

    #[instrument(skip_all, fields(request_id = %ctx.request_id))]
    async fn list(&self, ctx: &RequestContext) -> Result<Vec<ObjectSummary>> {
        let receipts = self
            .blobs
            .list(&self.blob_ctx(ctx))
            .await
            .map_err(images_shared::storage_failure)?;

        Ok(receipts
            .into_iter()
            .map(|receipt| ObjectSummary {
                id: receipt.id.to_string(),
                filename: receipt.filename.unwrap_or_default(),
            })
            .collect())
    }

    #[instrument(skip_all, fields(request_id = %ctx.request_id, %id))]
    async fn fetch(&self, ctx: &RequestContext, id: &str) -> Result<FetchedObject> {
        let Some(blob_id) = BlobId::parse(id) else {
            return Err(images_shared::not_found(id));
        };

        match self.blobs.open(&self.blob_ctx(ctx), &blob_id).await {
            Ok(opened) => Ok(FetchedObject {
                content_type: opened.content_type().to_string(),
                size_bytes: opened.content_length,
                body: opened.stream,
            }),
            Err(err) if err.is_not_found() => Err(images_shared::not_found(id)),
            Err(err) => Err(images_shared::storage_failure(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    use bytes::Bytes;
    use pix_blob::{BlobConfig, MemoryBlobStore};
    use pix_core::ErrorKind;
    use pix_validator::ValidationRules;

    fn png(width: u32, height: u32) -> Bytes {
        let mut buf = Vec::new();
        image::RgbImage::new(width, height)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        Bytes::from(buf)
    }

    fn service(store: Arc<MemoryBlobStore>, max_files: usize) -> ImageService {
        ImageService::new(
            BlobAdapter::from_shared(store, BlobConfig::default()),
            ImageValidator::new(ValidationRules::default()),
            max_files,
        )
    }

    fn kind(err: &anyhow::Error) -> ErrorKind {
        PixError::from_anyhow(err).expect("PixError in chain").kind
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let store = Arc::new(MemoryBlobStore::new());
        let err = service(store, 100)
            .upload(&RequestContext::default(), Vec::new())
            .await
            .unwrap_err();
        assert_eq!(kind(&err), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected_before_any_write() {
        let store = Arc::new(MemoryBlobStore::new());
        let files = (0..4)
            .map(|i| UploadFile::new(format!("{i}.png"), "image/png", png(4, 4)))
            .collect();

        let err = service(store.clone(), 3)
            .upload(&RequestContext::default(), files)
            .await
            .unwrap_err();

        let pix = PixError::from_anyhow(&err).unwrap();
        assert_eq!(pix.kind, ErrorKind::BadRequest);
        assert_eq!(pix.message, "Too many files: at most 3 files per upload");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn invalid_file_names_the_culprit() {
        let store = Arc::new(MemoryBlobStore::new());
        let files = vec![
            UploadFile::new("ok.png", "image/png", png(10, 10)),
            UploadFile::new("notes.txt", "image/png", Bytes::from_static(b"plain text")),
        ];

        let err = service(store.clone(), 100)
            .upload(&RequestContext::default(), files)
            .await
            .unwrap_err();

        let pix = PixError::from_anyhow(&err).unwrap();
        assert_eq!(pix.kind, ErrorKind::BadRequest);
        assert!(pix.message.starts_with("notes.txt: invalid image format"));
        assert_eq!(
            pix.data,
            Some(serde_json::json!({ "filename": "notes.txt", "index": 1 }))
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unnamed_file_is_reported_by_position() {
        let store = Arc::new(MemoryBlobStore::new());
        let files = vec![UploadFile::new("", "", png(2048, 2))];

        let err = service(store, 100)
            .upload(&RequestContext::default(), files)
            .await
            .unwrap_err();

        let pix = PixError::from_anyhow(&err).unwrap();
        assert!(pix.message.starts_with("file #1: image resolution 2048x2"));
    }

    #[tokio::test]
    async fn missing_content_type_is_stored_as_binary() {
        let store = Arc::new(MemoryBlobStore::new());
        let svc = service(store, 100);
        let ctx = RequestContext::default();

        let ids = svc
            .upload(&ctx, vec![UploadFile::new("x.png", "", png(3, 3))])
            .await
            .unwrap();
        let fetched = svc.fetch(&ctx, &ids[0]).await.unwrap();

        assert_eq!(fetched.content_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn malformed_and_unknown_ids_are_not_found() {
        let store = Arc::new(MemoryBlobStore::new());
        let svc = service(store, 100);
        let ctx = RequestContext::default();

        let unknown = BlobId::new().to_string();
        for id in ["", "../etc/passwd", "507f1f77bcf86cd799439011", unknown.as_str()] {
            let err = svc.fetch(&ctx, id).await.unwrap_err();
            assert_eq!(kind(&err), ErrorKind::NotFound, "{id:?}");
        }
    }
}
