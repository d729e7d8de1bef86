use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use parking_lot::RwLock;

use crate::{
    bytes_stream, BlobError, BlobInfo, BlobResult, BlobStore, ByteStream, GetResult, ObjectHead,
    ObjectMeta, PutResult,
};

#[derive(Debug, Clone)]
struct StoredObject {
    seq: u64,
    data: Bytes,
    meta: ObjectMeta,
    etag: String,
    created_at: i64,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, StoredObject>,
    next_seq: u64,
}

/// In-process store for tests and throwaway instances.
///
/// Listing returns objects in insertion order.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    inner: RwLock<Inner>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.inner.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn collect(mut stream: ByteStream) -> BlobResult<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        meta: &ObjectMeta,
        stream: ByteStream,
    ) -> BlobResult<PutResult> {
        // Drain the body before taking the lock; a failed stream stores nothing.
        let data = collect(stream).await?;
        let size_bytes = data.len() as u64;
        let etag = format!("{:x}-{}", size_bytes, key.len());

        let mut inner = self.inner.write();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.objects.insert(
            key.to_string(),
            StoredObject {
                seq,
                data,
                meta: meta.clone(),
                etag: etag.clone(),
                created_at: chrono::Utc::now().timestamp(),
            },
        );

        Ok(PutResult {
            etag: Some(etag),
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        let object = self
            .inner
            .read()
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::not_found(key))?;

        Ok(GetResult {
            size_bytes: Some(object.data.len() as u64),
            stream: bytes_stream(object.data),
            content_type: object.meta.content_type,
            filename: object.meta.filename,
            etag: Some(object.etag),
        })
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        let inner = self.inner.read();
        let object = inner
            .objects
            .get(key)
            .ok_or_else(|| BlobError::not_found(key))?;

        Ok(ObjectHead {
            size_bytes: object.data.len() as u64,
            content_type: object.meta.content_type.clone(),
            filename: object.meta.filename.clone(),
            etag: Some(object.etag.clone()),
            last_modified: Some(object.created_at),
        })
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<BlobInfo>> {
        let inner = self.inner.read();
        let mut matching: Vec<(&String, &StoredObject)> = inner
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .collect();
        matching.sort_by_key(|(_, object)| object.seq);

        Ok(matching
            .into_iter()
            .map(|(key, object)| BlobInfo {
                key: key.clone(),
                size_bytes: object.data.len() as u64,
                content_type: object.meta.content_type.clone(),
                filename: object.meta.filename.clone(),
                etag: Some(object.etag.clone()),
                last_modified: Some(object.created_at),
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.inner.write().objects.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_stream_stores_nothing() {
        let store = MemoryBlobStore::new();
        let stream: ByteStream = Box::pin(futures::stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "client went away")),
        ]));

        let err = store
            .put("images/x", &ObjectMeta::default(), stream)
            .await
            .unwrap_err();

        assert!(matches!(err, BlobError::Io(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn list_keeps_insertion_order() {
        let store = MemoryBlobStore::new();
        for key in ["images/c", "images/a", "other/z", "images/b"] {
            store
                .put(key, &ObjectMeta::default(), bytes_stream(Bytes::from_static(b"1")))
                .await
                .unwrap();
        }

        let keys: Vec<String> = store
            .list("images/")
            .await
            .unwrap()
            .into_iter()
            .map(|info| info.key)
            .collect();
        assert_eq!(keys, vec!["images/c", "images/a", "images/b"]);
    }
}
