use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::{
    BlobError, BlobInfo, BlobResult, BlobStore, ByteStream, GetResult, ObjectHead, ObjectMeta,
    PutResult,
};

const PAYLOAD_EXT: &str = "bin";
const SIDECAR_EXT: &str = "json";

/// Metadata written next to each payload. Its presence marks the object as
/// committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Sidecar {
    size_bytes: u64,
    content_type: Option<String>,
    filename: Option<String>,
    created_at: i64,
}

/// Filesystem store: `<root>/<key>.bin` plus `<root>/<key>.json`.
///
/// Payloads are streamed to a temp file and renamed into place, then the
/// sidecar is written the same way. Readers only trust keys that have a
/// sidecar, so a crash mid-put never exposes a partial object.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> BlobResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn base_path(&self, key: &str) -> BlobResult<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(BlobError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    fn with_ext(base: &Path, ext: &str) -> PathBuf {
        let mut name = base.as_os_str().to_owned();
        name.push(".");
        name.push(ext);
        PathBuf::from(name)
    }

    fn temp_path(target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_owned();
        name.push(format!(".tmp-{}", uuid::Uuid::new_v4().simple()));
        PathBuf::from(name)
    }

    async fn read_sidecar(&self, key: &str) -> BlobResult<Sidecar> {
        let path = Self::with_ext(&self.base_path(key)?, SIDECAR_EXT);
        match tokio::fs::read(&path).await {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BlobError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_payload(&self, target: &Path, mut stream: ByteStream) -> BlobResult<u64> {
        let temp = Self::temp_path(target);
        let result = async {
            let mut file = tokio::fs::File::create(&temp).await?;
            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.sync_all().await?;
            tokio::fs::rename(&temp, target).await?;
            Ok::<u64, std::io::Error>(written)
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&temp).await;
        }
        Ok(result?)
    }

    async fn write_sidecar(&self, target: &Path, sidecar: &Sidecar) -> BlobResult<()> {
        let temp = Self::temp_path(target);
        let raw = serde_json::to_vec(sidecar)?;
        let result = async {
            tokio::fs::write(&temp, &raw).await?;
            tokio::fs::rename(&temp, target).await
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&temp).await;
        }
        Ok(result?)
    }
}

async fn remove_if_present(path: &Path) -> BlobResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        key: &str,
        meta: &ObjectMeta,
        stream: ByteStream,
    ) -> BlobResult<PutResult> {
        let base = self.base_path(key)?;
        if let Some(parent) = base.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let payload = Self::with_ext(&base, PAYLOAD_EXT);
        let size_bytes = self.write_payload(&payload, stream).await?;

        let sidecar = Sidecar {
            size_bytes,
            content_type: meta.content_type.clone(),
            filename: meta.filename.clone(),
            created_at: chrono::Utc::now().timestamp(),
        };
        if let Err(e) = self
            .write_sidecar(&Self::with_ext(&base, SIDECAR_EXT), &sidecar)
            .await
        {
            let _ = tokio::fs::remove_file(&payload).await;
            return Err(e);
        }

        Ok(PutResult {
            etag: None,
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        let sidecar = self.read_sidecar(key).await?;
        let payload = Self::with_ext(&self.base_path(key)?, PAYLOAD_EXT);

        let file = match tokio::fs::File::open(&payload).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(BlobError::not_found(key)),
            Err(e) => return Err(e.into()),
        };

        Ok(GetResult {
            stream: Box::pin(ReaderStream::new(file)),
            size_bytes: Some(sidecar.size_bytes),
            content_type: sidecar.content_type,
            filename: sidecar.filename,
            etag: None,
        })
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        let sidecar = self.read_sidecar(key).await?;
        Ok(ObjectHead {
            size_bytes: sidecar.size_bytes,
            content_type: sidecar.content_type,
            filename: sidecar.filename,
            etag: None,
            last_modified: Some(sidecar.created_at),
        })
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<BlobInfo>> {
        // Keys live one level below the prefix directory ("images/" -> root/images).
        let (dir_part, name_prefix) = match prefix.rfind('/') {
            Some(idx) => (&prefix[..idx], &prefix[idx + 1..]),
            None => ("", prefix),
        };
        let dir = if dir_part.is_empty() {
            self.root.clone()
        } else {
            self.base_path(dir_part)?
        };

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut infos = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if !stem.starts_with(name_prefix) {
                continue;
            }

            let key = if dir_part.is_empty() {
                stem.to_string()
            } else {
                format!("{dir_part}/{stem}")
            };
            let sidecar = match self.read_sidecar(&key).await {
                Ok(sidecar) => sidecar,
                // Deleted between read_dir and here.
                Err(BlobError::NotFound { .. }) => continue,
                Err(BlobError::CorruptMetadata(err)) => {
                    warn!(%key, error = %err, "skipping unreadable sidecar");
                    continue;
                }
                Err(e) => return Err(e),
            };

            infos.push(BlobInfo {
                key,
                size_bytes: sidecar.size_bytes,
                content_type: sidecar.content_type,
                filename: sidecar.filename,
                etag: None,
                last_modified: Some(sidecar.created_at),
            });
        }

        infos.sort_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(infos)
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        let base = self.base_path(key)?;
        remove_if_present(&Self::with_ext(&base, SIDECAR_EXT)).await?;
        remove_if_present(&Self::with_ext(&base, PAYLOAD_EXT)).await
    }

    fn name(&self) -> &'static str {
        "fs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes_stream;
    use bytes::Bytes;

    #[tokio::test]
    async fn rejects_keys_that_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();

        for key in ["../outside", "/etc/passwd", "images/../../x", ""] {
            let err = store
                .put(key, &ObjectMeta::default(), bytes_stream(Bytes::from_static(b"x")))
                .await
                .unwrap_err();
            assert!(matches!(err, BlobError::InvalidKey { .. }), "key {key:?}");
        }
    }

    #[tokio::test]
    async fn payload_without_sidecar_is_invisible() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();

        tokio::fs::create_dir_all(dir.path().join("images")).await.unwrap();
        tokio::fs::write(dir.path().join("images/orphan.bin"), b"partial")
            .await
            .unwrap();

        assert!(store.list("images/").await.unwrap().is_empty());
        assert!(store.get("images/orphan").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn foreign_json_does_not_break_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();
        store
            .put(
                "images/kept",
                &ObjectMeta::default(),
                bytes_stream(Bytes::from_static(b"png")),
            )
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("images/.DS_Store.json"), br#"{"foo":1}"#)
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("images/garbage.json"), b"not json")
            .await
            .unwrap();

        let keys: Vec<String> = store
            .list("images/")
            .await
            .unwrap()
            .into_iter()
            .map(|info| info.key)
            .collect();
        assert_eq!(keys, vec!["images/kept"]);
    }

    #[tokio::test]
    async fn failed_stream_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();
        let stream: ByteStream = Box::pin(futures::stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(std::io::Error::new(ErrorKind::ConnectionReset, "reset")),
        ]));

        assert!(store
            .put("images/broken", &ObjectMeta::default(), stream)
            .await
            .is_err());

        let mut entries = tokio::fs::read_dir(dir.path().join("images")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }
}
