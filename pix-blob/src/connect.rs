use std::sync::Arc;

use url::Url;

use crate::{BlobError, BlobResult, BlobStore, FsBlobStore, MemoryBlobStore, S3CompatibleStore, S3StoreConfig};

/// Open a store from a connection string.
///
/// - `memory://`
/// - `file://<path>` (relative paths such as `file://./data` are allowed)
/// - `s3://<bucket>?endpoint=<url>&region=<region>`
pub async fn open_store(conn: &str) -> BlobResult<Arc<dyn BlobStore>> {
    let unsupported = || BlobError::UnsupportedUrl {
        url: conn.to_string(),
    };

    let (scheme, rest) = conn.split_once("://").ok_or_else(unsupported)?;

    match scheme {
        "memory" => Ok(Arc::new(MemoryBlobStore::new())),
        "file" => {
            // Not parsed as a URL: `file://./data` would lose the dot as a host.
            if rest.is_empty() {
                return Err(unsupported());
            }
            Ok(Arc::new(FsBlobStore::open(rest).await?))
        }
        "s3" => {
            let config = s3_config(conn).ok_or_else(unsupported)?;
            Ok(Arc::new(S3CompatibleStore::connect(config).await))
        }
        _ => Err(unsupported()),
    }
}

fn s3_config(conn: &str) -> Option<S3StoreConfig> {
    let url = Url::parse(conn).ok()?;
    let bucket = url.host_str().filter(|b| !b.is_empty())?;

    let mut config = S3StoreConfig::new(bucket).with_env_credentials();
    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            "endpoint" => config = config.with_endpoint(value.into_owned()),
            "region" => config = config.with_region(value.into_owned()),
            _ => {}
        }
    }
    Some(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_and_file_schemes() {
        assert_eq!(open_store("memory://").await.unwrap().name(), "memory");

        let dir = tempfile::tempdir().unwrap();
        let conn = format!("file://{}", dir.path().join("images").display());
        assert_eq!(open_store(&conn).await.unwrap().name(), "fs");
        assert!(dir.path().join("images").is_dir());
    }

    #[tokio::test]
    async fn unknown_schemes_are_rejected() {
        for conn in ["mongodb://localhost:27017", "no-scheme", "file://"] {
            let err = open_store(conn).await.err().unwrap();
            assert!(matches!(err, BlobError::UnsupportedUrl { .. }), "{conn}");
        }
    }

    #[test]
    fn s3_query_parameters() {
        let config =
            s3_config("s3://pix-images?endpoint=http://localhost:9000&region=eu-west-1").unwrap();
        assert_eq!(config.bucket, "pix-images");
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.region, "eu-west-1");

        assert!(s3_config("s3://").is_none());
    }
}
