use std::env;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream as AwsByteStream, Client};
use futures::StreamExt;
use tokio_util::io::ReaderStream;

use crate::{
    BlobError, BlobInfo, BlobResult, BlobStore, ByteStream, GetResult, ObjectHead, ObjectMeta,
    PutResult,
};

const FILENAME_META: &str = "filename";
const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings for an S3-compatible service
#[derive(Debug, Clone)]
pub struct S3StoreConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl S3StoreConfig {
    pub fn new<S: Into<String>>(bucket: S) -> Self {
        Self {
            bucket: bucket.into(),
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }

    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint_url = Some(endpoint.into());
        self
    }

    /// Pick up `S3_ACCESS_KEY_ID` / `S3_SECRET_ACCESS_KEY` when both are set.
    /// Otherwise the SDK's default credential chain applies.
    pub fn with_env_credentials(mut self) -> Self {
        if let (Ok(id), Ok(secret)) = (env::var("S3_ACCESS_KEY_ID"), env::var("S3_SECRET_ACCESS_KEY")) {
            self.access_key_id = Some(id);
            self.secret_access_key = Some(secret);
        }
        self
    }
}

/// Store backed by any S3-compatible service (AWS, MinIO, RustFS, ...)
#[derive(Clone)]
pub struct S3CompatibleStore {
    client: Client,
    bucket: String,
}

impl S3CompatibleStore {
    pub async fn connect(config: S3StoreConfig) -> Self {
        let bucket = config.bucket.clone();
        let client = Self::create_client(config).await;
        Self { client, bucket }
    }

    async fn create_client(config: S3StoreConfig) -> Client {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region));

        if let (Some(id), Some(secret)) = (config.access_key_id, config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(id, secret, None, None, "pixvault"));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let aws_config = loader.load().await;
        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                // Custom endpoints (MinIO, RustFS) expect path-style addressing.
                .force_path_style(config.endpoint_url.is_some())
                .build(),
        )
    }

    async fn collect_stream(stream: &mut ByteStream) -> BlobResult<Vec<u8>> {
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(data)
    }

    fn map_aws_error(err: impl std::error::Error + Send + Sync + 'static) -> BlobError {
        BlobError::backend(err)
    }
}

#[async_trait]
impl BlobStore for S3CompatibleStore {
    async fn put(
        &self,
        key: &str,
        meta: &ObjectMeta,
        mut stream: ByteStream,
    ) -> BlobResult<PutResult> {
        let data = Self::collect_stream(&mut stream).await?;
        let size_bytes = data.len() as u64;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(size_bytes as i64)
            .body(AwsByteStream::from(data));

        if let Some(ct) = &meta.content_type {
            request = request.content_type(ct);
        }
        if let Some(filename) = &meta.filename {
            request = request.metadata(FILENAME_META, filename);
        }

        let result = request.send().await.map_err(Self::map_aws_error)?;

        Ok(PutResult {
            etag: result.e_tag,
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        let result = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(result) => result,
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    return Err(BlobError::not_found(key));
                }
                return Err(Self::map_aws_error(err));
            }
        };

        let filename = result
            .metadata()
            .and_then(|m| m.get(FILENAME_META))
            .cloned();
        let size_bytes = result.content_length.map(|len| len.max(0) as u64);

        Ok(GetResult {
            stream: Box::pin(ReaderStream::new(result.body.into_async_read())),
            size_bytes,
            content_type: result.content_type,
            filename,
            etag: result.e_tag,
        })
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        let result = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(result) => result,
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    return Err(BlobError::not_found(key));
                }
                return Err(Self::map_aws_error(err));
            }
        };

        let filename = result
            .metadata()
            .and_then(|m| m.get(FILENAME_META))
            .cloned();

        Ok(ObjectHead {
            size_bytes: result.content_length.unwrap_or(0).max(0) as u64,
            content_type: result.content_type,
            filename,
            etag: result.e_tag,
            last_modified: result.last_modified.map(|dt| dt.secs()),
        })
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<BlobInfo>> {
        let mut blobs = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let result = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(Self::map_aws_error)?;

            for object in result.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                // Filename and content type only come back from a HEAD.
                let head = match self.head(key).await {
                    Ok(head) => head,
                    Err(BlobError::NotFound { .. }) => continue,
                    Err(e) => return Err(e),
                };

                blobs.push(BlobInfo {
                    key: key.to_string(),
                    size_bytes: object.size().unwrap_or(0).max(0) as u64,
                    content_type: head.content_type,
                    filename: head.filename,
                    etag: object.e_tag().map(str::to_string),
                    last_modified: object.last_modified().map(|dt| dt.secs()),
                });
            }

            match result.next_continuation_token() {
                Some(token) if result.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(blobs)
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}
