use axum::{
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
};
use multer::{Constraints, Multipart, SizeLimit};
use pix_core::{too_many_files, PixError, UploadFile};

use crate::{PixAxumError, PixAxumState};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Limits applied while reading an upload form.
#[derive(Debug, Clone)]
pub struct MultipartConfig {
    /// Maximum size of one file in bytes (None = unlimited)
    pub max_file_size: Option<u64>,
    /// Maximum size of the whole request body in bytes (None = unlimited)
    pub max_total_size: Option<u64>,
    /// Stop reading once more than this many files arrived (None = unlimited)
    pub max_files: Option<usize>,
    /// Form field that carries the files; other fields are skipped
    pub file_field: String,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            max_file_size: Some(50 * 1024 * 1024),   // 50MB
            max_total_size: Some(500 * 1024 * 1024), // 500MB
            max_files: Some(100),
            file_field: "files".to_string(),
        }
    }
}

impl MultipartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum file size in bytes
    pub fn max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = Some(size);
        self
    }

    /// Set maximum total request size in bytes
    pub fn max_total_size(mut self, size: u64) -> Self {
        self.max_total_size = Some(size);
        self
    }

    pub fn max_files(mut self, count: usize) -> Self {
        self.max_files = Some(count);
        self
    }

    pub fn file_field(mut self, name: &str) -> Self {
        self.file_field = name.to_string();
        self
    }

    fn constraints(&self) -> Constraints {
        let mut limit = SizeLimit::new();
        if let Some(total) = self.max_total_size {
            limit = limit.whole_stream(total);
        }
        if let Some(per_file) = self.max_file_size {
            limit = limit.per_field(per_file);
        }
        Constraints::new().size_limit(limit)
    }
}

/// The files of a `multipart/form-data` upload, in submission order.
///
/// Missing filenames become `""` and missing part content types become
/// `application/octet-stream`. A present content type is kept as sent.
#[derive(Debug)]
pub struct UploadBatch(pub Vec<UploadFile>);

impl FromRequest<PixAxumState> for UploadBatch {
    type Rejection = PixAxumError;

    async fn from_request(req: Request, state: &PixAxumState) -> Result<Self, Self::Rejection> {
        let config = state.multipart.as_ref();

        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let boundary = multer::parse_boundary(content_type).map_err(|_| {
            PixError::bad_request("Expected a multipart/form-data body with a boundary")
        })?;

        let stream = req.into_body().into_data_stream();
        let mut multipart = Multipart::with_constraints(stream, boundary, config.constraints());

        let mut files = Vec::new();
        while let Some(field) = multipart.next_field().await.map_err(map_multer_error)? {
            if field.name() != Some(config.file_field.as_str()) {
                continue;
            }

            if let Some(max) = config.max_files {
                if files.len() >= max {
                    return Err(too_many_files(max).into());
                }
            }

            let filename = field.file_name().unwrap_or_default().to_string();
            // Raw header, not multer's parsed mime: the declared type is stored verbatim.
            let content_type = field
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
            let data = field.bytes().await.map_err(map_multer_error)?;

            tracing::debug!(%filename, %content_type, size = data.len(), "received upload part");
            files.push(UploadFile::new(filename, content_type, data));
        }

        Ok(UploadBatch(files))
    }
}

fn map_multer_error(err: multer::Error) -> PixError {
    match err {
        multer::Error::FieldSizeExceeded { limit, field_name } => PixError::payload_too_large(
            format!(
                "File in field '{}' exceeds the maximum size of {} bytes",
                field_name.unwrap_or_default(),
                limit
            ),
        ),
        multer::Error::StreamSizeExceeded { limit } => PixError::payload_too_large(format!(
            "Request body exceeds the maximum size of {limit} bytes"
        )),
        other => PixError::bad_request(format!("Failed to parse multipart data: {other}")),
    }
}
