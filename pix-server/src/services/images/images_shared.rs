use pix_blob::BlobError;
use pix_core::PixError;
use pix_validator::ValidationError;
use serde_json::json;

/// Stored when the client did not say what it sent.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

pub fn check_batch_size(count: usize, max: usize) -> Result<(), PixError> {
    if count == 0 {
        return Err(PixError::bad_request("No files were submitted"));
    }
    if count > max {
        return Err(pix_core::too_many_files(max));
    }
    Ok(())
}

/// Name a file in messages; uploads without a filename get their position.
pub fn display_name(filename: &str, index: usize) -> String {
    if filename.is_empty() {
        format!("file #{}", index + 1)
    } else {
        filename.to_string()
    }
}

/// Client-caused failures carry `{"filename", "index"}` so callers can point
/// at the rejected file without parsing the message.
pub fn validation_failure(name: &str, index: usize, err: ValidationError) -> PixError {
    if err.is_client_error() {
        PixError::bad_request(format!("{name}: {err}"))
            .with_data(json!({ "filename": name, "index": index }))
    } else {
        PixError::general_error(format!("Failed to read upload {name}"))
            .with_source(anyhow::Error::new(err))
    }
}

pub fn put_failure(err: BlobError) -> anyhow::Error {
    match err {
        BlobError::TooLarge { .. } => PixError::payload_too_large(err.to_string()).into_anyhow(),
        other => storage_failure(other),
    }
}

pub fn storage_failure(err: BlobError) -> anyhow::Error {
    PixError::general_error("Storage operation failed")
        .with_source(anyhow::Error::new(err))
        .into_anyhow()
}

pub fn not_found(id: &str) -> anyhow::Error {
    PixError::not_found(format!("No image with id '{id}'")).into_anyhow()
}
