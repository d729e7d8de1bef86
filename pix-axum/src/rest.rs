use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing, Json, Router,
};
use pix_core::{ObjectSummary, PixError, RequestContext};
use serde::Serialize;

use crate::{middlewares::UploadBatch, PixAxumError, PixAxumState};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub uploaded_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub images: Vec<ObjectSummary>,
}

fn context_from_headers(headers: &HeaderMap) -> RequestContext {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(RequestContext::new)
        .unwrap_or_else(RequestContext::generate)
}

/// `POST /upload`, `GET /images`, `GET /image/{id}` and `GET /health`.
pub fn image_router(state: PixAxumState) -> Router<()> {
    Router::new()
        .route(
            "/upload",
            routing::post(
                |State(state): State<PixAxumState>,
                 headers: HeaderMap,
                 UploadBatch(files): UploadBatch| async move {
                    let ctx = context_from_headers(&headers);
                    let uploaded_ids = state.service.upload(&ctx, files).await?;
                    Ok::<_, PixAxumError>(Json(UploadResponse { uploaded_ids }))
                },
            ),
        )
        .route(
            "/images",
            routing::get(
                |State(state): State<PixAxumState>, headers: HeaderMap| async move {
                    let ctx = context_from_headers(&headers);
                    let images = state.service.list(&ctx).await?;
                    Ok::<_, PixAxumError>(Json(ListResponse { images }))
                },
            ),
        )
        .route(
            "/image/{id}",
            routing::get(
                |State(state): State<PixAxumState>,
                 headers: HeaderMap,
                 Path(id): Path<String>| async move {
                    let ctx = context_from_headers(&headers);
                    let object = state.service.fetch(&ctx, &id).await?;

                    let content_type = HeaderValue::from_str(&object.content_type)
                        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
                    let mut response = Response::new(Body::from_stream(object.body));
                    response
                        .headers_mut()
                        .insert(header::CONTENT_TYPE, content_type);
                    if let Some(len) = object.size_bytes {
                        response
                            .headers_mut()
                            .insert(header::CONTENT_LENGTH, HeaderValue::from(len));
                    }
                    Ok::<_, PixAxumError>(response)
                },
            ),
        )
        .route("/health", routing::get(|| async { "ok" }))
        .fallback(|| async {
            PixAxumError::from(PixError::not_found("Page not found")).into_response()
        })
        .with_state(state)
}

