use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use bytes::Bytes;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use pix_axum::middlewares::MultipartConfig;
use pix_axum::{axum, axum_with};
use pix_core::errors::PixError;
use pix_core::{FetchedObject, ObjectService, ObjectSummary, RequestContext, UploadFile};
use serde_json::Value;
use tower::ServiceExt;

#[derive(Default)]
struct RecordingService {
    received: Mutex<Vec<UploadFile>>,
    request_ids: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl ObjectService for RecordingService {
    async fn upload(&self, ctx: &RequestContext, files: Vec<UploadFile>) -> anyhow::Result<Vec<String>> {
        self.request_ids.lock().push(ctx.request_id.clone());
        if files.is_empty() {
            return Err(PixError::bad_request("No files were submitted").into_anyhow());
        }
        let ids = (0..files.len()).map(|i| format!("id-{i}")).collect();
        self.received.lock().extend(files);
        Ok(ids)
    }

    async fn list(&self, _ctx: &RequestContext) -> anyhow::Result<Vec<ObjectSummary>> {
        Ok(vec![ObjectSummary {
            id: "0123456789abcdef0123456789abcdef".to_string(),
            filename: "a.png".to_string(),
        }])
    }

    async fn fetch(&self, _ctx: &RequestContext, id: &str) -> anyhow::Result<FetchedObject> {
        match id {
            "known" => Ok(FetchedObject {
                content_type: "image/png".to_string(),
                size_bytes: Some(4),
                body: Box::pin(futures::stream::iter(vec![
                    Ok::<_, std::io::Error>(Bytes::from_static(b"\x89P")),
                    Ok(Bytes::from_static(b"NG")),
                ])),
            }),
            "boom" => Err(PixError::general_error("disk /srv/pix is full")
                .with_source(anyhow::anyhow!("ENOSPC"))
                .into_anyhow()),
            "raw" => Err(anyhow::anyhow!("connection refused by 10.1.2.3")),
            _ => Err(PixError::not_found(format!("No image with id '{id}'")).into_anyhow()),
        }
    }
}

const BOUNDARY: &str = "pixvault-test-boundary";

fn multipart_body(parts: &[(&str, &str, &str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, content_type, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(data.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn upload_passes_files_through_in_order() {
    let service = Arc::new(RecordingService::default());
    let app = axum(service.clone());

    let body = multipart_body(&[
        ("files", "a.png", "image/png", "first"),
        ("comment", "ignored.txt", "text/plain", "not a file field"),
        ("files", "b.jpg", "image/jpeg", "second"),
    ]);
    let res = app.router.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(res.status().as_u16(), 200);
    let body = json_body(res).await;
    assert_eq!(body["uploaded_ids"], serde_json::json!(["id-0", "id-1"]));

    let received = service.received.lock();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].filename, "a.png");
    assert_eq!(received[0].content_type, "image/png");
    assert_eq!(&received[0].data[..], b"first");
    assert_eq!(received[1].filename, "b.jpg");
}

#[tokio::test]
async fn service_sees_the_request_id() {
    let service = Arc::new(RecordingService::default());
    let app = axum(service.clone());

    let mut req = upload_request(multipart_body(&[("files", "a.png", "image/png", "x")]));
    req.headers_mut()
        .insert("x-request-id", HeaderValue::from_static("req-upload-1"));
    let res = app.router.oneshot(req).await.unwrap();

    assert_eq!(res.headers().get("x-request-id").unwrap(), "req-upload-1");
    assert_eq!(service.request_ids.lock().as_slice(), ["req-upload-1".to_string()]);
}

#[tokio::test]
async fn empty_form_is_a_bad_request() {
    let app = axum(Arc::new(RecordingService::default()));

    let res = app.router.oneshot(upload_request(multipart_body(&[]))).await.unwrap();

    assert_eq!(res.status().as_u16(), 400);
    let body = json_body(res).await;
    assert_eq!(body["name"], "BadRequest");
    assert_eq!(body["className"], "bad-request");
}

#[tokio::test]
async fn non_multipart_upload_is_a_bad_request() {
    let app = axum(Arc::new(RecordingService::default()));

    let req = Request::builder()
        .method("POST")
        .uri("/upload")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let res = app.router.oneshot(req).await.unwrap();

    assert_eq!(res.status().as_u16(), 400);
    assert!(res.headers().get("x-request-id").is_some());
    let body = json_body(res).await;
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn oversized_file_is_payload_too_large() {
    let service = Arc::new(RecordingService::default());
    let app = axum_with(
        service.clone(),
        MultipartConfig::new().max_file_size(8),
        &["*".to_string()],
    );

    let body = multipart_body(&[("files", "big.png", "image/png", "0123456789abcdef")]);
    let res = app.router.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(res.status().as_u16(), 413);
    let body = json_body(res).await;
    assert_eq!(body["name"], "PayloadTooLarge");
    assert!(service.received.lock().is_empty());
}

#[tokio::test]
async fn too_many_files_stop_the_read() {
    let service = Arc::new(RecordingService::default());
    let app = axum_with(
        service.clone(),
        MultipartConfig::new().max_files(2),
        &["*".to_string()],
    );

    let body = multipart_body(&[
        ("files", "1.png", "image/png", "1"),
        ("files", "2.png", "image/png", "2"),
        ("files", "3.png", "image/png", "3"),
    ]);
    let res = app.router.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(res.status().as_u16(), 400);
    let body = json_body(res).await;
    assert!(body["message"].as_str().unwrap().contains("at most 2"));
    assert!(service.request_ids.lock().is_empty());
}

#[tokio::test]
async fn list_wraps_summaries() {
    let app = axum(Arc::new(RecordingService::default()));

    let res = app.router.oneshot(get("/images")).await.unwrap();

    assert_eq!(res.status().as_u16(), 200);
    let body = json_body(res).await;
    assert_eq!(
        body,
        serde_json::json!({"images": [{"id": "0123456789abcdef0123456789abcdef", "filename": "a.png"}]})
    );
}

#[tokio::test]
async fn fetch_streams_bytes_with_stored_content_type() {
    let app = axum(Arc::new(RecordingService::default()));

    let res = app.router.oneshot(get("/image/known")).await.unwrap();

    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(res.headers().get("content-length").unwrap(), "4");
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"\x89PNG");
}

#[tokio::test]
async fn fetch_unknown_id_is_not_found() {
    let app = axum(Arc::new(RecordingService::default()));

    let res = app.router.oneshot(get("/image/nope")).await.unwrap();

    assert_eq!(res.status().as_u16(), 404);
    let body = json_body(res).await;
    assert_eq!(body["name"], "NotFound");
    assert_eq!(body["code"], 404);
    assert_eq!(body["className"], "not-found");
}

#[tokio::test]
async fn storage_faults_are_sanitized() {
    let app = axum(Arc::new(RecordingService::default()));

    for uri in ["/image/boom", "/image/raw"] {
        let res = app.router.clone().oneshot(get(uri)).await.unwrap();

        assert_eq!(res.status().as_u16(), 500, "{uri}");
        let body = json_body(res).await;
        assert_eq!(body["name"], "GeneralError");
        assert_eq!(body["message"], "Internal server error");
        let text = body.to_string();
        assert!(!text.contains("/srv/pix"));
        assert!(!text.contains("10.1.2.3"));
    }
}

#[tokio::test]
async fn unknown_route_returns_json_not_found() {
    let app = axum(Arc::new(RecordingService::default()));

    let res = app.router.oneshot(get("/nowhere")).await.unwrap();

    assert_eq!(res.status().as_u16(), 404);
    assert!(res.headers().get("x-request-id").is_some());
    assert_eq!(json_body(res).await["name"], "NotFound");
}

#[tokio::test]
async fn health_and_cors() {
    let app = axum(Arc::new(RecordingService::default()));

    let req = Request::builder()
        .uri("/health")
        .header("origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let res = app.router.oneshot(req).await.unwrap();

    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.headers().get("access-control-allow-origin").unwrap(), "*");
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn explicit_origins_are_enforced() {
    let app = axum_with(
        Arc::new(RecordingService::default()),
        MultipartConfig::default(),
        &["http://app.test".to_string()],
    );

    let allowed = Request::builder()
        .uri("/health")
        .header("origin", "http://app.test")
        .body(Body::empty())
        .unwrap();
    let res = app.router.clone().oneshot(allowed).await.unwrap();
    assert_eq!(
        res.headers().get("access-control-allow-origin").unwrap(),
        "http://app.test"
    );
    assert_eq!(
        res.headers().get("access-control-allow-credentials").unwrap(),
        "true"
    );

    let denied = Request::builder()
        .uri("/health")
        .header("origin", "http://evil.test")
        .body(Body::empty())
        .unwrap();
    let res = app.router.oneshot(denied).await.unwrap();
    assert!(res.headers().get("access-control-allow-origin").is_none());
}
