use std::future::Future;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Request};
use axum::Router;
use pix_core::ObjectService;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::middlewares::MultipartConfig;
use crate::rest;
use crate::PixAxumState;

pub struct AxumApp {
    pub state: PixAxumState,
    pub router: Router<()>,
}

impl Clone for AxumApp {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            router: self.router.clone(),
        }
    }
}

impl AxumApp {
    /// Image routes with the default middleware stack and CORS open to any
    /// origin.
    pub fn new(state: PixAxumState) -> Self {
        Self::with_origins(state, &["*".to_string()])
    }

    /// Image routes; `origins` is either `["*"]` or a list of exact origins.
    pub fn with_origins(state: PixAxumState, origins: &[String]) -> Self {
        let router = rest::image_router(state.clone())
            // Size limits are enforced by the multipart reader.
            .layer(DefaultBodyLimit::disable())
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(
                        |req: &Request<axum::body::Body>| {
                            let request_id = req
                                .headers()
                                .get("x-request-id")
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or("-");
                            tracing::info_span!(
                                "http",
                                method = %req.method(),
                                uri = %req.uri(),
                                request_id = %request_id,
                            )
                        },
                    ))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(cors_layer(origins)),
            );

        Self { state, router }
    }

    /// Serve until `shutdown` resolves, then let in-flight requests finish.
    pub async fn listen<A, F>(self, addr: A, shutdown: F) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // Credentials cannot be combined with wildcards, so methods and headers
    // mirror the preflight request.
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build an app around a service with default multipart limits.
pub fn axum(service: Arc<dyn ObjectService>) -> AxumApp {
    AxumApp::new(PixAxumState::new(service))
}

/// Build an app around a service with explicit upload limits and origins.
pub fn axum_with(
    service: Arc<dyn ObjectService>,
    multipart: MultipartConfig,
    origins: &[String],
) -> AxumApp {
    AxumApp::with_origins(PixAxumState::new(service).with_multipart(multipart), origins)
}
