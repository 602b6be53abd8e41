//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the `/proxy` handler
//! - Wire up middleware (request ID, tracing, body limit)
//! - Bind server to listener with peer address info
//! - Hand each call to the pipeline and render the outcome
//! - Sweep elapsed rate-limit windows in the background

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, DefaultBodyLimit, State},
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{ProxyConfig, RateLimitKey};
use crate::forward::ForwardError;
use crate::http::request::{request_id, MakeRequestUuidV4};
use crate::http::response::body_rejection;
use crate::observability::metrics;
use crate::pipeline::Pipeline;
use crate::security::rate_limit::client_identity;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub key_by: RateLimitKey,
}

/// HTTP server for the forwarding proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    pipeline: Arc<Pipeline>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ForwardError> {
        let pipeline = Arc::new(Pipeline::from_config(&config)?);
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Create a server around an already-built pipeline.
    pub fn with_pipeline(config: ProxyConfig, pipeline: Arc<Pipeline>) -> Self {
        let state = AppState {
            pipeline: pipeline.clone(),
            key_by: config.rate_limit.key_by,
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            pipeline,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/proxy", any(proxy_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.forward.max_body_bytes))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
    }

    /// The fully layered router, e.g. for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires, then drain in-flight calls.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let purge_task = self.pipeline.limiter().cloned().map(|limiter| {
            let every = Duration::from_secs(self.config.rate_limit.purge_interval_secs);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let removed = limiter.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, tracked = limiter.tracked_clients(), "Purged rate-limit windows");
                    }
                }
            })
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        if let Some(task) = purge_task {
            task.abort();
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// `ANY /proxy`: run the call through the pipeline.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&headers).to_string();

    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(request_id = %request_id, peer = %peer, error = %rejection, "Rejected request body");
            return body_rejection(rejection);
        }
    };

    let client = client_identity(state.key_by, peer);
    let outcome = state
        .pipeline
        .handle(&client, &headers, &body)
        .await;

    let status = outcome.response.status();
    let result = outcome.response.outcome();
    metrics::record_request(&method, status.as_u16(), result, start_time);

    tracing::info!(
        request_id = %request_id,
        client = %client,
        status = status.as_u16(),
        outcome = result,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Proxy call completed"
    );

    outcome.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credential;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_router(mutate: impl FnOnce(&mut ProxyConfig)) -> Router {
        let mut config = ProxyConfig::default();
        config.auth.api_key = Credential::new("test-key");
        mutate(&mut config);
        HttpServer::new(config)
            .unwrap()
            .router()
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_missing_key() {
        let request = Request::builder()
            .method("POST")
            .uri("/proxy")
            .body(Body::from(r#"{"url":"http://example.com"}"#))
            .unwrap();

        let response = test_router(|_| {}).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()["ratelimit-limit"], "30");
        assert_eq!(response.headers()["ratelimit-policy"], "30;w=60");
        assert_eq!(json_body(response).await, json!({"error": "API key missing"}));
    }

    #[tokio::test]
    async fn test_caller_request_id_is_echoed() {
        let request = Request::builder()
            .uri("/proxy")
            .header("x-request-id", "req-42")
            .header("x-api-key", "test-key")
            .body(Body::empty())
            .unwrap();

        let response = test_router(|_| {}).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["x-request-id"], "req-42");
    }

    #[tokio::test]
    async fn test_any_method_is_routed() {
        for method in ["GET", "POST", "PUT", "DELETE", "PATCH"] {
            let request = Request::builder()
                .method(method)
                .uri("/proxy")
                .header("x-api-key", "wrong")
                .body(Body::empty())
                .unwrap();
            let response = test_router(|_| {}).oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "method {}", method);
        }
    }

    #[tokio::test]
    async fn test_repeated_api_key_is_forbidden() {
        let request = Request::builder()
            .method("POST")
            .uri("/proxy")
            .header("x-api-key", "test-key")
            .header("x-api-key", "test-key")
            .body(Body::from(r#"{"url":"http://example.com"}"#))
            .unwrap();

        let response = test_router(|_| {}).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await, json!({"error": "Invalid API key"}));
    }

    #[tokio::test]
    async fn test_other_paths_are_not_found() {
        let request = Request::builder()
            .uri("/elsewhere")
            .header("x-api-key", "test-key")
            .body(Body::empty())
            .unwrap();
        let response = test_router(|_| {}).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let router = test_router(|c| c.forward.max_body_bytes = 16);
        let request = Request::builder()
            .method("POST")
            .uri("/proxy")
            .header("x-api-key", "test-key")
            .body(Body::from(vec![b' '; 64]))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(response).await, json!({"error": "Request body too large"}));
    }

    #[tokio::test]
    async fn test_limiter_disabled_sends_no_headers() {
        let router = test_router(|c| c.rate_limit.enabled = false);
        let request = Request::builder()
            .uri("/proxy")
            .header("x-api-key", "test-key")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get("ratelimit-limit").is_none());
    }
}
