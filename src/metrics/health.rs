//! HTTP server for health checks, statistics and Prometheus metrics
//!
//! The same listener also carries the signaling socket at `/ws` when a
//! [`SignalingState`] is attached. Every route sits behind CORS and request
//! logging; the `/api` routes are additionally limited per client address.

use crate::config::HttpSettings;
use crate::matchmaking::SessionManager;
use crate::metrics::collector::MetricsCollector;
use crate::metrics::rate_limit::{limit_api_requests, ApiRateLimiter};
use crate::service::health::{HealthCheck, HealthStatus};
use crate::signaling::handler::{self, SignalingState};
use crate::signaling::location::{client_address, FallbackLocationResolver, LocationResolver};
use crate::types::Category;
use anyhow::{Context, Result};
use axum::{
    extract::{ConnectInfo, Path, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, error, info, warn, Level};

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
    pub http: HttpSettings,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
            http: HttpSettings::default(),
        }
    }
}

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct HealthServerState {
    pub service_name: String,
    pub metrics_collector: Arc<MetricsCollector>,
    pub session_manager: Option<SessionManager>,
    pub location_resolver: Arc<dyn LocationResolver>,
    pub is_running: Arc<RwLock<bool>>,
    pub started_at: Instant,
}

pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    signaling: Option<SignalingState>,
    rate_limiter: Option<Arc<ApiRateLimiter>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        let rate_limiter = ApiRateLimiter::from_settings(&config.http).map(Arc::new);
        if rate_limiter.is_none() && config.http.rate_limit_enabled() {
            warn!(
                "API rate limit of {} per {}s cannot be enforced, limiting disabled",
                config.http.api_rate_limit, config.http.api_rate_window_seconds
            );
        }

        Self {
            config,
            state: HealthServerState {
                service_name: "pairline".to_string(),
                metrics_collector,
                session_manager: None,
                location_resolver: Arc::new(FallbackLocationResolver),
                is_running: Arc::new(RwLock::new(false)),
                started_at: Instant::now(),
            },
            signaling: None,
            rate_limiter,
            shutdown_tx,
        }
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.state.service_name = name.into();
        self
    }

    /// Attach the session manager and the service running flag
    pub fn with_session_manager(
        mut self,
        manager: SessionManager,
        is_running: Arc<RwLock<bool>>,
    ) -> Self {
        self.state.session_manager = Some(manager);
        self.state.is_running = is_running;
        self
    }

    /// Mount the signaling socket on this server
    pub fn with_signaling(mut self, signaling: SignalingState) -> Self {
        self.state.location_resolver = signaling.location_resolver.clone();
        self.signaling = Some(signaling);
        self
    }

    /// Bind and serve until [`HealthServer::stop`] is called
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid HTTP server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("HTTP server listening on http://{}", addr);
        if self.signaling.is_some() {
            info!("Signaling socket available at ws://{}/ws", addr);
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("HTTP server shutdown signal received");
        })
        .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Create the router with all HTTP endpoints
    pub fn create_router(&self) -> Router {
        let api = Router::new()
            .route("/api/health", get(health_handler))
            .route("/api/stats", get(stats_handler))
            .route("/api/country", get(own_country_handler))
            .route("/api/country/{ip}", get(country_handler));
        let api = match &self.rate_limiter {
            Some(limiter) => api.route_layer(middleware::from_fn_with_state(
                limiter.clone(),
                limit_api_requests,
            )),
            None => api,
        };

        let router = Router::new()
            .route("/", get(root_handler))
            .route("/ready", get(ready_handler))
            .route("/alive", get(alive_handler))
            .route("/metrics", get(metrics_handler))
            .merge(api)
            .with_state(self.state.clone());

        let router = match &self.signaling {
            Some(signaling) => router.merge(handler::router(signaling.clone())),
            None => router,
        };

        let router = if self.config.http.request_logging {
            router.layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
        } else {
            router
        };

        router.layer(cors_layer(&self.config.http))
    }

    pub async fn stop(&self) -> Result<()> {
        info!("Stopping HTTP server...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to HTTP server: {}", e);
        }
        Ok(())
    }
}

/// CORS for browser clients; credentials only with explicit origins
fn cors_layer(settings: &HttpSettings) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    match settings.allowed_origins() {
        None => layer.allow_origin(Any).allow_headers(Any),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring unusable CORS origin '{}'", origin);
                        None
                    }
                })
                .collect();

            layer
                .allow_origin(AllowOrigin::list(origins))
                .allow_headers(AllowHeaders::mirror_request())
                .allow_credentials(true)
        }
    }
}

async fn root_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    Json(json!({
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/api/health",
            "/api/stats",
            "/api/country/{ip}",
            "/ready",
            "/alive",
            "/metrics",
            "/ws"
        ]
    }))
}

async fn health_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Health check requested");

    let manager = match &state.session_manager {
        Some(manager) => manager,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "error": "Service not initialized",
                    "timestamp": chrono::Utc::now()
                })),
            )
        }
    };

    match HealthCheck::check(
        &state.service_name,
        manager,
        &state.is_running,
        state.started_at,
    )
    .await
    {
        Ok(health) => {
            let code = match health.status {
                HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::OK,
            };
            (
                code,
                Json(json!({
                    "status": health.status,
                    "timestamp": health.timestamp,
                    "uptime": health.uptime_seconds,
                    "stats": {
                        "activeUsers": health.stats.connected,
                        "activeRooms": health.stats.active_rooms
                    },
                    "checks": health.checks
                })),
            )
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "timestamp": chrono::Utc::now()
                })),
            )
        }
    }
}

async fn stats_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Stats endpoint requested");

    let stats = match state.session_manager.as_ref().map(|manager| manager.stats()) {
        Some(Ok(stats)) => stats,
        Some(Err(e)) => {
            error!("Failed to get stats: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Failed to get service stats" })),
            );
        }
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Service not initialized" })),
            )
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "activeUsers": stats.connected,
            "activeRooms": stats.active_rooms,
            "waitingUsers": stats.waiting_total,
            "waitingByCategory": {
                "male": stats.waiting_in(Category::Male),
                "female": stats.waiting_in(Category::Female),
                "both": stats.waiting_in(Category::Both)
            },
            "idleUsers": stats.idle,
            "pendingRematches": stats.pending_rematches,
            "totalConnections": stats.total_connections,
            "roomsOpened": stats.rooms_opened,
            "rematches": stats.rematches,
            "signalsRelayed": stats.signals_relayed,
            "signalsDropped": stats.signals_dropped,
            "reportsSubmitted": stats.reports_submitted,
            "timestamp": chrono::Utc::now()
        })),
    )
}

async fn country_handler(
    Path(ip): Path<String>,
    State(state): State<HealthServerState>,
) -> impl IntoResponse {
    Json(state.location_resolver.resolve(&ip).await)
}

/// Location of the caller, from `X-Forwarded-For` or the peer address
async fn own_country_handler(
    State(state): State<HealthServerState>,
    request: Request,
) -> impl IntoResponse {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(peer)| *peer);
    let address = client_address(request.headers(), peer);
    Json(state.location_resolver.resolve(&address).await)
}

async fn ready_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match &state.session_manager {
        Some(manager) => match HealthCheck::readiness_check(manager, &state.is_running).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
            Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
            Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
            Err(e) => {
                error!("Readiness check failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
            }
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

async fn alive_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Liveness check requested");

    if state.session_manager.is_none() {
        return (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized");
    }

    match HealthCheck::liveness_check(&state.is_running).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Alive"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
    }
}

async fn metrics_handler(State(state): State<HealthServerState>) -> Response {
    debug!("Metrics endpoint requested");

    let metric_families = state.metrics_collector.registry().gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(output) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            output,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signaling::MockEventPublisher;
    use crate::types::Location;
    use axum::{body::Body, http::Request};
    use std::time::Duration;
    use tower::ServiceExt; // for oneshot

    fn create_test_server() -> (HealthServer, SessionManager, Arc<RwLock<bool>>) {
        let collector = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        let manager = SessionManager::new(
            Arc::new(MockEventPublisher::new()),
            collector.clone(),
            Duration::ZERO,
        );
        let is_running = Arc::new(RwLock::new(true));
        let server = HealthServer::new(HealthServerConfig::default(), collector)
            .with_session_manager(manager.clone(), is_running.clone());
        (server, manager, is_running)
    }

    fn create_server_with_http(http: HttpSettings) -> HealthServer {
        let (server, manager, is_running) = create_test_server();
        let config = HealthServerConfig {
            http,
            ..HealthServerConfig::default()
        };
        HealthServer::new(config, server.state.metrics_collector.clone())
            .with_session_manager(manager, is_running)
    }

    fn request_from(uri: &str, peer: [u8; 4]) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .extension(ConnectInfo(SocketAddr::from((peer, 40000))))
            .body(Body::empty())
            .unwrap()
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let (server, _, _) = create_test_server();
        let (status, body) = get_json(server.create_router(), "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "pairline");
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let (server, manager, _) = create_test_server();
        manager.connect("a", Location::unknown()).unwrap();
        manager.connect("b", Location::unknown()).unwrap();
        manager
            .declare_preferences("a", Category::Female, Category::Male)
            .unwrap();

        let (status, body) = get_json(server.create_router(), "/api/stats").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["activeUsers"], 2);
        assert_eq!(body["activeRooms"], 0);
        assert_eq!(body["waitingUsers"], 1);
        assert_eq!(body["waitingByCategory"]["female"], 1);
        assert_eq!(body["totalConnections"], 2);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (server, manager, is_running) = create_test_server();
        manager.connect("a", Location::unknown()).unwrap();

        let (status, body) = get_json(server.create_router(), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["stats"]["activeUsers"], 1);

        *is_running.write().await = false;
        let (status, body) = get_json(server.create_router(), "/api/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_country_endpoint() {
        let (server, _, _) = create_test_server();

        let (status, body) = get_json(server.create_router(), "/api/country/127.0.0.1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "US");

        let (_, body) = get_json(server.create_router(), "/api/country/203.0.113.9").await;
        assert_eq!(body["code"], "XX");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (server, manager, _) = create_test_server();
        manager.connect("a", Location::unknown()).unwrap();

        let response = server
            .create_router()
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("pairline_connections_total"));
    }

    #[tokio::test]
    async fn test_liveness_without_session_manager() {
        let collector = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        let server = HealthServer::new(HealthServerConfig::default(), collector);
        let app = server.create_router();

        for uri in ["/api/health", "/api/stats", "/ready", "/alive"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_404_handling() {
        let (server, _, _) = create_test_server();

        let response = server
            .create_router()
            .oneshot(
                Request::builder()
                    .uri("/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin_by_default() {
        let (server, _, _) = create_test_server();

        let response = server
            .create_router()
            .oneshot(
                Request::builder()
                    .uri("/api/stats")
                    .header("origin", "https://anywhere.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_cors_restricted_to_configured_origin() {
        let server = create_server_with_http(HttpSettings {
            cors_origin: "https://chat.example.org".to_string(),
            ..HttpSettings::default()
        });
        let app = server.create_router();

        let preflight = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/stats")
                    .header("origin", "https://chat.example.org")
                    .header("access-control-request-method", "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(preflight.status().is_success());
        assert_eq!(
            preflight
                .headers()
                .get("access-control-allow-origin")
                .unwrap(),
            "https://chat.example.org"
        );
        assert_eq!(
            preflight
                .headers()
                .get("access-control-allow-credentials")
                .unwrap(),
            "true"
        );

        let foreign = app
            .oneshot(
                Request::builder()
                    .uri("/api/stats")
                    .header("origin", "https://elsewhere.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(foreign
            .headers()
            .get("access-control-allow-origin")
            .is_none());
    }

    #[tokio::test]
    async fn test_api_rate_limited_per_address() {
        let server = create_server_with_http(HttpSettings {
            api_rate_limit: 2,
            api_rate_window_seconds: 900,
            ..HttpSettings::default()
        });
        let app = server.create_router();
        let noisy = [10, 0, 0, 1];

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(request_from("/api/stats", noisy))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let limited = app
            .clone()
            .oneshot(request_from("/api/health", noisy))
            .await
            .unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.headers().get("retry-after").is_some());

        // Liveness routes and other callers are unaffected
        let alive = app
            .clone()
            .oneshot(request_from("/alive", noisy))
            .await
            .unwrap();
        assert_eq!(alive.status(), StatusCode::OK);

        let other = app
            .oneshot(request_from("/api/stats", [10, 0, 0, 2]))
            .await
            .unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_own_country_uses_peer_address() {
        let (server, _, _) = create_test_server();
        let app = server.create_router();

        let response = app
            .clone()
            .oneshot(request_from("/api/country", [127, 0, 0, 1]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "US");

        // A forwarding proxy's header wins over the peer
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/country")
                    .header("x-forwarded-for", "203.0.113.9")
                    .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "XX");
    }
}
