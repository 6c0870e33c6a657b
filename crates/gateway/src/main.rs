//! citenet API Gateway
//!
//! HTTP front end for the citation network engine.
//! Handles:
//! - Session routes (create, inspect, switch, close)
//! - Rate limiting
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use citenet_common::{config::AppConfig, metrics, store};
use citenet_engine::{create_connector, ExplorerService};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub explorer: Arc<ExplorerService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config);

    info!(
        service = %config.observability.service_name,
        provider = ?config.provider.kind,
        "Starting citenet gateway v{}",
        citenet_common::VERSION
    );

    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.observability.metrics_port))
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(port = config.observability.metrics_port, "Metrics exporter listening");
    }

    let connector = create_connector(&config.provider)?;
    let store = store::create_store(&config.persistence).await?;
    let explorer = Arc::new(ExplorerService::new(connector, &config, store));
    match explorer.restore().await {
        Ok(count) if count > 0 => info!(sessions = count, "Restored sessions from snapshot"),
        Ok(_) => {}
        Err(e) => error!(error = %e, "Ignoring unreadable session snapshot"),
    }

    let config = Arc::new(config);
    let state = AppState {
        config: config.clone(),
        explorer: explorer.clone(),
    };
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Flush the latest session state before exiting
    if tokio::time::timeout(config.shutdown_timeout(), explorer.persist())
        .await
        .is_err()
    {
        error!("Timed out writing final session snapshot");
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.observability.json_logging {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route(
            "/sessions",
            get(handlers::sessions::list_sessions).post(handlers::sessions::create_session),
        )
        .route("/sessions/import", post(handlers::sessions::import_session))
        .route(
            "/sessions/{index}",
            get(handlers::sessions::get_session).delete(handlers::sessions::close_session),
        )
        .route("/sessions/{index}/activate", post(handlers::sessions::activate_session))
        .route(
            "/sessions/{index}/suggestion-limits",
            put(handlers::sessions::set_suggestion_limits),
        )
        .route("/sessions/{index}/authors", get(handlers::sessions::get_authors))
        .route("/sessions/{index}/completeness", get(handlers::sessions::get_completeness));

    let mut router = Router::new()
        .nest("/v1", api_routes)
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id);

    if state.config.rate_limit.enabled {
        let limits = middleware::rate_limit::RateLimitState::new(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        router = router.layer(axum::middleware::from_fn_with_state(
            limits,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    router.with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use citenet_common::{Article, ArticleId, Author, ProviderKind};
    use citenet_engine::MockConnector;
    use serde_json::Value;
    use tower::ServiceExt;

    fn article(id: &str, refs: &[&str]) -> Article {
        let mut a = Article::new(ArticleId::new(id));
        a.title = Some(format!("Paper {id}"));
        a.year = Some(2021);
        a.authors = vec![Author::new(Some("Grace"), "Hopper")];
        a.references = refs.iter().map(|r| Some(ArticleId::new(r))).collect();
        a
    }

    fn app() -> (Router, Arc<ExplorerService>) {
        let articles = vec![
            article("10.1234/seed", &["10.1234/a", "10.1234/b"]),
            article("10.1234/a", &["10.1234/x"]),
            article("10.1234/b", &["10.1234/x"]),
            article("10.1234/x", &[]),
        ];
        let connector = Arc::new(MockConnector::with_articles(ProviderKind::Crossref, &articles));
        let config = AppConfig::default();
        let explorer = Arc::new(ExplorerService::new(connector, &config, None));
        let state = AppState {
            config: Arc::new(config),
            explorer: explorer.clone(),
        };
        (create_router(state), explorer)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_session_lifecycle_over_http() {
        let (app, explorer) = app();

        let (status, body) = send(&app, "POST", "/v1/sessions", Some(serde_json::json!({"id": "10.1234/seed"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["index"], 0);

        // let the background suggestion stage finish
        while explorer.view(0).await.unwrap().loading.any() {
            tokio::task::yield_now().await;
        }

        let (status, body) = send(&app, "GET", "/v1/sessions/0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["incomingSuggestions"][0]["id"], "10.1234/X");

        let (status, _) = send(&app, "GET", "/v1/sessions/0/completeness", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "DELETE", "/v1/sessions/0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["activeIndex"], Value::Null);

        let (status, body) = send(&app, "GET", "/v1/sessions/0", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected() {
        let (app, _) = app();

        let (status, _) = send(&app, "POST", "/v1/sessions", Some(serde_json::json!({"id": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "POST", "/v1/sessions", Some(serde_json::json!({"id": "not an id"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_IDENTIFIER");

        let (status, _) = send(&app, "POST", "/v1/sessions/import", Some(serde_json::json!({"identifiers": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
