//! SourceFinder API Gateway
//!
//! The HTTP entry point for the web front end.
//! Handles:
//! - Search requests (runs the extraction pipeline synchronously)
//! - Search history
//! - Rate limiting, timeouts and concurrency limits
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use sourcefinder_common::{
    config::AppConfig,
    db::{DbPool, Repository, SearchStore},
    errors::AppError,
    llm::create_llm_client,
    metrics,
    pipeline::SearchPipeline,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn SearchStore>,
    /// `None` when no API key is configured
    pub pipeline: Option<Arc<SearchPipeline>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize tracing
    init_tracing(&config);

    info!("Starting SourceFinder API Gateway v{}", sourcefinder_common::VERSION);

    let config = Arc::new(config);

    if config.request_timeout().as_secs() > config.server.request_timeout_secs {
        warn!(
            configured_secs = config.server.request_timeout_secs,
            effective_secs = config.request_timeout().as_secs(),
            "Request timeout raised to cover the pipeline budget"
        );
    }

    // Initialize metrics
    if config.observability.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                metrics::LATENCY_BUCKETS,
            )?
            .install()?;
        info!(%addr, "Prometheus exporter listening");
    }
    metrics::register_metrics();

    // Initialize database connection
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.migrate().await?;
    }
    let store: Arc<dyn SearchStore> = Arc::new(Repository::new(db));

    // The server still starts without a key; searches answer 500 until one is set
    let pipeline = match create_llm_client(&config.llm) {
        Ok(llm) => {
            info!(model = llm.model_name(), "Generative-text client ready");
            Some(Arc::new(SearchPipeline::from_config(&config, llm, store.clone())?))
        }
        Err(AppError::Configuration { message }) => {
            warn!(%message, "Search pipeline disabled");
            None
        }
        Err(e) => return Err(e.into()),
    };

    // Create app state
    let state = AppState {
        config: config.clone(),
        store,
        pipeline,
    };

    // Build the router
    let app = create_router(state)?;

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown_timeout = config.shutdown_timeout();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // In-flight searches may run for minutes; bound the drain
            tokio::spawn(async move {
                tokio::time::sleep(shutdown_timeout).await;
                warn!("Graceful shutdown timed out, exiting");
                std::process::exit(1);
            });
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> sourcefinder_common::Result<Router> {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        // Search endpoints
        .route("/pesquisa", post(handlers::pesquisa::create_pesquisa))
        .route("/pesquisa/", post(handlers::pesquisa::create_pesquisa))
        .route("/pesquisa/{id}", get(handlers::pesquisa::get_pesquisa))
        .route("/pesquisa/{id}/", get(handlers::pesquisa::get_pesquisa))

        // History endpoints
        .route("/historico", get(handlers::historico::list_historico))
        .route("/historico/", get(handlers::historico::list_historico));

    let api_routes = if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        )?;
        api_routes.layer(from_fn_with_state(limiter, middleware::rate_limit::rate_limit_middleware))
    } else {
        api_routes
    };

    let request_timeout = state.config.request_timeout();
    let max_concurrent = state.config.server.max_concurrent_requests.max(1);

    // Compose the app
    Ok(Router::new()
        // Health endpoints (not rate limited)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .merge(api_routes)
        .layer(from_fn(middleware::metrics::track_metrics))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(ConcurrencyLimitLayer::new(max_concurrent))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
