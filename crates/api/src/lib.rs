//! Air Quality Lab API Server
//!
//! Records air-quality readings by zip code and serves their average.

use axum::{
    handler::HandlerWithoutStateExt,
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use reading_validator::ReadingValidator;
use std::future::Future;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_governor::GovernorLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, subscriber::SetGlobalDefaultError, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod average;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod routes;

pub use crate::config::{LogFormat, LoggingConfig, Settings};
pub use crate::error::ApiError;

use storage::Repository;

/// Application state shared across handlers
pub struct AppState {
    /// Storage repository
    pub repository: Repository,
    /// Input validation rules
    pub validator: ReadingValidator,
    /// Prometheus handle, when the recorder is installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(repository: Repository, validator: ReadingValidator) -> Self {
        Self {
            repository,
            validator,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }

    /// Expose `handle` on /metrics
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>, settings: &Settings) -> Result<Router, ApiError> {
    let mut lab = Router::new()
        .route("/lab/status", get(routes::lab::get_status))
        .route("/lab/register", post(routes::lab::register));

    if settings.rate_limit.enabled {
        let config = rate_limit::create_governor_config(&settings.rate_limit)?;
        lab = lab.layer(GovernorLayer { config });
    }

    let router = Router::new()
        .route("/health", get(routes::health::get_health))
        .route("/metrics", get(routes::health::get_metrics))
        .merge(lab);

    let router = match &settings.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir).not_found_service(not_found.into_service())),
        None => router.fallback(not_found),
    };

    Ok(router
        .layer(cors_layer())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state))
}

/// Browsers may call the API from any origin. Credentials are not allowed
/// together with a wildcard origin, so they are not advertised.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([HeaderName::from_static("x-requested-with"), header::CONTENT_TYPE])
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Initialize logging.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), SetGlobalDefaultError> {
    let level = Level::from_str(&config.level).unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);

    match config.format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }

    if Level::from_str(&config.level).is_err() {
        warn!("Unknown log level {:?}, using info", config.level);
    }
    Ok(())
}

/// Serve `app` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
}

/// Run the server
pub async fn run_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let repository = Repository::connect(&settings.database_url).await?;

    let mut state = AppState::new(repository.clone(), ReadingValidator::new(settings.validation.clone()));
    if settings.metrics_enabled {
        state = state.with_metrics(PrometheusBuilder::new().install_recorder()?);
    }

    let app = create_router(Arc::new(state), &settings)?;

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    info!("Starting API server on {}", listener.local_addr()?);

    serve(listener, app, shutdown_signal()).await?;

    repository.close().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
