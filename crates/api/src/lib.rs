//! Drowsiness Monitor API Server
//!
//! WebSocket frame streaming plus health and metrics endpoints. Every
//! stream connection owns an independent drowsiness session; models and
//! the alert dispatcher are shared.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use alerting::AlertDispatcher;
use dms::{DmsError, SharedModels};

mod routes;
pub mod settings;

pub use routes::stream::StreamEvent;
pub use settings::{ServerConfig, Settings};

/// Application state shared across handlers
pub struct AppState {
    pub settings: Settings,
    /// Read-only models shared by every session
    pub models: SharedModels,
    /// Serialized alert playback
    pub dispatcher: Arc<AlertDispatcher>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
    /// Currently connected streams
    pub active_sessions: AtomicUsize,
    /// Prometheus handle, when the recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Load models and build the dispatcher from settings
    pub fn new(settings: Settings) -> Result<Self, DmsError> {
        let models = SharedModels::load(&settings.dms)?;
        let dispatcher = Arc::new(AlertDispatcher::from_config(settings.alert.clone()));
        Ok(Self::from_parts(settings, models, dispatcher))
    }

    /// Assemble state from already-built parts
    pub fn from_parts(settings: Settings, models: SharedModels, dispatcher: Arc<AlertDispatcher>) -> Self {
        Self {
            settings,
            models,
            dispatcher,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            active_sessions: AtomicUsize::new(0),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::get_health))
        .route("/api/v1/stream", get(routes::stream::stream_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Prometheus exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// Initialize logging (`RUST_LOG` filter, default `info`)
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the server until it fails
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let addr = settings.server.bind_addr.clone();
    let mut state = AppState::new(settings)?;

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => warn!("Metrics recorder not installed: {}", e),
    }

    let app = create_router(Arc::new(state));

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
