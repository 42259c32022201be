//! Axum server setup
//!
//! - CORS from configured origins (any origin when none are listed)
//! - Request tracing and a whole-request timeout
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::http::HeaderValue;
use axum::Router;
use sqlx::SqlitePool;
use text2sql_core::{AppConfig, ConfigError};
use tokio::net::TcpListener;
use tower::timeout::error::Elapsed;
use tower::{BoxError, ServiceBuilder};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::routes;
use crate::llm::SqlGenerator;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8000)
    pub bind_addr: SocketAddr,

    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,

    /// Upper bound on handling one request
    pub request_timeout: Duration,

    /// Connect timeout for user databases
    pub remote_timeout: Duration,

    /// How long a login session stays valid
    pub session_ttl: chrono::Duration,
}

/// Longest accepted `server.session_ttl_hours` (ten years)
const MAX_SESSION_TTL_HOURS: u64 = 24 * 365 * 10;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            cors_origins: Vec::new(),
            request_timeout: Duration::from_secs(60),
            remote_timeout: Duration::from_secs(10),
            session_ttl: chrono::Duration::days(7),
        }
    }
}

impl ServerConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let ttl_hours = config.server.session_ttl_hours;
        if ttl_hours == 0 || ttl_hours > MAX_SESSION_TTL_HOURS {
            return Err(ConfigError::InvalidValue {
                key: "server.session_ttl_hours",
                reason: format!("must be between 1 and {}", MAX_SESSION_TTL_HOURS),
            });
        }

        Ok(Self {
            bind_addr: config.bind_addr()?,
            cors_origins: config.server.cors_origins.clone(),
            request_timeout: Duration::from_secs(config.server.request_timeout_secs),
            remote_timeout: Duration::from_secs(config.remote.connect_timeout_secs),
            session_ttl: chrono::Duration::hours(ttl_hours as i64),
        })
    }
}

/// Shared application state
pub struct AppState {
    /// Metadata store
    pub pool: SqlitePool,
    /// `None` when no language model is configured
    pub generator: Option<Arc<dyn SqlGenerator>>,
    pub remote_timeout: Duration,
    pub session_ttl: chrono::Duration,
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        tracing::debug!("CORS: any origin allowed");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(allowed)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Bound request handling time; overruns answer with the JSON error body.
fn with_request_timeout<S>(router: Router<S>, timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let seconds = timeout.as_secs();
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                if err.is::<Elapsed>() {
                    ApiError::RequestTimeout { seconds }
                } else {
                    ApiError::Internal {
                        message: err.to_string(),
                    }
                }
            }))
            .timeout(timeout),
    )
}

/// Assemble every route with its middleware.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let router = Router::new()
        .merge(routes::health::router())
        .merge(routes::databases::router())
        .merge(routes::query::router())
        .merge(routes::auth::router())
        .layer(cors_layer(&config.cors_origins));

    with_request_timeout(router, config.request_timeout)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Run the HTTP server until a shutdown signal arrives.
///
/// # Example
///
/// ```ignore
/// let pool = create_pool(&database_url).await?;
/// migrations::run(&pool).await?;
/// run_server(pool, None, ServerConfig::default()).await?;
/// ```
pub async fn run_server(
    pool: SqlitePool,
    generator: Option<Arc<dyn SqlGenerator>>,
    config: ServerConfig,
) -> Result<(), ServerError> {
    if generator.is_none() {
        tracing::warn!("no language model configured; generate_sql will return 503");
    }

    let state = AppState {
        pool,
        generator,
        remote_timeout: config.remote_timeout,
        session_ttl: config.session_ttl,
    };
    let app = build_router(state, &config);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
