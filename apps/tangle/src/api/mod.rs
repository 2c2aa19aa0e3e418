//! # Tangle HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `POST /nodes` - Admit a record with no parents
//! - `POST /nodes/approve` - Admit a record approving existing records
//! - `GET /nodes` - List all records
//! - `GET /nodes/tips` - List current tips
//! - `GET /nodes/highest-weight` - Record with the most direct approvals
//! - `GET /nodes/highest-cumulative-weight` - Record with the highest cumulative weight
//! - `GET /nodes/tip-selection` - MCMC tip selection (`?alpha=&max_steps=`)
//! - `GET /nodes/{id}` - Fetch one record
//! - `GET /sync/validate` - Cumulative weight consistency report
//! - `POST /checkpoints` - Create a checkpoint
//! - `GET /checkpoints/latest` - Most recent checkpoint
//! - `GET /status` - Graph status
//! - `GET /health` - Health check
//!
//! ## Security Configuration
//!
//! Taken from [`SecurityConfig`], which the `TANGLE_API_KEY`,
//! `TANGLE_RATE_LIMIT` and `TANGLE_CORS_ORIGINS` environment variables
//! override.

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{ApiKey, keys_match};
pub use handlers::error_status;
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{
    AddNodeRequest, ApproveRequest, CheckpointRequest, CheckpointResponse, HealthResponse,
    InconsistencyJson, NodeJson, NodeListResponse, NodeResponse, StatusResponse,
    TipSelectionQuery, TipsResponse, ValidationResponse,
};

use crate::config::SecurityConfig;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tangle_core::{StorageBackend, Tangle, TangleError, WalkParams};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Maximum accepted request body.
const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the engine.
#[derive(Clone)]
pub struct AppState {
    /// The engine behind a single reader/writer lock.
    pub tangle: Arc<RwLock<Tangle<StorageBackend>>>,
    /// Walk parameters used when a tip-selection request leaves them out.
    pub walk: WalkParams,
}

impl AppState {
    /// Create new app state around an engine.
    #[must_use]
    pub fn new(tangle: Tangle<StorageBackend>) -> Self {
        Self {
            tangle: Arc::new(RwLock::new(tangle)),
            walk: WalkParams::default(),
        }
    }

    /// Override the default walk parameters.
    #[must_use]
    pub fn with_walk_defaults(mut self, walk: WalkParams) -> Self {
        self.walk = walk;
        self
    }

    /// Exclusive access for mutations and whole-graph computations.
    pub async fn exclusive(&self) -> RwLockWriteGuard<'_, Tangle<StorageBackend>> {
        self.tangle.write().await
    }

    /// Shared access for point lookups.
    pub async fn shared(&self) -> RwLockReadGuard<'_, Tangle<StorageBackend>> {
        self.tangle.read().await
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from the configured origins.
///
/// - `["*"]`: allows all origins
/// - `None`: localhost only
/// - Otherwise: the listed origins; invalid entries are skipped
fn build_cors_layer(origins: Option<&[String]>) -> CorsLayer {
    match origins {
        Some([only]) if only == "*" => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting - protects against DoS (if enabled)
/// 5. Authentication - validates API key (if configured)
pub fn create_router(state: AppState, security: &SecurityConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route(
            "/nodes",
            get(handlers::list_nodes_handler).post(handlers::add_node_handler),
        )
        .route("/nodes/approve", post(handlers::approve_node_handler))
        .route("/nodes/tips", get(handlers::tips_handler))
        .route("/nodes/highest-weight", get(handlers::highest_weight_handler))
        .route(
            "/nodes/highest-cumulative-weight",
            get(handlers::highest_cumulative_weight_handler),
        )
        .route("/nodes/tip-selection", get(handlers::tip_selection_handler))
        .route("/nodes/{id}", get(handlers::get_node_handler))
        .route("/sync/validate", get(handlers::validate_handler))
        .route("/checkpoints", post(handlers::create_checkpoint_handler))
        .route("/checkpoints/latest", get(handlers::latest_checkpoint_handler));

    // Authentication (innermost - runs last on request)
    match security.api_key() {
        Some(key) => {
            tracing::info!("API key authentication enabled");
            let key: ApiKey = Arc::from(key);
            router = router.layer(axum_middleware::from_fn_with_state(
                key,
                auth::api_key_auth_middleware,
            ));
        }
        None => {
            tracing::warn!(
                "API key authentication DISABLED - all endpoints are publicly accessible! \
                 Set TANGLE_API_KEY to enable authentication."
            );
        }
    }

    match create_rate_limiter(security.rate_limit) {
        Some(limiter) => {
            tracing::info!(
                "Rate limiting enabled: {} requests/second",
                security.rate_limit
            );
            router = router.layer(axum_middleware::from_fn_with_state(
                limiter,
                middleware::rate_limit_middleware,
            ));
        }
        None => tracing::info!("Rate limiting disabled"),
    }

    let outer = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(security.cors_origins.as_deref()))
        .layer(axum::extract::DefaultBodyLimit::max(BODY_LIMIT_BYTES));

    router.layer(outer).with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and run until Ctrl-C or SIGTERM.
pub async fn run_server(
    addr: &str,
    state: AppState,
    security: &SecurityConfig,
) -> Result<(), TangleError> {
    let router = create_router(state, security);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| TangleError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Tangle HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| TangleError::IoError(format!("Server error: {}", e)))?;

    tracing::info!("Tangle HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
