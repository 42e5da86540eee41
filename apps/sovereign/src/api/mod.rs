//! # Sovereign HTTP API Module
//!
//! The HTTP surface of the intake service, using axum.
//!
//! ## Endpoints
//!
//! - `GET /sovereign/stats` - Current member count (never fails)
//! - `POST /sovereign/increment` - Add one real member
//! - `POST /sovereign/contact` - Store an applicant submission
//! - `GET /health` - Health check
//!
//! Every route can be mounted under a prefix (`route_prefix` in the
//! configuration, `SOVEREIGN_ROUTE_PREFIX` in the environment).

mod auth;
mod handlers;
mod middleware;
mod types;

// Re-export handlers and types for integration tests (via `sovereign::api::*`)
pub use handlers::{contact_handler, health_handler, increment_handler, stats_handler};
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{ContactResponse, CountResponse, HealthResponse};

use crate::AppError;
use crate::config::ApiSettings;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, StatusCode, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use sovereign_core::{CounterPolicy, KvStore};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// How long browsers may cache a preflight answer.
const CORS_MAX_AGE: Duration = Duration::from_secs(600);

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the store and the counter policy.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KvStore>,
    pub policy: Arc<CounterPolicy>,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, policy: CounterPolicy) -> Self {
        Self {
            store,
            policy: Arc::new(policy),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer.
///
/// An empty list or a `*` entry allows every origin. Otherwise only the
/// listed origins are allowed; unparsable entries are skipped with a warning.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([header::CONTENT_LENGTH])
        .max_age(CORS_MAX_AGE);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        tracing::info!("CORS: Allowing all origins");
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(hv) => {
                tracing::info!("CORS: Allowing origin: {}", origin);
                Some(hv)
            }
            Err(e) => {
                tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        tracing::warn!("CORS: No valid origins configured, allowing all origins");
        base.allow_origin(Any)
    } else {
        base.allow_origin(allowed)
    }
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Turn a configured prefix into a nest path: leading slash, no trailing
/// slash. `None` when the routes sit at the root.
fn normalize_prefix(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{}", trimmed))
    }
}

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Timeout - 408 once the request deadline passes
/// 4. Body limit
/// 5. Rate Limiting - if enabled
/// 6. Authentication - bearer key on `/sovereign/*`, if configured
///
/// The timeout covers the wait for the request body and every await point
/// before the handler reaches the store. Store calls are synchronous, so a
/// handler already inside one runs to completion past the deadline.
pub fn create_router(state: AppState, settings: &ApiSettings) -> Router {
    let mut sovereign = Router::new()
        .route("/sovereign/stats", get(handlers::stats_handler))
        .route("/sovereign/increment", post(handlers::increment_handler))
        .route("/sovereign/contact", post(handlers::contact_handler));

    match settings.api_key.as_deref() {
        Some(key) => {
            tracing::info!("API key authentication enabled");
            sovereign = sovereign.layer(axum_middleware::from_fn_with_state(
                Arc::<str>::from(key),
                auth::api_key_auth_middleware,
            ));
        }
        None => tracing::info!("API key authentication disabled"),
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(sovereign);

    match create_rate_limiter(settings.rate_limit) {
        Some(limiter) => {
            tracing::info!("Rate limiting enabled: {} requests/second", settings.rate_limit);
            router = router.layer(axum_middleware::from_fn_with_state(
                limiter,
                middleware::rate_limit_middleware,
            ));
        }
        None => tracing::info!("Rate limiting disabled"),
    }

    if let Some(prefix) = normalize_prefix(&settings.route_prefix) {
        tracing::info!("Routes mounted under {}", prefix);
        router = Router::new().nest(&prefix, router);
    }

    let timeout =
        TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, settings.request_timeout);

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(&settings.cors_origins))
                .layer(timeout)
                .layer(DefaultBodyLimit::max(settings.body_limit_bytes)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Resolve on Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Start the HTTP server and run until Ctrl+C.
pub async fn run_server(
    addr: &str,
    state: AppState,
    settings: &ApiSettings,
) -> Result<(), AppError> {
    let router = create_router(state, settings);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Sovereign HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Io(format!("Server error: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix(""), None);
        assert_eq!(normalize_prefix("/"), None);
        assert_eq!(normalize_prefix("  "), None);
        assert_eq!(normalize_prefix("fn"), Some("/fn".to_string()));
        assert_eq!(normalize_prefix("/fn/"), Some("/fn".to_string()));
        assert_eq!(
            normalize_prefix("/functions/v1/make-server"),
            Some("/functions/v1/make-server".to_string())
        );
    }
}
