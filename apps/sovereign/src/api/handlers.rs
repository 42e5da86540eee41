//! # API Endpoint Handlers
//!
//! Each handler returns a structured body; none of them can take the
//! server down.

use super::{
    AppState,
    types::{ContactResponse, CountResponse, HealthResponse},
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::Value;
use sovereign_core::{ContactPayload, Counter, Intake, SovereignError};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATS HANDLER
// =============================================================================

/// Current member count. Always 200: storage failures degrade to the
/// fallback count.
pub async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    let counter = Counter::new(state.store.as_ref(), state.policy.as_ref());
    let count = counter.read_or_fallback(Utc::now(), |e| {
        tracing::warn!(
            event = "count_fallback",
            error = %e,
            "Count read failed, serving fallback"
        );
    });

    (StatusCode::OK, Json(CountResponse::count(count)))
}

// =============================================================================
// INCREMENT HANDLER
// =============================================================================

/// Add one real member.
pub async fn increment_handler(State(state): State<AppState>) -> impl IntoResponse {
    let counter = Counter::new(state.store.as_ref(), state.policy.as_ref());
    match counter.increment() {
        Ok(count) => {
            tracing::info!(count, "Count incremented");
            (StatusCode::OK, Json(CountResponse::count(count)))
        }
        Err(e) => {
            tracing::error!(error = %e, "Increment failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CountResponse::error(e.to_string())),
            )
        }
    }
}

// =============================================================================
// CONTACT HANDLER
// =============================================================================

/// Store an applicant submission.
///
/// The body is taken as raw JSON so that both field conventions, and any
/// extra fields, reach the core untouched. Bodies that are not JSON at all
/// keep the extractor's status but get the contact error shape.
pub async fn contact_handler(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Contact body rejected");
            return (
                rejection.status(),
                Json(ContactResponse::error(rejection.body_text())),
            );
        }
    };
    let contact = match ContactPayload::from_value(body).and_then(ContactPayload::normalize) {
        Ok(c) => c,
        Err(e) => return contact_error(e),
    };
    let convention = contact.convention;

    match Intake::new(state.store.as_ref()).submit(contact, Utc::now()) {
        Ok(receipt) => {
            tracing::info!(id = %receipt.id, ?convention, "Contact stored");
            (
                StatusCode::OK,
                Json(ContactResponse::success(receipt.id.to_string())),
            )
        }
        Err(e) => contact_error(e),
    }
}

/// Map a core error to the contact response.
fn contact_error(e: SovereignError) -> (StatusCode, Json<ContactResponse>) {
    if e.is_validation() {
        tracing::debug!(error = %e, "Contact rejected");
        (StatusCode::BAD_REQUEST, Json(ContactResponse::error(e.to_string())))
    } else {
        tracing::error!(error = %e, "Contact storage failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ContactResponse::error(e.to_string())),
        )
    }
}
