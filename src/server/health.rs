//! Health check endpoint for liveness probes.
//!
//! The server can outlive the scan worker (for example after the worker task
//! panics), so health reflects whether triggers still have somewhere to go.

use axum::extract::State;
use axum::http::StatusCode;

use super::AppState;

/// Health check handler.
///
/// Returns 200 `OK` while the worker is accepting triggers, and 503 once its
/// gate has been dropped.
pub async fn health_handler(State(app_state): State<AppState>) -> (StatusCode, &'static str) {
    if app_state.triggers().is_closed() {
        (StatusCode::SERVICE_UNAVAILABLE, "scan worker stopped")
    } else {
        (StatusCode::OK, "OK")
    }
}
