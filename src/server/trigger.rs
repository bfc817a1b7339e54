//! Manual scan trigger endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{info, warn};

use super::AppState;
use crate::scan::{TriggerError, TriggerOutcome, TriggerReason};

/// Body of a successful `POST /scan`.
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub outcome: &'static str,
}

impl IntoResponse for TriggerError {
    fn into_response(self) -> Response {
        match self {
            TriggerError::Closed => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()).into_response(),
        }
    }
}

/// Requests a scan cycle.
///
/// # Response
///
/// - 202 Accepted with `{"outcome": "queued"}` if a new cycle was queued
/// - 202 Accepted with `{"outcome": "coalesced"}` if one was already pending
/// - 503 Service Unavailable if the worker has stopped
pub async fn trigger_handler(
    State(app_state): State<AppState>,
) -> Result<(StatusCode, Json<TriggerResponse>), TriggerError> {
    let outcome = app_state
        .triggers()
        .request(TriggerReason::Http)
        .inspect_err(|e| warn!(error = %e, "Rejected scan request"))?;

    match outcome {
        TriggerOutcome::Queued => info!("Scan requested over HTTP"),
        TriggerOutcome::Coalesced => info!("Scan requested over HTTP, coalesced with pending trigger"),
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            outcome: outcome.as_str(),
        }),
    ))
}
