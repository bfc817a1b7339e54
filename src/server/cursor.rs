//! Cursor inspection endpoint for observability.
//!
//! Shows how far the scan has progressed without reading the state files.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use super::AppState;
use crate::persistence::PersistenceError;
use crate::types::CursorName;

/// Maximum accepted cursor name length.
const MAX_NAME_LEN: usize = 128;

/// Errors that can occur when reading a cursor.
#[derive(Debug, Error)]
pub enum CursorError {
    /// The name contains characters a cursor name never has.
    #[error("invalid cursor name: {0:?}")]
    InvalidName(String),

    /// Reading the cursor store failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl IntoResponse for CursorError {
    fn into_response(self) -> Response {
        let status = match &self {
            CursorError::InvalidName(_) => StatusCode::BAD_REQUEST,
            CursorError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Body of `GET /api/v1/cursors/{name}`.
#[derive(Debug, Serialize)]
pub struct CursorResponse {
    pub name: CursorName,
    pub value: u64,
}

/// Cursor names are ASCII identifiers: letters, digits, `_`, `-` and `.`.
fn validate_name(name: &str) -> Result<CursorName, CursorError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(CursorName::new(name))
    } else {
        Err(CursorError::InvalidName(name.to_string()))
    }
}

/// Cursor inspection handler.
///
/// # Response
///
/// - 200 OK with `{"name": .., "value": ..}`; an unset cursor reads as 0
/// - 400 Bad Request for a malformed name
/// - 500 Internal Server Error if the store can't be read
pub async fn cursor_handler(
    State(app_state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CursorResponse>, CursorError> {
    let name = validate_name(&name)?;
    let value = app_state.cursors().get_cursor(&name)?;
    Ok(Json(CursorResponse { name, value }))
}
