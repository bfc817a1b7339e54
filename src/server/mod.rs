//! HTTP control surface for the scan worker.
//!
//! The server never runs scans itself. It only talks to the worker through
//! the trigger queue and reads the persisted cursor.
//!
//! # Endpoints
//!
//! - `POST /scan` - Requests a scan cycle (returns 202 Accepted)
//! - `GET /api/v1/cursors/{name}` - Returns a persisted cursor as JSON
//! - `GET /health` - Returns 200 while the worker accepts triggers

use std::sync::Arc;

use crate::persistence::CursorStore;
use crate::scan::TriggerHandle;

pub mod cursor;
pub mod health;
pub mod trigger;

pub use cursor::cursor_handler;
pub use health::health_handler;
pub use trigger::trigger_handler;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Producer side of the worker's trigger queue.
    triggers: TriggerHandle,

    /// Store the worker checkpoints into. Read-only from here.
    cursors: Arc<dyn CursorStore>,
}

impl AppState {
    pub fn new(triggers: TriggerHandle, cursors: Arc<dyn CursorStore>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner { triggers, cursors }),
        }
    }

    pub fn triggers(&self) -> &TriggerHandle {
        &self.inner.triggers
    }

    pub fn cursors(&self) -> &dyn CursorStore {
        self.inner.cursors.as_ref()
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/scan", post(trigger_handler))
        .route("/api/v1/cursors/{name}", get(cursor_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
