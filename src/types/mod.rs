//! Core domain types for the full scan worker.

pub mod ids;
pub mod record;

pub use ids::{CursorName, RecordId};
pub use record::Record;
