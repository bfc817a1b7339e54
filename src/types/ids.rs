//! Newtype wrappers for domain identifiers.
//!
//! Keeping source ids and cursor names in distinct types stops a cursor value
//! from being passed where a record id is expected (and vice versa).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A record id assigned by the external source.
///
/// Ids are unique and strictly increasing in the order the source creates
/// records, which is what makes a single integer watermark sufficient to
/// resume a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// The id below every real record; an unset cursor starts here.
    pub const MIN: RecordId = RecordId(0);

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(n: u64) -> Self {
        RecordId(n)
    }
}

/// The name of a durable cursor, one per scan type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CursorName(pub String);

impl CursorName {
    /// Cursor used by the full user scan.
    pub const FULL_SCAN_USER_ID: &'static str = "full_scan_user_id";

    pub fn new(s: impl Into<String>) -> Self {
        CursorName(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CursorName {
    fn default() -> Self {
        CursorName::new(Self::FULL_SCAN_USER_ID)
    }
}

impl fmt::Display for CursorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CursorName {
    fn from(s: &str) -> Self {
        CursorName(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod record_id {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn ordering_matches_underlying(a: u64, b: u64) {
                prop_assert_eq!(RecordId(a).cmp(&RecordId(b)), a.cmp(&b));
            }

            #[test]
            fn serializes_as_bare_integer(n: u64) {
                let json = serde_json::to_string(&RecordId(n)).unwrap();
                prop_assert_eq!(json, n.to_string());
            }
        }

        #[test]
        fn min_is_zero() {
            assert_eq!(RecordId::MIN.get(), 0);
            assert!(RecordId::MIN < RecordId(1));
        }
    }

    mod cursor_name {
        use super::*;

        #[test]
        fn default_is_full_scan_user_id() {
            assert_eq!(CursorName::default().as_str(), "full_scan_user_id");
        }

        #[test]
        fn serializes_as_bare_string() {
            let json = serde_json::to_string(&CursorName::new("x")).unwrap();
            assert_eq!(json, "\"x\"");
        }
    }
}
