use std::fmt;

use serde::{Deserialize, Serialize};

/// Partial data decoded from one source for one key.
///
/// Unknown fields in the payload are ignored; `score` is required and must
/// be an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub score: i64,
}

impl RawRecord {
    #[must_use]
    pub const fn new(score: i64) -> Self {
        Self { score }
    }
}

/// Value derived from all of a key's records.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombinedResult(f64);

impl CombinedResult {
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for CombinedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
