//! Core domain types for Tally.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies:
//! keys and source names, decoded records, the combiner, batch reports and
//! the structured error every layer reports through.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod combine;
mod error;
mod ids;
mod record;
mod report;

pub use combine::{NORMALIZATION, combine};
pub use error::{ErrorCode, ErrorDetails, ScoreError};
pub use ids::{EmptySourceNameError, Key, SourceName};
pub use record::{CombinedResult, RawRecord};
pub use report::{BatchReport, Failure, FailureSet, KeyState, ResultSet};
