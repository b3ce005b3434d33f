//! Batch orchestration for Tally.
//!
//! [`BatchAggregator`] takes a list of keys and, for each one, fetches a
//! record from every configured source, then combines the records into one
//! [`CombinedResult`]. Keys run as independent tokio tasks and the sources of
//! a key are fetched concurrently, so a batch takes roughly as long as its
//! slowest key rather than the sum of all fetches.
//!
//! ```text
//! keys ──► spawn per key ──► join_all(sources) ──► decode ──► combine
//!                 │                                               │
//!                 └──────────── BatchReport { results, failures } ◄┘
//! ```
//!
//! [`aggregate`](BatchAggregator::aggregate) always returns a full report;
//! [`try_aggregate`](BatchAggregator::try_aggregate) stops at the first
//! failure.

mod aggregator;
mod process;

pub use aggregator::BatchAggregator;
pub use tally_config::{self, TallyConfig};
pub use tally_sources::{self, PayloadSource, ScoreFetcher, Source};
pub use tally_types::{
    self, BatchReport, CombinedResult, ErrorCode, Failure, FailureSet, Key, KeyState, ResultSet,
    ScoreError,
};
pub use tokio_util::sync::CancellationToken;
