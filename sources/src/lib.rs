//! Per-source record retrieval for Tally.
//!
//! # Pipeline
//!
//! Each `(key, source)` pair goes through:
//!
//! 1. **Endpoint resolution** - [`resolve_endpoint`] renders the source's URL
//!    template for the key (`InvalidEndpoint` on failure)
//! 2. **Retrieval** - one HTTP GET with a capped body read (`Transport` on
//!    network failure or non-2xx status)
//! 3. **Decode** - [`decode_record`] turns the payload into a
//!    [`RawRecord`](tally_types::RawRecord) (`Decoding` on shape mismatch)
//!
//! Steps 2 and 3 are exposed separately so callers can start every source's
//! retrieval before decoding any of them.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`endpoint`] | [`Source`] and URL template rendering |
//! | [`fetcher`] | [`ScoreFetcher`], the HTTP implementation of [`PayloadSource`] |
//! | `decode` | JSON payload to record |
//! | `client` | Shared `reqwest` client construction |

mod client;
mod decode;
pub mod endpoint;
pub mod fetcher;

use std::future::Future;

use tally_types::{Key, ScoreError};

pub use client::{DEFAULT_USER_AGENT, build_client};
pub use decode::decode_record;
pub use endpoint::{Source, resolve_endpoint};
pub use fetcher::ScoreFetcher;

pub use tally_types;

/// Anything that can produce the raw payload for a `(key, source)` pair.
///
/// The aggregator is generic over this seam; [`ScoreFetcher`] is the HTTP
/// implementation.
pub trait PayloadSource: Send + Sync + 'static {
    fn fetch_payload(
        &self,
        key: &Key,
        source: &Source,
    ) -> impl Future<Output = Result<Vec<u8>, ScoreError>> + Send;
}

impl PayloadSource for ScoreFetcher {
    fn fetch_payload(
        &self,
        key: &Key,
        source: &Source,
    ) -> impl Future<Output = Result<Vec<u8>, ScoreError>> + Send {
        ScoreFetcher::fetch_payload(self, key, source)
    }
}
