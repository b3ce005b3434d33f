//! One key's unit of work: fetch every source, decode, combine.

use futures_util::future::join_all;
use tally_sources::{PayloadSource, Source, decode_record};
use tally_types::{CombinedResult, Key, KeyState, RawRecord, ScoreError, combine};
use tokio_util::sync::CancellationToken;

struct KeyProgress<'a> {
    key: &'a Key,
    state: KeyState,
}

impl<'a> KeyProgress<'a> {
    fn new(key: &'a Key) -> Self {
        Self {
            key,
            state: KeyState::Pending,
        }
    }

    fn advance(&mut self, next: KeyState) {
        debug_assert!(!self.state.is_terminal(), "key already terminal");
        tracing::trace!(key = %self.key, from = %self.state, to = %next, "Key state");
        self.state = next;
    }
}

/// Run one key to a terminal state.
///
/// Cancellation is checked once, before any fetch starts; fetches already in
/// flight are not interrupted.
pub(crate) async fn process_key<P: PayloadSource>(
    fetcher: &P,
    sources: &[Source],
    key: &Key,
    cancel: &CancellationToken,
) -> Result<CombinedResult, ScoreError> {
    let mut progress = KeyProgress::new(key);
    let outcome = fetch_and_combine(fetcher, sources, key, cancel, &mut progress).await;

    match &outcome {
        Ok(value) => {
            progress.advance(KeyState::Succeeded);
            tracing::debug!(%key, %value, "Key succeeded");
        }
        Err(error) => {
            progress.advance(KeyState::Failed);
            tracing::debug!(%key, code = %error.code, %error, "Key failed");
        }
    }

    outcome
}

async fn fetch_and_combine<P: PayloadSource>(
    fetcher: &P,
    sources: &[Source],
    key: &Key,
    cancel: &CancellationToken,
    progress: &mut KeyProgress<'_>,
) -> Result<CombinedResult, ScoreError> {
    if cancel.is_cancelled() {
        return Err(ScoreError::cancelled().with_detail("key", key.to_string()));
    }

    progress.advance(KeyState::FetchingSources);

    // Every fetch is created up front and polled together.
    let payloads = join_all(
        sources
            .iter()
            .map(|source| fetcher.fetch_payload(key, source)),
    )
    .await;

    let payloads = sources
        .iter()
        .zip(payloads)
        .map(|(source, payload)| payload.map_err(|e| tag(e, source, key)))
        .collect::<Result<Vec<_>, _>>()?;

    progress.advance(KeyState::Combining);

    let decoded: Vec<Result<RawRecord, ScoreError>> = sources
        .iter()
        .zip(&payloads)
        .map(|(source, payload)| decode_record(payload).map_err(|e| tag(e, source, key)))
        .collect();
    for error in decoded.iter().filter_map(|record| record.as_ref().err()) {
        tracing::debug!(
            %key,
            source = error.detail("source").unwrap_or_default(),
            %error,
            "Record failed to decode"
        );
    }
    let records = decoded.into_iter().collect::<Result<Vec<_>, _>>()?;

    combine(&records).map_err(|e| e.with_detail("key", key.to_string()))
}

/// Attach `source` and `key` details unless the fetcher already did.
fn tag(error: ScoreError, source: &Source, key: &Key) -> ScoreError {
    let error = if error.detail("source").is_none() {
        error.with_detail("source", source.name().as_str())
    } else {
        error
    };
    if error.detail("key").is_none() {
        error.with_detail("key", key.to_string())
    } else {
        error
    }
}
