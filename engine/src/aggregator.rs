use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tally_config::TallyConfig;
use tally_sources::{PayloadSource, ScoreFetcher, Source};
use tally_types::{BatchReport, CombinedResult, Key, ResultSet, ScoreError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::process::process_key;

type KeyOutcome = (usize, Result<CombinedResult, ScoreError>);

/// Fans a batch of keys out to concurrent tasks and collects their outcomes.
///
/// Each key runs in its own tokio task; within a key every source is
/// fetched concurrently. A key's failure never affects another key.
pub struct BatchAggregator<P = ScoreFetcher> {
    fetcher: Arc<P>,
    sources: Arc<[Source]>,
    limiter: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
}

impl BatchAggregator<ScoreFetcher> {
    /// HTTP aggregator over the configured sources.
    pub fn from_config(config: &TallyConfig) -> Result<Self, ScoreError> {
        let fetcher = ScoreFetcher::new(&config.http)?;
        let sources = Source::from_configs(&config.sources)?;

        let aggregator = Self::new(fetcher, sources);
        Ok(match config.batch.max_concurrent_keys {
            Some(limit) => aggregator.with_max_concurrent_keys(limit),
            None => aggregator,
        })
    }
}

impl<P: PayloadSource> BatchAggregator<P> {
    pub fn new(fetcher: P, sources: impl Into<Arc<[Source]>>) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            sources: sources.into(),
            limiter: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Bound how many keys are processed at once. `0` removes the bound;
    /// values above `Semaphore::MAX_PERMITS` are clamped to it.
    #[must_use]
    pub fn with_max_concurrent_keys(mut self, limit: usize) -> Self {
        let limit = limit.min(Semaphore::MAX_PERMITS);
        self.limiter = (limit > 0).then(|| Arc::new(Semaphore::new(limit)));
        self
    }

    /// Keys that have not started when `token` is cancelled fail with
    /// `Cancelled`; keys already fetching run to completion.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    #[must_use]
    pub fn fetcher(&self) -> &P {
        &self.fetcher
    }

    /// Fetch and combine a single key.
    pub async fn process_one(&self, key: &Key) -> Result<CombinedResult, ScoreError> {
        let _permit = acquire(self.limiter.as_ref()).await?;
        process_key(self.fetcher.as_ref(), &self.sources, key, &self.cancel).await
    }

    /// Process every key concurrently and report each one's outcome.
    ///
    /// Never fails: per-key errors land in `failures`, ordered by first
    /// appearance in `keys`. Duplicate keys are processed independently; if
    /// any occurrence succeeds the key is reported as a success.
    pub async fn aggregate(&self, keys: &[Key]) -> BatchReport {
        let mut tasks = JoinSet::new();
        for (index, key) in keys.iter().enumerate() {
            self.spawn_key(&mut tasks, index, key.clone());
        }

        // Sole writer for the batch outcome.
        let mut outcomes: Vec<Option<Result<CombinedResult, ScoreError>>> = vec![None; keys.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => tracing::error!(error = %e, "Key task did not complete"),
            }
        }

        let mut report = BatchReport::new();
        for (key, outcome) in keys.iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|| {
                Err(ScoreError::internal("key task did not complete")
                    .with_detail("key", key.to_string()))
            });
            report.record(key.clone(), outcome);
        }

        tracing::info!(
            keys = keys.len(),
            succeeded = report.results.len(),
            failed = report.failures.len(),
            "Batch aggregated"
        );
        report
    }

    /// All-or-nothing form of [`aggregate`](Self::aggregate).
    ///
    /// Returns the first error any key reports and aborts the keys still
    /// running in this call.
    pub async fn try_aggregate(&self, keys: &[Key]) -> Result<ResultSet, ScoreError> {
        let mut tasks = JoinSet::new();
        for (index, key) in keys.iter().enumerate() {
            self.spawn_key(&mut tasks, index, key.clone());
        }

        let mut results = ResultSet::new();
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = joined.map_err(|e| {
                ScoreError::internal(format!("key task did not complete: {e}"))
            })?;
            match outcome {
                Ok(value) => {
                    results.insert(keys[index].clone(), value);
                }
                Err(error) => {
                    tracing::debug!(
                        key = %keys[index],
                        code = %error.code,
                        remaining = tasks.len(),
                        "Aborting batch on first failure"
                    );
                    tasks.abort_all();
                    return Err(error);
                }
            }
        }

        Ok(results)
    }

    fn spawn_key(&self, tasks: &mut JoinSet<KeyOutcome>, index: usize, key: Key) {
        let fetcher = Arc::clone(&self.fetcher);
        let sources = Arc::clone(&self.sources);
        let limiter = self.limiter.clone();
        let cancel = self.cancel.clone();

        tasks.spawn(async move {
            let work = async {
                let _permit = acquire(limiter.as_ref()).await?;
                process_key(fetcher.as_ref(), &sources, &key, &cancel).await
            };
            let outcome = AssertUnwindSafe(work)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(%key, panic = message, "Key task panicked");
                    Err(ScoreError::internal(format!("key task panicked: {message}"))
                        .with_detail("key", key.to_string()))
                });
            (index, outcome)
        });
    }
}

async fn acquire(
    limiter: Option<&Arc<Semaphore>>,
) -> Result<Option<OwnedSemaphorePermit>, ScoreError> {
    let Some(semaphore) = limiter else {
        return Ok(None);
    };
    Arc::clone(semaphore)
        .acquire_owned()
        .await
        .map(Some)
        .map_err(|_| ScoreError::internal("concurrency limiter closed"))
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
