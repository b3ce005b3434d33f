//! Batch outcomes: per-key states, the result map and the failure list.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::{CombinedResult, Key, ScoreError};

/// Lifecycle of one key inside a batch.
///
/// `Pending -> FetchingSources -> Combining -> {Succeeded | Failed}`. A key
/// can fail from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Pending,
    FetchingSources,
    Combining,
    Succeeded,
    Failed,
}

impl KeyState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, KeyState::Succeeded | KeyState::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            KeyState::Pending => "pending",
            KeyState::FetchingSources => "fetching_sources",
            KeyState::Combining => "combining",
            KeyState::Succeeded => "succeeded",
            KeyState::Failed => "failed",
        }
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type ResultSet = BTreeMap<Key, CombinedResult>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub key: Key,
    pub error: ScoreError,
}

pub type FailureSet = Vec<Failure>;

/// Complete outcome of a batch: every distinct input key appears in exactly
/// one of `results` or `failures`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub results: ResultSet,
    pub failures: FailureSet,
}

impl BatchReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a success. A success replaces an earlier failure of the same key.
    pub fn record_success(&mut self, key: Key, value: CombinedResult) {
        self.failures.retain(|failure| failure.key != key);
        self.results.insert(key, value);
    }

    /// Record a failure unless the key already has an outcome.
    pub fn record_failure(&mut self, key: Key, error: ScoreError) {
        if self.results.contains_key(&key) || self.failure(&key).is_some() {
            return;
        }
        self.failures.push(Failure { key, error });
    }

    pub fn record(&mut self, key: Key, outcome: Result<CombinedResult, ScoreError>) {
        match outcome {
            Ok(value) => self.record_success(key, value),
            Err(error) => self.record_failure(key, error),
        }
    }

    #[must_use]
    pub fn result(&self, key: &Key) -> Option<CombinedResult> {
        self.results.get(key).copied()
    }

    #[must_use]
    pub fn failure(&self, key: &Key) -> Option<&ScoreError> {
        self.failures
            .iter()
            .find(|failure| &failure.key == key)
            .map(|failure| &failure.error)
    }

    #[must_use]
    pub fn failed_keys(&self) -> Vec<&Key> {
        self.failures.iter().map(|failure| &failure.key).collect()
    }

    /// Number of keys with an outcome.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.failures.is_empty()
    }

    /// True when every key of `keys` has exactly one outcome and no other key does.
    #[must_use]
    pub fn covers_exactly(&self, keys: &[Key]) -> bool {
        let mut distinct: Vec<&Key> = keys.iter().collect();
        distinct.sort();
        distinct.dedup();

        if distinct.len() != self.len() {
            return false;
        }
        distinct.iter().all(|key| {
            let succeeded = self.results.contains_key(key);
            let failures = self.failures.iter().filter(|f| &f.key == *key).count();
            usize::from(succeeded) + failures == 1
        })
    }
}
