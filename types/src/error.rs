//! Structured errors shared by every layer.
//!
//! A [`ScoreError`] carries a stable [`ErrorCode`], a human-readable message
//! and optional key/value details (source name, HTTP status, decoder position).
//! It is `Clone` so a failure can be stored in a [`crate::FailureSet`] and
//! still be inspected by callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScoreError {
    /// Stable error code.
    pub code: ErrorCode,

    /// Human-readable description.
    pub message: String,

    /// Error-specific context.
    pub details: ErrorDetails,
}

impl ScoreError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: ErrorDetails::default(),
        }
    }

    pub fn invalid_endpoint(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidEndpoint, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Transport, message)
    }

    pub fn decoding(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Decoding, message)
    }

    #[must_use]
    pub fn empty_input() -> Self {
        Self::new(ErrorCode::EmptyInput, "cannot combine zero records")
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, "cancelled before work started")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Add a detail field.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.0.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key)
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "code": self.code,
            "message": self.message,
            "transient": self.code.is_transient(),
        });

        if !self.details.0.is_empty() {
            let details: serde_json::Map<String, serde_json::Value> = self
                .details
                .0
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            obj["details"] = serde_json::Value::Object(details);
        }

        obj
    }
}

impl Serialize for ScoreError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Endpoint could not be resolved to a valid address.
    InvalidEndpoint,
    /// Network failure or non-success HTTP status.
    Transport,
    /// Payload did not match the expected record shape.
    Decoding,
    /// Combiner was given zero records.
    EmptyInput,
    /// Cancellation was requested before the key started.
    Cancelled,
    /// A key task panicked or was lost.
    Internal,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidEndpoint => "invalid_endpoint",
            ErrorCode::Transport => "transport",
            ErrorCode::Decoding => "decoding",
            ErrorCode::EmptyInput => "empty_input",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::Internal => "internal",
        }
    }

    /// Whether a caller-side retry could plausibly succeed.
    ///
    /// Nothing in this workspace retries; the hint is for callers.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, ErrorCode::Transport)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error details as ordered key-value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetails(pub Vec<(String, String)>);

impl ErrorDetails {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
