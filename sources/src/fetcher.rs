//! HTTP retrieval of one record for one `(key, source)` pair.

use futures_util::StreamExt;
use tally_config::HttpConfig;
use tally_types::{Key, RawRecord, ScoreError};

use crate::client::build_client;
use crate::decode::decode_record;
use crate::endpoint::Source;

const MAX_ERROR_BODY_BYTES: usize = 1024;

/// Fetches and decodes records over HTTP.
///
/// One GET per call, no retries: any failure is reported to the caller
/// immediately.
#[derive(Debug, Clone)]
pub struct ScoreFetcher {
    client: reqwest::Client,
    max_payload_bytes: usize,
    https_only: bool,
}

impl ScoreFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, ScoreError> {
        let client = build_client(config)
            .map_err(|e| ScoreError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, config))
    }

    /// Use a caller-provided client; limits still come from `config`.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &HttpConfig) -> Self {
        Self {
            client,
            max_payload_bytes: config.max_payload_bytes,
            https_only: config.https_only,
        }
    }

    /// Retrieve and decode the record for `key` from `source`.
    pub async fn fetch(&self, key: &Key, source: &Source) -> Result<RawRecord, ScoreError> {
        let payload = self.fetch_payload(key, source).await?;
        decode_record(&payload).map_err(|e| {
            e.with_detail("source", source.name().as_str())
                .with_detail("key", key.to_string())
        })
    }

    /// Retrieve the raw payload for `key` from `source` without decoding it.
    pub async fn fetch_payload(&self, key: &Key, source: &Source) -> Result<Vec<u8>, ScoreError> {
        let url = source.resolve(key)?;
        if self.https_only && url.scheme() != "https" {
            return Err(ScoreError::invalid_endpoint(format!(
                "plain http endpoint refused: {url}"
            ))
            .with_detail("source", source.name().as_str())
            .with_detail("key", key.to_string()));
        }

        tracing::debug!(%key, source = %source.name(), %url, "Fetching record");

        let response = self.client.get(url).send().await.map_err(|e| {
            transport_error(&e)
                .with_detail("source", source.name().as_str())
                .with_detail("key", key.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = read_error_body(response).await;
            tracing::debug!(%key, source = %source.name(), %status, "Source returned error status");
            return Err(ScoreError::transport(format!(
                "{} returned HTTP {status}",
                source.name()
            ))
            .with_detail("source", source.name().as_str())
            .with_detail("key", key.to_string())
            .with_detail("status", status.as_u16().to_string())
            .with_detail("body", body));
        }

        if let Some(length) = response.content_length()
            && length > self.max_payload_bytes as u64
        {
            return Err(payload_too_large(self.max_payload_bytes)
                .with_detail("source", source.name().as_str())
                .with_detail("key", key.to_string()));
        }

        read_capped_body(response, self.max_payload_bytes)
            .await
            .map_err(|e| {
                e.with_detail("source", source.name().as_str())
                    .with_detail("key", key.to_string())
            })
    }
}

/// Read the body, failing once it grows past `max_bytes`.
async fn read_capped_body(
    response: reqwest::Response,
    max_bytes: usize,
) -> Result<Vec<u8>, ScoreError> {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| transport_error(&e))?;
        body.extend_from_slice(&chunk);
        if body.len() > max_bytes {
            return Err(payload_too_large(max_bytes));
        }
    }
    Ok(body)
}

/// Best-effort error body for diagnostics, truncated past
/// `MAX_ERROR_BODY_BYTES`.
async fn read_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

fn payload_too_large(max_bytes: usize) -> ScoreError {
    ScoreError::decoding(format!("payload exceeds {max_bytes} bytes"))
        .with_detail("max_payload_bytes", max_bytes.to_string())
}

fn transport_error(error: &reqwest::Error) -> ScoreError {
    let kind = if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connect"
    } else if error.is_redirect() {
        "redirect"
    } else if error.is_body() || error.is_decode() {
        "body"
    } else {
        "request"
    };
    ScoreError::transport(format!("request failed: {error}")).with_detail("kind", kind)
}
