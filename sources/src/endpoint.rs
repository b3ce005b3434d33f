//! Endpoint resolution: `(source, key)` to a fetchable URL.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tally_config::SourceConfig;
use tally_types::{Key, ScoreError, SourceName};
use url::Url;

pub const KEY_PLACEHOLDER: &str = "{key}";
pub const SOURCE_PLACEHOLDER: &str = "{source}";

/// Everything outside the RFC 3986 unreserved set.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A named source and the URL template its records are served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    name: SourceName,
    template: String,
}

impl Source {
    pub fn new(name: SourceName, template: impl Into<String>) -> Self {
        Self {
            name,
            template: template.into(),
        }
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self, ScoreError> {
        let name = SourceName::new(config.name.as_str()).map_err(|e| {
            ScoreError::invalid_endpoint(e.to_string()).with_detail("url", &config.url)
        })?;
        Ok(Self::new(name, config.url.as_str()))
    }

    pub fn from_configs(configs: &[SourceConfig]) -> Result<Vec<Self>, ScoreError> {
        configs.iter().map(Self::from_config).collect()
    }

    #[must_use]
    pub fn name(&self) -> &SourceName {
        &self.name
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn resolve(&self, key: &Key) -> Result<Url, ScoreError> {
        resolve_endpoint(self, key)
    }
}

/// Render `source`'s template for `key` and validate the result.
///
/// The key is percent-encoded as a single path segment. Fails with
/// `InvalidEndpoint` when the template lacks `{key}`, the key renders to an
/// empty or dot segment, or the result is not an absolute http(s) URL.
pub fn resolve_endpoint(source: &Source, key: &Key) -> Result<Url, ScoreError> {
    let invalid = |message: String| {
        ScoreError::invalid_endpoint(message)
            .with_detail("source", source.name.as_str())
            .with_detail("key", key.to_string())
    };

    if !source.template.contains(KEY_PLACEHOLDER) {
        return Err(invalid(format!(
            "endpoint template for {} has no {KEY_PLACEHOLDER} placeholder",
            source.name
        )));
    }

    let raw_key = key.to_string();
    if matches!(raw_key.trim(), "" | "." | "..") {
        return Err(invalid(format!("key {raw_key:?} is not a valid path segment")));
    }

    let rendered = source
        .template
        .replace(SOURCE_PLACEHOLDER, &encode_path_segment(source.name.as_str()))
        .replace(KEY_PLACEHOLDER, &encode_path_segment(&raw_key));

    let url = Url::parse(&rendered).map_err(|e| invalid(format!("failed to parse endpoint: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported endpoint scheme: {other}"))),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("endpoint has no host".to_string()));
    }

    Ok(url)
}

fn encode_path_segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}
