//! Configuration loading for Tally.
//!
//! Configuration lives in `~/.tally/config.toml`. Every section is optional;
//! missing sections fall back to defaults that query the two credit bureaus.
//!
//! ```toml
//! [http]
//! connect_timeout_seconds = 10
//! timeout_seconds = 30
//! max_payload_bytes = 65536
//! user_agent = "tally/0.0"
//! https_only = false
//!
//! [batch]
//! max_concurrent_keys = 32
//!
//! [[sources]]
//! name = "equifax"
//! url = "https://ember-sparkly-rule.glitch.me/equifax/credit-score/{key}"
//!
//! [[sources]]
//! name = "experian"
//! url = "${SCORES_BASE_URL}/experian/credit-score/{key}"
//! ```
//!
//! `${VAR}` references in source URLs are expanded from the environment at
//! load time; unset variables expand to the empty string.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::{env, fs, io};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://ember-sparkly-rule.glitch.me";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024;

/// Largest accepted `batch.max_concurrent_keys`.
pub const MAX_CONCURRENT_KEYS_LIMIT: usize = 1 << 20;

const fn default_connect_timeout_seconds() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

const fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}

fn default_sources() -> Vec<SourceConfig> {
    ["equifax", "experian"]
        .into_iter()
        .map(|name| SourceConfig {
            name: name.to_string(),
            url: format!("{DEFAULT_BASE_URL}/{name}/credit-score/{{key}}"),
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            batch: BatchConfig::default(),
            sources: default_sources(),
        }
    }
}

/// HTTP client settings shared by every source.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    /// Whole-request timeout, body included.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Payloads larger than this fail to decode.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    pub user_agent: Option<String>,
    /// Refuse plain `http://` endpoints.
    #[serde(default)]
    pub https_only: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: DEFAULT_CONNECT_TIMEOUT_SECS,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            user_agent: None,
            https_only: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchConfig {
    /// Upper bound on keys processed at once. Unset means unbounded.
    pub max_concurrent_keys: Option<usize>,
}

/// One source: a name and a URL template with a `{key}` placeholder.
///
/// `{source}` in the template is replaced by `name`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
}

/// Expand `${VAR}` references from the environment.
///
/// Unset variables become empty; an unclosed `${` is kept literally.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl TallyConfig {
    /// Load from the default path. `Ok(None)` when no config file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!(path = %path.display(), error = %source, "Failed to read config");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|source| {
            tracing::warn!(path = %path.display(), error = %source, "Failed to parse config");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        config.expand_env();
        config.validate()?;

        tracing::debug!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded config"
        );
        Ok(config)
    }

    /// Load from the default path, falling back to defaults when absent.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        Ok(Self::load()?.unwrap_or_default())
    }

    fn expand_env(&mut self) {
        for source in &mut self.sources {
            source.url = expand_env_vars(&source.url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one [[sources]] entry is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            let name = source.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid("source name must not be empty".to_string()));
            }
            if !seen.insert(name) {
                return Err(ConfigError::Invalid(format!("duplicate source name: {name}")));
            }
            if source.url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("source {name} has an empty url")));
            }
        }

        if self.http.timeout_seconds == 0 || self.http.connect_timeout_seconds == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".to_string()));
        }
        if self.http.max_payload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_payload_bytes must be positive".to_string(),
            ));
        }
        match self.batch.max_concurrent_keys {
            Some(0) => {
                return Err(ConfigError::Invalid(
                    "max_concurrent_keys must be positive when set".to_string(),
                ));
            }
            Some(limit) if limit > MAX_CONCURRENT_KEYS_LIMIT => {
                return Err(ConfigError::Invalid(format!(
                    "max_concurrent_keys must be at most {MAX_CONCURRENT_KEYS_LIMIT}, got {limit}"
                )));
            }
            _ => {}
        }

        Ok(())
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".tally").join("config.toml"))
}
