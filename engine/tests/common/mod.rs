//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tally_engine::{Key, PayloadSource, ScoreError, Source, TallyConfig};
use tally_engine::tally_config::SourceConfig;
use tally_engine::tally_types::SourceName;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Route engine logs through the test harness. `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Config with one source per name, all served by `server`.
pub fn config_for(server: &MockServer, names: &[&str]) -> TallyConfig {
    let mut config = TallyConfig::default();
    config.http.timeout_seconds = 5;
    config.http.user_agent = Some("tally-test/1.0".to_string());
    config.sources = names
        .iter()
        .map(|name| SourceConfig {
            name: (*name).to_string(),
            url: format!("{}/{{source}}/credit-score/{{key}}", server.uri()),
        })
        .collect();
    config
}

pub async fn mount_score(server: &MockServer, source: &str, key: i64, score: i64) {
    mount_body(server, source, key, &format!(r#"{{"score": {score}}}"#)).await;
}

pub async fn mount_body(server: &MockServer, source: &str, key: i64, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{source}/credit-score/{key}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

pub fn sources(names: &[&str]) -> Vec<Source> {
    names
        .iter()
        .map(|name| Source::new(SourceName::new(*name).unwrap(), "http://scripted/{key}"))
        .collect()
}

pub fn keys(ids: impl IntoIterator<Item = i64>) -> Vec<Key> {
    ids.into_iter().map(Key::from).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started { key: Key, source: String },
    Finished { key: Key, source: String },
}

enum Reply {
    Payload(Result<Vec<u8>, ScoreError>),
    Panic,
}

struct Script {
    delay: Duration,
    reply: Reply,
}

/// In-memory [`PayloadSource`] with per-`(key, source)` latency and replies.
///
/// Records when each fetch starts and finishes and the peak number of
/// fetches in flight. Unscripted pairs fail with a transport error.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: HashMap<(Key, String), Script>,
    events: Mutex<Vec<Event>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(self, key: i64, source: &str, score: i64, delay: Duration) -> Self {
        let payload = format!(r#"{{"score": {score}}}"#).into_bytes();
        self.reply(key, source, Ok(payload), delay)
    }

    pub fn reply(
        mut self,
        key: i64,
        source: &str,
        reply: Result<Vec<u8>, ScoreError>,
        delay: Duration,
    ) -> Self {
        self.scripts.insert(
            (Key::from(key), source.to_string()),
            Script {
                delay,
                reply: Reply::Payload(reply),
            },
        );
        self
    }

    pub fn panic_on(mut self, key: i64, source: &str) -> Self {
        self.scripts.insert(
            (Key::from(key), source.to_string()),
            Script {
                delay: Duration::ZERO,
                reply: Reply::Panic,
            },
        );
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn started(&self, key: i64) -> usize {
        let key = Key::from(key);
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::Started { key: k, .. } if *k == key))
            .count()
    }

    pub fn finished(&self, key: i64) -> usize {
        let key = Key::from(key);
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::Finished { key: k, .. } if *k == key))
            .count()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl PayloadSource for ScriptedSource {
    async fn fetch_payload(&self, key: &Key, source: &Source) -> Result<Vec<u8>, ScoreError> {
        let name = source.name().to_string();
        self.push(Event::Started {
            key: key.clone(),
            source: name.clone(),
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let script = self.scripts.get(&(key.clone(), name.clone()));
        let delay = script.map_or(Duration::ZERO, |script| script.delay);
        tokio::time::sleep(delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.push(Event::Finished {
            key: key.clone(),
            source: name,
        });

        match script.map(|script| &script.reply) {
            Some(Reply::Payload(reply)) => reply.clone(),
            Some(Reply::Panic) => panic!("scripted panic for key {key}"),
            None => Err(ScoreError::transport("unscripted")),
        }
    }
}
