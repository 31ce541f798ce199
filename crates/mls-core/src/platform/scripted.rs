//! Deterministic platform doubles for tests and the scenario simulator.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{FailureKind, SourceLoadError, TelemetryDispatchError};
use crate::network::{ConnectionInfoSource, ConnectionProfile};
use crate::perf::{TelemetryRecord, TelemetryTransport};

use super::{BoxFuture, LoadRequest, LoadedResource, ResourceLoader};

/// Scripted behaviour for one source URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceScript {
    /// Fail this many load attempts before succeeding.
    pub failures_before_success: u32,
    /// Simulated load latency per attempt.
    pub latency: Duration,
    /// Never succeed, regardless of the failure budget.
    pub always_fail: bool,
}

struct ScriptEntry {
    script: SourceScript,
    remaining_failures: u32,
}

/// A `ResourceLoader` whose outcomes are scripted per source URL.
///
/// Sources without a script succeed immediately. Every issued load and hint
/// is recorded so tests can assert attempt counts and preload idempotence.
#[derive(Default)]
pub struct ScriptedLoader {
    scripts: Mutex<HashMap<String, ScriptEntry>>,
    issued: Mutex<Vec<LoadRequest>>,
    hints: Mutex<Vec<String>>,
}

impl ScriptedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, url: impl Into<String>, script: SourceScript) {
        self.scripts.lock().unwrap().insert(
            url.into(),
            ScriptEntry {
                script,
                remaining_failures: script.failures_before_success,
            },
        );
    }

    /// Number of load attempts issued for `url`.
    pub fn loads_for(&self, url: &str) -> usize {
        self.issued
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    /// All issued loads, in order.
    pub fn issued(&self) -> Vec<LoadRequest> {
        self.issued.lock().unwrap().clone()
    }

    pub fn hints(&self) -> Vec<String> {
        self.hints.lock().unwrap().clone()
    }

    /// Outcome for the next attempt of `url`, decided synchronously at issue
    /// time so interleavings stay deterministic.
    fn next_outcome(&self, url: &str) -> (Duration, Result<LoadedResource, SourceLoadError>) {
        let mut scripts = self.scripts.lock().unwrap();
        let Some(entry) = scripts.get_mut(url) else {
            return (
                Duration::ZERO,
                Ok(LoadedResource {
                    url: url.to_string(),
                    byte_size: None,
                }),
            );
        };
        let latency = entry.script.latency;
        if entry.script.always_fail {
            return (
                latency,
                Err(SourceLoadError::new(
                    url,
                    FailureKind::Network("scripted failure".into()),
                )),
            );
        }
        if entry.remaining_failures > 0 {
            entry.remaining_failures -= 1;
            return (
                latency,
                Err(SourceLoadError::new(
                    url,
                    FailureKind::Network("scripted failure".into()),
                )),
            );
        }
        (
            latency,
            Ok(LoadedResource {
                url: url.to_string(),
                byte_size: None,
            }),
        )
    }
}

impl ResourceLoader for ScriptedLoader {
    fn load(&self, req: LoadRequest) -> BoxFuture<Result<LoadedResource, SourceLoadError>> {
        let (latency, outcome) = self.next_outcome(&req.url);
        self.issued.lock().unwrap().push(req);
        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            outcome
        })
    }

    fn hint(&self, url: &str) {
        self.hints.lock().unwrap().push(url.to_string());
    }
}

/// A connection source that always reports the same profile.
pub struct StaticConnection(pub Option<ConnectionProfile>);

impl ConnectionInfoSource for StaticConnection {
    fn sample(&self) -> Option<ConnectionProfile> {
        self.0
    }
}

/// A transport that collects dispatched records in memory.
#[derive(Default)]
pub struct CollectingTransport {
    records: Mutex<Vec<TelemetryRecord>>,
}

impl CollectingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl TelemetryTransport for CollectingTransport {
    fn dispatch(&self, record: &TelemetryRecord) -> Result<(), TelemetryDispatchError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// A transport whose dispatch always fails. Used to assert that telemetry
/// failures never affect load behaviour.
pub struct FailingTransport;

impl TelemetryTransport for FailingTransport {
    fn dispatch(&self, _record: &TelemetryRecord) -> Result<(), TelemetryDispatchError> {
        Err(TelemetryDispatchError("collector unreachable".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_failures_then_success() {
        let loader = ScriptedLoader::new();
        loader.script(
            "https://cdn.example/a.jpg",
            SourceScript {
                failures_before_success: 2,
                ..SourceScript::default()
            },
        );
        let req = LoadRequest {
            request_id: "x".into(),
            url: "https://cdn.example/a.jpg".into(),
            quality: 75,
            width: None,
            height: None,
        };
        assert!(loader.load(req.clone()).await.is_err());
        assert!(loader.load(req.clone()).await.is_err());
        assert!(loader.load(req.clone()).await.is_ok());
        assert_eq!(loader.loads_for("https://cdn.example/a.jpg"), 3);
    }

    #[tokio::test]
    async fn unscripted_sources_succeed() {
        let loader = ScriptedLoader::new();
        let req = LoadRequest {
            request_id: "x".into(),
            url: "/images/logo.svg".into(),
            quality: 75,
            width: None,
            height: None,
        };
        let res = loader.load(req).await.unwrap();
        assert_eq!(res.url, "/images/logo.svg");
    }
}
