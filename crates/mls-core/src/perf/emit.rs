//! Telemetry emission contract: one JSON record per sampled event.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::TelemetryDispatchError;
use crate::priority::UrgencyTier;

/// Attribution fields tying a metric back to its element and load.
#[derive(Debug, Clone, Serialize)]
pub struct Attribution {
    /// Element identity (the media request id).
    pub element: String,
    /// The source URL that settled.
    pub source: String,
    pub tier: UrgencyTier,
    pub generation: u64,
    /// Load attempts spent, fallbacks included.
    pub attempts: u32,
}

/// One sampled telemetry event, serialized as JSON for the collector.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRecord {
    /// Metric name: `"LCP"`, `"INP"`, `"media-load"`, `"media-error"`.
    pub name: String,
    /// Metric value in milliseconds.
    pub value: f64,
    pub id: String,
    /// Path component of the source (or the raw source when not a URL).
    pub path: String,
    pub attribution: Attribution,
    /// Unix epoch milliseconds at emission time.
    pub timestamp: u64,
}

/// Non-blocking, best-effort dispatch to the analytics collaborator. Must not
/// delay navigation or unload; failures are reported to the caller only so it
/// can log them.
pub trait TelemetryTransport: Send + Sync {
    fn dispatch(&self, record: &TelemetryRecord) -> Result<(), TelemetryDispatchError>;
}

/// Default transport: logs each record as a JSON line under the
/// `mls::telemetry` target.
pub struct TracingTransport;

impl TelemetryTransport for TracingTransport {
    fn dispatch(&self, record: &TelemetryRecord) -> Result<(), TelemetryDispatchError> {
        let json =
            serde_json::to_string(record).map_err(|e| TelemetryDispatchError(e.to_string()))?;
        tracing::info!(target: "mls::telemetry", %json);
        Ok(())
    }
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Path component of a source URL, or the raw source for relative paths.
pub(crate) fn source_path(source: &str) -> String {
    match url::Url::parse(source) {
        Ok(u) => u.path().to_string(),
        Err(_) => source.to_string(),
    }
}
