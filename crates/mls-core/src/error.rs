//! Error taxonomy for the load pipeline.
//!
//! Failures never cross the component boundary as panics or exceptions: they
//! are classified here, consumed by the retry machinery, and surfaced to the
//! caller only as terminal state (`LoadState::Failed`) once recovery is
//! exhausted.

use thiserror::Error;

/// Why a single load attempt of one source failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    /// Network-level failure (connection reset, DNS, unreachable).
    #[error("network: {0}")]
    Network(String),
    /// The platform loader gave up waiting.
    #[error("timed out")]
    Timeout,
    /// Non-2xx HTTP status from the asset service.
    #[error("HTTP {0}")]
    Http(u16),
    /// Bytes arrived but could not be decoded as an image.
    #[error("decode: {0}")]
    Decode(String),
    /// Anything else the platform reported.
    #[error("{0}")]
    Other(String),
}

/// A given source failed to load. Recoverable: the orchestrator retries with
/// backoff and then substitutes fallback sources before giving up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("source {url} failed: {kind}")]
pub struct SourceLoadError {
    /// The source URL that failed.
    pub url: String,
    /// Classified failure.
    pub kind: FailureKind,
}

impl SourceLoadError {
    pub fn new(url: impl Into<String>, kind: FailureKind) -> Self {
        Self { url: url.into(), kind }
    }
}

/// Terminal load failure: retries and the whole fallback chain are exhausted.
/// Surfaced as `LoadState::Failed`; the placeholder renderer is required to
/// show the element's descriptive text in this state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("all sources failed after {total_attempts} attempt(s); last: {last}")]
pub struct AllSourcesFailed {
    /// Load attempts across every source, including fallbacks.
    pub total_attempts: u32,
    /// The failure that ended the last source.
    pub last: SourceLoadError,
}

/// Rejected per-request options, detected once at `MediaRequest` construction.
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("invalid source url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("request has no sources")]
    NoSources,
    #[error("quality must be in 1..=100, got {0}")]
    QualityOutOfRange(u8),
    #[error("threshold must be in 0.0..=1.0, got {0}")]
    ThresholdOutOfRange(f64),
    #[error("request id must not be empty")]
    EmptyId,
}

/// Telemetry dispatch failed. Always swallowed by the reporter; carried as a
/// type so transports can log the cause at debug level.
#[derive(Debug, Error)]
#[error("telemetry dispatch failed: {0}")]
pub struct TelemetryDispatchError(pub String);
