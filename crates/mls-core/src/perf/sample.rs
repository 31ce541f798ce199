//! Sampling-inclusion decisions and the per-load performance sample.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

/// Decides whether a request's telemetry is included in the sample.
/// Injectable so tests can force inclusion or exclusion.
pub trait SampleDecider: Send + Sync {
    fn include(&self, id: &str, rate: f64) -> bool;
}

/// Deterministic hash-ratio sampling: a request id lands in a stable bucket
/// of 10,000 and is included iff its bucket falls under the rate. Stable per
/// id across sessions, uniform across ids, and needs no RNG.
pub struct HashRatioSampler;

impl SampleDecider for HashRatioSampler {
    fn include(&self, id: &str, rate: f64) -> bool {
        if rate >= 1.0 {
            return true;
        }
        if rate <= 0.0 {
            return false;
        }
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        let bucket = (hasher.finish() % 10_000) as f64;
        bucket < rate * 10_000.0
    }
}

/// Includes everything. Used by the simulator so scenario output is complete.
pub struct AlwaysSample;

impl SampleDecider for AlwaysSample {
    fn include(&self, _id: &str, _rate: f64) -> bool {
        true
    }
}

/// Includes nothing.
pub struct NeverSample;

impl SampleDecider for NeverSample {
    fn include(&self, _id: &str, _rate: f64) -> bool {
        false
    }
}

/// Measurement of one completed load.
#[derive(Debug, Clone, Copy)]
pub struct PerformanceSample {
    /// When the generation entered `Loading`.
    pub started: Instant,
    /// When the load settled successfully.
    pub completed: Instant,
    /// First user interaction on the element's container, if it preceded
    /// completion.
    pub interaction_start: Option<Instant>,
    /// Whether this load qualified as an LCP candidate.
    pub lcp_candidate: bool,
    /// Whether telemetry for this load was included in the sample.
    pub sampled: bool,
}

impl PerformanceSample {
    /// Elapsed load time, `Loading` to `Loaded`.
    pub fn elapsed(&self) -> Duration {
        self.completed.saturating_duration_since(self.started)
    }

    /// INP-relevant latency: interaction to load completion.
    pub fn interaction_latency(&self) -> Option<Duration> {
        self.interaction_start
            .map(|i| self.completed.saturating_duration_since(i))
    }
}
