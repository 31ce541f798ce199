//! Performance reporting: load timing, LCP/INP attribution, sampled telemetry.
//!
//! Everything here is best-effort by contract: a failing transport is logged
//! at debug level and otherwise ignored, and nothing in this module can delay
//! or fail the load pipeline.

mod emit;
mod report;
mod sample;

pub use emit::{Attribution, TelemetryRecord, TelemetryTransport, TracingTransport};
pub use report::{ElementGeometry, FinalizedLoad, PerfReporter};
pub use sample::{AlwaysSample, HashRatioSampler, NeverSample, PerformanceSample, SampleDecider};
