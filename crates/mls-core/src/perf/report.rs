//! The reporter: builds performance samples and emits sampled telemetry.

use std::sync::Arc;
use std::time::Instant;

use crate::error::AllSourcesFailed;
use crate::priority::UrgencyTier;
use crate::viewport::ViewportSize;

use super::emit::{source_path, unix_millis, Attribution, TelemetryRecord, TelemetryTransport};
use super::sample::{PerformanceSample, SampleDecider};

/// On-screen geometry of the rendered element, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementGeometry {
    pub width: u32,
    pub height: u32,
}

impl ElementGeometry {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Everything the orchestrator knows about one finished load.
#[derive(Debug, Clone)]
pub struct FinalizedLoad<'a> {
    pub request_id: &'a str,
    pub source_url: &'a str,
    pub tier: UrgencyTier,
    pub generation: u64,
    pub attempts: u32,
    pub started: Instant,
    pub completed: Instant,
    pub interaction_start: Option<Instant>,
    pub geometry: Option<ElementGeometry>,
    pub viewport: ViewportSize,
}

/// Session-wide performance reporter. Shared by all request drivers.
pub struct PerfReporter {
    sample_rate: f64,
    lcp_area_fraction: f64,
    decider: Arc<dyn SampleDecider>,
    transport: Arc<dyn TelemetryTransport>,
}

impl PerfReporter {
    pub fn new(
        sample_rate: f64,
        lcp_area_fraction: f64,
        decider: Arc<dyn SampleDecider>,
        transport: Arc<dyn TelemetryTransport>,
    ) -> Self {
        Self {
            sample_rate,
            lcp_area_fraction,
            decider,
            transport,
        }
    }

    /// Finalize the measurement for a `Loading -> Loaded` transition.
    ///
    /// Computes elapsed time, judges LCP candidacy (urgent tier and on-screen
    /// area over the threshold fraction of the viewport), derives the
    /// INP-relevant interaction latency, and emits sampled records.
    pub fn finalize_load(&self, load: &FinalizedLoad<'_>) -> PerformanceSample {
        let lcp_candidate = self.is_lcp_candidate(load.tier, load.geometry, load.viewport);
        let sampled = self.decider.include(load.request_id, self.sample_rate);
        let sample = PerformanceSample {
            started: load.started,
            completed: load.completed,
            interaction_start: load.interaction_start,
            lcp_candidate,
            sampled,
        };

        if sampled {
            let elapsed_ms = sample.elapsed().as_secs_f64() * 1000.0;
            self.emit(load, "media-load", elapsed_ms);
            if lcp_candidate {
                self.emit(load, "LCP", elapsed_ms);
            }
            if let Some(latency) = sample.interaction_latency() {
                self.emit(load, "INP", latency.as_secs_f64() * 1000.0);
            }
        }
        sample
    }

    /// Record a terminal failure. Same sampling and best-effort rules.
    pub fn report_failure(
        &self,
        request_id: &str,
        tier: UrgencyTier,
        generation: u64,
        error: &AllSourcesFailed,
    ) {
        if !self.decider.include(request_id, self.sample_rate) {
            return;
        }
        let record = TelemetryRecord {
            name: "media-error".into(),
            value: f64::from(error.total_attempts),
            id: request_id.to_string(),
            path: source_path(&error.last.url),
            attribution: Attribution {
                element: request_id.to_string(),
                source: error.last.url.clone(),
                tier,
                generation,
                attempts: error.total_attempts,
            },
            timestamp: unix_millis(),
        };
        self.dispatch(record);
    }

    fn is_lcp_candidate(
        &self,
        tier: UrgencyTier,
        geometry: Option<ElementGeometry>,
        viewport: ViewportSize,
    ) -> bool {
        if !matches!(tier, UrgencyTier::Critical | UrgencyTier::High) {
            return false;
        }
        let Some(geometry) = geometry else {
            return false;
        };
        let viewport_area = viewport.area();
        if viewport_area == 0 {
            return false;
        }
        geometry.area() as f64 >= self.lcp_area_fraction * viewport_area as f64
    }

    fn emit(&self, load: &FinalizedLoad<'_>, name: &str, value: f64) {
        let record = TelemetryRecord {
            name: name.to_string(),
            value,
            id: load.request_id.to_string(),
            path: source_path(load.source_url),
            attribution: Attribution {
                element: load.request_id.to_string(),
                source: load.source_url.to_string(),
                tier: load.tier,
                generation: load.generation,
                attempts: load.attempts,
            },
            timestamp: unix_millis(),
        };
        self.dispatch(record);
    }

    fn dispatch(&self, record: TelemetryRecord) {
        // Best-effort: dispatch failures never surface past this point.
        if let Err(e) = self.transport.dispatch(&record) {
            tracing::debug!(name = %record.name, id = %record.id, error = %e, "telemetry dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FailureKind, SourceLoadError};
    use crate::platform::scripted::{CollectingTransport, FailingTransport};
    use crate::perf::sample::AlwaysSample;
    use std::time::Duration;

    fn load<'a>(tier: UrgencyTier, geometry: Option<ElementGeometry>) -> FinalizedLoad<'a> {
        let started = Instant::now();
        FinalizedLoad {
            request_id: "hero",
            source_url: "https://cdn.example/img/hero.avif",
            tier,
            generation: 0,
            attempts: 1,
            started,
            completed: started + Duration::from_millis(250),
            interaction_start: None,
            geometry,
            viewport: ViewportSize {
                width: 1000,
                height: 1000,
            },
        }
    }

    fn reporter(transport: Arc<dyn TelemetryTransport>) -> PerfReporter {
        PerfReporter::new(1.0, 0.1, Arc::new(AlwaysSample), transport)
    }

    #[test]
    fn large_critical_element_is_lcp_candidate() {
        let transport = Arc::new(CollectingTransport::new());
        let r = reporter(Arc::clone(&transport) as Arc<dyn TelemetryTransport>);
        let sample = r.finalize_load(&load(
            UrgencyTier::Critical,
            Some(ElementGeometry {
                width: 800,
                height: 400,
            }),
        ));
        assert!(sample.lcp_candidate);
        let names: Vec<String> = transport.records().iter().map(|r| r.name.clone()).collect();
        assert!(names.contains(&"media-load".to_string()));
        assert!(names.contains(&"LCP".to_string()));
    }

    #[test]
    fn small_or_low_priority_elements_are_not_lcp() {
        let transport = Arc::new(CollectingTransport::new());
        let r = reporter(Arc::clone(&transport) as Arc<dyn TelemetryTransport>);

        // Big but normal priority.
        let sample = r.finalize_load(&load(
            UrgencyTier::Normal,
            Some(ElementGeometry {
                width: 800,
                height: 400,
            }),
        ));
        assert!(!sample.lcp_candidate);

        // Critical but tiny (under 10% of a 1000x1000 viewport).
        let sample = r.finalize_load(&load(
            UrgencyTier::Critical,
            Some(ElementGeometry {
                width: 100,
                height: 100,
            }),
        ));
        assert!(!sample.lcp_candidate);
    }

    #[test]
    fn interaction_before_completion_yields_inp_record() {
        let transport = Arc::new(CollectingTransport::new());
        let r = reporter(Arc::clone(&transport) as Arc<dyn TelemetryTransport>);
        let mut l = load(UrgencyTier::Normal, None);
        l.interaction_start = Some(l.started + Duration::from_millis(50));
        r.finalize_load(&l);
        let records = transport.records();
        let inp = records.iter().find(|r| r.name == "INP").unwrap();
        assert!((inp.value - 200.0).abs() < 1.0);
    }

    #[test]
    fn failing_transport_is_swallowed() {
        let r = reporter(Arc::new(FailingTransport));
        // Must not panic or error.
        let sample = r.finalize_load(&load(UrgencyTier::Critical, None));
        assert!(sample.sampled);
        r.report_failure(
            "hero",
            UrgencyTier::Critical,
            0,
            &AllSourcesFailed {
                total_attempts: 3,
                last: SourceLoadError::new("https://cdn.example/a.jpg", FailureKind::Timeout),
            },
        );
    }

    #[test]
    fn unsampled_loads_emit_nothing() {
        let transport = Arc::new(CollectingTransport::new());
        let r = PerfReporter::new(
            0.5,
            0.1,
            Arc::new(crate::perf::sample::NeverSample),
            Arc::clone(&transport) as Arc<dyn TelemetryTransport>,
        );
        let sample = r.finalize_load(&load(UrgencyTier::Critical, None));
        assert!(!sample.sampled);
        assert!(transport.records().is_empty());
    }
}
