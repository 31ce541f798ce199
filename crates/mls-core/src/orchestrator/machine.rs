//! The per-request load state machine.
//!
//! Pure transition logic: events in, effects out. The driver owns the timers,
//! the in-flight platform load, and the viewport subscription; the machine
//! only decides. Every asynchronous event carries the generation it was
//! scheduled for, and events from a superseded generation are dropped here,
//! so a stale timer or load settling late is a no-op by construction.

use std::time::Duration;

use crate::error::{AllSourcesFailed, SourceLoadError};
use crate::platform::LoadedResource;
use crate::priority::LoadingStrategy;
use crate::request::{LoadState, MediaRequest};
use crate::retry::{RetryContext, RetryDecision};
use crate::select::SourceSelector;

use super::trace::TransitionTrace;

/// Events delivered to the machine by the driver.
#[derive(Debug)]
pub(crate) enum Event {
    /// The element's viewport signal turned positive.
    ViewportNear { generation: u64 },
    /// The stagger delay after a positive signal elapsed.
    StaggerElapsed { generation: u64 },
    /// The backoff delay before a retry elapsed.
    BackoffElapsed { generation: u64 },
    /// The platform load settled.
    LoadSettled {
        generation: u64,
        outcome: Result<LoadedResource, SourceLoadError>,
    },
    /// A resize settled (post-debounce) at this viewport width.
    WidthSettled { width: u32 },
}

/// Side effects the driver must carry out.
#[derive(Debug, PartialEq)]
pub(crate) enum Effect {
    /// Wait for the element's viewport signal, then deliver `ViewportNear`.
    AwaitViewport { generation: u64 },
    /// Arm the stagger timer.
    StartStagger { generation: u64, delay: Duration },
    /// Arm the backoff timer.
    StartBackoff { generation: u64, delay: Duration },
    /// Issue the platform load of `url` for this generation.
    StartLoad { generation: u64, url: String },
    /// Issue a preload resource hint (idempotent with the load).
    PreloadHint { url: String },
    /// Drop any pending timer and in-flight load of older generations.
    CancelPending,
    /// Success: finalize performance measurement for this generation.
    ReportLoaded {
        generation: u64,
        resource: LoadedResource,
        attempts: u32,
    },
    /// Terminal failure, after all recovery was exhausted.
    ReportFailed { error: AllSourcesFailed },
}

pub(crate) struct Machine {
    request: MediaRequest,
    selector: SourceSelector,
    state: LoadState,
    generation: u64,
    active_url: String,
    retry: RetryContext,
    viewport_width: u32,
    trace: TransitionTrace,
    hinted: bool,
    last_error: Option<SourceLoadError>,
}

impl Machine {
    pub(crate) fn new(
        request: MediaRequest,
        selector: SourceSelector,
        trace: TransitionTrace,
        viewport_width: u32,
    ) -> Self {
        let active_url = selector.select(&request.candidates, viewport_width).url.clone();
        let retry = RetryContext::new(request.fallbacks.iter().cloned());
        Self {
            request,
            selector,
            state: LoadState::Pending,
            generation: 0,
            active_url,
            retry,
            viewport_width,
            trace,
            hinted: false,
            last_error: None,
        }
    }

    pub(crate) fn state(&self) -> LoadState {
        self.state
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn active_url(&self) -> &str {
        &self.active_url
    }

    pub(crate) fn request(&self) -> &MediaRequest {
        &self.request
    }

    fn transition(&mut self, to: LoadState) {
        tracing::debug!(
            id = %self.request.id,
            generation = self.generation,
            from = %self.state,
            to = %to,
            "transition"
        );
        self.trace.push(self.generation, self.state, to);
        self.state = to;
    }

    /// Initial event, applied once when the driver starts.
    pub(crate) fn start(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        if self.request.strategy == LoadingStrategy::Preload && !self.hinted {
            self.hinted = true;
            fx.push(Effect::PreloadHint {
                url: self.active_url.clone(),
            });
        }
        if self.request.skips_observation() {
            self.begin_load(&mut fx);
        } else {
            self.transition(LoadState::Observing);
            fx.push(Effect::AwaitViewport {
                generation: self.generation,
            });
        }
        fx
    }

    pub(crate) fn on_event(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::ViewportNear { generation } => self.on_viewport_near(generation),
            Event::StaggerElapsed { generation } => self.on_stagger_elapsed(generation),
            Event::BackoffElapsed { generation } => self.on_backoff_elapsed(generation),
            Event::LoadSettled { generation, outcome } => {
                self.on_load_settled(generation, outcome)
            }
            Event::WidthSettled { width } => self.on_width_settled(width),
        }
    }

    fn begin_load(&mut self, fx: &mut Vec<Effect>) {
        self.transition(LoadState::Loading);
        self.retry.record_attempt();
        fx.push(Effect::StartLoad {
            generation: self.generation,
            url: self.active_url.clone(),
        });
    }

    fn on_viewport_near(&mut self, generation: u64) -> Vec<Effect> {
        let mut fx = Vec::new();
        if generation != self.generation || self.state != LoadState::Observing {
            return fx;
        }
        if self.request.load_delay.is_zero() {
            self.begin_load(&mut fx);
        } else {
            fx.push(Effect::StartStagger {
                generation: self.generation,
                delay: self.request.load_delay,
            });
        }
        fx
    }

    fn on_stagger_elapsed(&mut self, generation: u64) -> Vec<Effect> {
        let mut fx = Vec::new();
        if generation != self.generation || self.state != LoadState::Observing {
            return fx;
        }
        self.begin_load(&mut fx);
        fx
    }

    fn on_backoff_elapsed(&mut self, generation: u64) -> Vec<Effect> {
        let mut fx = Vec::new();
        if generation != self.generation || self.state != LoadState::Retrying {
            return fx;
        }
        self.begin_load(&mut fx);
        fx
    }

    fn on_load_settled(
        &mut self,
        generation: u64,
        outcome: Result<LoadedResource, SourceLoadError>,
    ) -> Vec<Effect> {
        let mut fx = Vec::new();
        if generation != self.generation || self.state != LoadState::Loading {
            return fx;
        }
        match outcome {
            Ok(resource) => {
                self.transition(LoadState::Loaded);
                fx.push(Effect::ReportLoaded {
                    generation: self.generation,
                    resource,
                    attempts: self.retry.total_attempts(),
                });
            }
            Err(error) => {
                tracing::debug!(
                    id = %self.request.id,
                    url = %error.url,
                    kind = %error.kind,
                    retries = self.retry.retries(),
                    "source load failed"
                );
                self.last_error = Some(error);
                match self.request.retry.decide(self.retry.retries()) {
                    RetryDecision::RetryAfter(delay) => {
                        self.retry.record_retry();
                        self.transition(LoadState::Retrying);
                        fx.push(Effect::StartBackoff {
                            generation: self.generation,
                            delay,
                        });
                    }
                    RetryDecision::NoRetry => match self.retry.next_fallback() {
                        Some(next) => {
                            self.transition(LoadState::Fallback);
                            self.active_url = next;
                            self.begin_load(&mut fx);
                        }
                        None => {
                            self.transition(LoadState::Failed);
                            let last = self
                                .last_error
                                .clone()
                                .expect("failure recorded just above");
                            fx.push(Effect::ReportFailed {
                                error: AllSourcesFailed {
                                    total_attempts: self.retry.total_attempts(),
                                    last,
                                },
                            });
                        }
                    },
                }
            }
        }
        fx
    }

    /// A resize settled. If the selected source changed, the current
    /// generation is abandoned: pending timers and loads are cancelled and a
    /// fresh generation starts from `Pending` with a fresh retry budget.
    fn on_width_settled(&mut self, width: u32) -> Vec<Effect> {
        let mut fx = Vec::new();
        self.viewport_width = width;
        let selected = self
            .selector
            .select(&self.request.candidates, width)
            .url
            .clone();
        if selected == self.active_url {
            return fx;
        }

        tracing::debug!(
            id = %self.request.id,
            old = %self.active_url,
            new = %selected,
            "breakpoint changed active source; starting new generation"
        );
        self.generation += 1;
        self.active_url = selected;
        self.retry = RetryContext::new(self.request.fallbacks.iter().cloned());
        self.last_error = None;
        fx.push(Effect::CancelPending);
        self.transition(LoadState::Pending);

        if self.request.skips_observation() {
            self.begin_load(&mut fx);
        } else {
            self.transition(LoadState::Observing);
            fx.push(Effect::AwaitViewport {
                generation: self.generation,
            });
        }
        fx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MediaOptions, SchedulerConfig};
    use crate::error::FailureKind;
    use crate::priority::PriorityHint;

    fn machine_for(opts: MediaOptions) -> Machine {
        let cfg = SchedulerConfig::default();
        let request = MediaRequest::from_options("el", &opts, &cfg).unwrap();
        let selector = SourceSelector::new(
            cfg.mobile_breakpoint_px,
            Duration::from_millis(cfg.debounce_ms),
        );
        Machine::new(request, selector, TransitionTrace::new(), 1200)
    }

    fn fail(url: &str) -> Result<LoadedResource, SourceLoadError> {
        Err(SourceLoadError::new(url, FailureKind::Timeout))
    }

    fn ok(url: &str) -> Result<LoadedResource, SourceLoadError> {
        Ok(LoadedResource {
            url: url.to_string(),
            byte_size: None,
        })
    }

    #[test]
    fn critical_goes_straight_to_loading() {
        let mut m = machine_for(MediaOptions {
            src: "https://cdn.example/a.jpg".into(),
            priority: PriorityHint::Critical,
            ..MediaOptions::default()
        });
        let fx = m.start();
        assert_eq!(m.state(), LoadState::Loading);
        assert!(fx
            .iter()
            .any(|e| matches!(e, Effect::StartLoad { generation: 0, .. })));
    }

    #[test]
    fn normal_priority_observes_first() {
        let mut m = machine_for(MediaOptions {
            src: "https://cdn.example/a.jpg".into(),
            ..MediaOptions::default()
        });
        let fx = m.start();
        assert_eq!(m.state(), LoadState::Observing);
        assert_eq!(fx, vec![Effect::AwaitViewport { generation: 0 }]);

        let fx = m.on_event(Event::ViewportNear { generation: 0 });
        assert_eq!(m.state(), LoadState::Loading);
        assert!(matches!(fx[0], Effect::StartLoad { .. }));
    }

    #[test]
    fn retry_sequence_respects_budget_then_falls_back() {
        let mut m = machine_for(MediaOptions {
            src: "https://cdn.example/a.jpg".into(),
            fallback_src: vec!["https://cdn.example/b.jpg".into()],
            priority: PriorityHint::Critical,
            ..MediaOptions::default()
        });
        m.start();

        // max_retries defaults to 2: two backoffs, then fallback.
        let mut load_starts = 1u32;
        for _ in 0..2 {
            let fx = m.on_event(Event::LoadSettled {
                generation: 0,
                outcome: fail("https://cdn.example/a.jpg"),
            });
            assert_eq!(m.state(), LoadState::Retrying);
            assert!(matches!(fx[0], Effect::StartBackoff { .. }));
            let fx = m.on_event(Event::BackoffElapsed { generation: 0 });
            assert!(matches!(fx[0], Effect::StartLoad { .. }));
            load_starts += 1;
        }
        assert_eq!(load_starts, 3); // max_retries + 1 attempts on the primary

        let fx = m.on_event(Event::LoadSettled {
            generation: 0,
            outcome: fail("https://cdn.example/a.jpg"),
        });
        assert_eq!(m.state(), LoadState::Loading);
        assert_eq!(m.active_url(), "https://cdn.example/b.jpg");
        assert!(fx.iter().any(|e| matches!(e, Effect::StartLoad { .. })));

        let fx = m.on_event(Event::LoadSettled {
            generation: 0,
            outcome: ok("https://cdn.example/b.jpg"),
        });
        assert_eq!(m.state(), LoadState::Loaded);
        assert!(fx
            .iter()
            .any(|e| matches!(e, Effect::ReportLoaded { attempts: 4, .. })));
    }

    #[test]
    fn exhausted_retries_without_fallback_is_terminal_failure() {
        let mut m = machine_for(MediaOptions {
            src: "https://cdn.example/a.jpg".into(),
            priority: PriorityHint::Critical,
            retry: Some(crate::config::RetryOptions {
                max_retries: 1,
                ..crate::config::RetryOptions::default()
            }),
            ..MediaOptions::default()
        });
        m.start();
        m.on_event(Event::LoadSettled {
            generation: 0,
            outcome: fail("https://cdn.example/a.jpg"),
        });
        m.on_event(Event::BackoffElapsed { generation: 0 });
        let fx = m.on_event(Event::LoadSettled {
            generation: 0,
            outcome: fail("https://cdn.example/a.jpg"),
        });
        assert_eq!(m.state(), LoadState::Failed);
        assert!(fx
            .iter()
            .any(|e| matches!(e, Effect::ReportFailed { error } if error.total_attempts == 2)));
    }

    #[test]
    fn stale_generation_events_are_no_ops() {
        let mut m = machine_for(MediaOptions {
            src: "https://cdn.example/a.jpg".into(),
            mobile_src: Some("https://cdn.example/m.jpg".into()),
            priority: PriorityHint::Critical,
            ..MediaOptions::default()
        });
        m.start();
        m.on_event(Event::LoadSettled {
            generation: 0,
            outcome: fail("https://cdn.example/a.jpg"),
        });
        assert_eq!(m.state(), LoadState::Retrying);

        // Breakpoint crossing mid-retry: new generation, fresh budget.
        let fx = m.on_event(Event::WidthSettled { width: 500 });
        assert!(fx.contains(&Effect::CancelPending));
        assert_eq!(m.generation(), 1);
        assert_eq!(m.active_url(), "https://cdn.example/m.jpg");
        assert_eq!(m.state(), LoadState::Loading);

        // The old generation's backoff timer fires late: nothing happens.
        let state_before = m.state();
        let fx = m.on_event(Event::BackoffElapsed { generation: 0 });
        assert!(fx.is_empty());
        assert_eq!(m.state(), state_before);

        // And a stale load settling cannot resurrect the old source.
        let fx = m.on_event(Event::LoadSettled {
            generation: 0,
            outcome: ok("https://cdn.example/a.jpg"),
        });
        assert!(fx.is_empty());
        assert_eq!(m.active_url(), "https://cdn.example/m.jpg");
    }

    #[test]
    fn width_change_without_source_change_is_a_no_op() {
        let mut m = machine_for(MediaOptions {
            src: "https://cdn.example/a.jpg".into(),
            priority: PriorityHint::Critical,
            ..MediaOptions::default()
        });
        m.start();
        let fx = m.on_event(Event::WidthSettled { width: 900 });
        assert!(fx.is_empty());
        assert_eq!(m.generation(), 0);
    }

    #[test]
    fn breakpoint_change_after_loaded_starts_new_generation() {
        let mut m = machine_for(MediaOptions {
            src: "https://cdn.example/a.jpg".into(),
            mobile_src: Some("https://cdn.example/m.jpg".into()),
            priority: PriorityHint::Critical,
            ..MediaOptions::default()
        });
        m.start();
        m.on_event(Event::LoadSettled {
            generation: 0,
            outcome: ok("https://cdn.example/a.jpg"),
        });
        assert_eq!(m.state(), LoadState::Loaded);

        m.on_event(Event::WidthSettled { width: 400 });
        assert_eq!(m.generation(), 1);
        assert_eq!(m.state(), LoadState::Loading);
        assert_eq!(m.active_url(), "https://cdn.example/m.jpg");
    }

    #[test]
    fn breakpoint_change_after_loaded_observes_again_when_lazy() {
        let mut m = machine_for(MediaOptions {
            src: "https://cdn.example/a.jpg".into(),
            mobile_src: Some("https://cdn.example/m.jpg".into()),
            ..MediaOptions::default()
        });
        m.start();
        m.on_event(Event::ViewportNear { generation: 0 });
        m.on_event(Event::LoadSettled {
            generation: 0,
            outcome: ok("https://cdn.example/a.jpg"),
        });
        assert_eq!(m.state(), LoadState::Loaded);

        // A lazy request's new generation waits for the signal again.
        let fx = m.on_event(Event::WidthSettled { width: 500 });
        assert_eq!(m.generation(), 1);
        assert_eq!(m.state(), LoadState::Observing);
        assert!(fx.contains(&Effect::AwaitViewport { generation: 1 }));
    }

    #[test]
    fn preload_strategy_hints_once() {
        let mut m = machine_for(MediaOptions {
            src: "https://cdn.example/a.jpg".into(),
            loading_strategy: crate::priority::LoadingStrategy::Preload,
            ..MediaOptions::default()
        });
        let fx = m.start();
        assert!(fx
            .iter()
            .any(|e| matches!(e, Effect::PreloadHint { url } if url == "https://cdn.example/a.jpg")));
        // Preload implies eager: loading without observation.
        assert_eq!(m.state(), LoadState::Loading);
    }

    #[test]
    fn stagger_delay_defers_load_after_signal() {
        let mut m = machine_for(MediaOptions {
            src: "https://cdn.example/a.jpg".into(),
            load_delay_ms: Some(50),
            ..MediaOptions::default()
        });
        m.start();
        let fx = m.on_event(Event::ViewportNear { generation: 0 });
        assert_eq!(
            fx,
            vec![Effect::StartStagger {
                generation: 0,
                delay: Duration::from_millis(50),
            }]
        );
        assert_eq!(m.state(), LoadState::Observing);
        let fx = m.on_event(Event::StaggerElapsed { generation: 0 });
        assert!(matches!(fx[0], Effect::StartLoad { .. }));
        assert_eq!(m.state(), LoadState::Loading);
    }
}
