//! The driver task: one per media request, the single logical owner of its
//! state machine.
//!
//! All triggering events (viewport signal, resize debounce, timers, the
//! settling platform load, caller commands) funnel through this task's select
//! loop, so transitions for one request are applied strictly in delivery
//! order. Dropping the driver releases every resource it holds: the viewport
//! subscription, pending timers, the in-flight load, and any half-built
//! measurement state.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant as TokioInstant};

use crate::error::SourceLoadError;
use crate::network::NetworkSampler;
use crate::perf::{ElementGeometry, FinalizedLoad, PerfReporter};
use crate::platform::{BoxFuture, LoadRequest, LoadedResource, ResourceLoader};
use crate::request::LoadState;
use crate::viewport::{ViewportSize, ViewportSubscription};

use super::machine::{Effect, Event, Machine};

/// Caller commands delivered through the handle.
#[derive(Debug)]
pub(crate) enum Command {
    /// A pointer/key event was observed on the element's container.
    Interaction,
    /// Unmount: tear everything down.
    Dispose,
}

/// State shared between the driver and the handle.
pub(crate) struct Shared {
    pub(crate) active_src: Mutex<String>,
}

#[derive(Debug, Clone, Copy)]
enum TimerKind {
    Stagger,
    Backoff,
}

enum Wake {
    Command(Option<Command>),
    WidthChanged(bool),
    ViewportNear(bool),
    LoadSettled(Result<LoadedResource, SourceLoadError>),
    TimerFired,
    DebounceFired,
}

pub(crate) struct Driver {
    pub(crate) machine: Machine,
    pub(crate) loader: Arc<dyn ResourceLoader>,
    pub(crate) sampler: Arc<NetworkSampler>,
    pub(crate) reporter: Arc<PerfReporter>,
    pub(crate) viewport_rx: watch::Receiver<ViewportSize>,
    pub(crate) settle_delay: Duration,
    /// Held for the driver's whole lifetime: a breakpoint change after a
    /// terminal state starts a new generation that observes again. The watch
    /// channel retains the last signal, so an already-fired trigger-once
    /// observation resolves immediately for the new generation.
    pub(crate) sub: Option<ViewportSubscription>,
    pub(crate) state_tx: watch::Sender<LoadState>,
    pub(crate) shared: Arc<Shared>,
}

impl Driver {
    pub(crate) async fn run(self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        let Driver {
            mut machine,
            loader,
            sampler,
            reporter,
            mut viewport_rx,
            settle_delay,
            mut sub,
            state_tx,
            shared,
        } = self;

        // Pending asynchronous work for the current generation.
        let mut awaiting: Option<u64> = None;
        let mut timer: Option<(TimerKind, u64, TokioInstant)> = None;
        let mut load: Option<(u64, BoxFuture<Result<LoadedResource, SourceLoadError>>)> = None;
        let mut pending_width: Option<(u32, TokioInstant)> = None;
        let mut loading_since: Option<(u64, Instant)> = None;
        let mut interaction_start: Option<Instant> = None;
        let mut watch_width = true;

        let fx = machine.start();
        exec_effects(
            fx,
            &machine,
            &loader,
            &sampler,
            &reporter,
            &viewport_rx,
            &shared,
            &mut awaiting,
            &mut timer,
            &mut load,
            &mut loading_since,
            interaction_start,
        );
        state_tx.send_replace(machine.state());

        loop {
            // Branch guards, hoisted so the select arms can borrow the
            // corresponding state mutably.
            let load_in_flight = load.is_some();
            let awaiting_signal = awaiting.is_some() && sub.is_some();
            let timer_armed = timer.is_some();
            let width_pending = pending_width.is_some();
            let timer_deadline = timer.map_or_else(TokioInstant::now, |(_, _, d)| d);
            let debounce_deadline = pending_width.map_or_else(TokioInstant::now, |(_, d)| d);

            let wake = tokio::select! {
                biased;
                cmd = cmd_rx.recv() => Wake::Command(cmd),
                res = viewport_rx.changed(), if watch_width => Wake::WidthChanged(res.is_ok()),
                outcome = async {
                    (&mut load.as_mut().expect("branch guarded on load").1).await
                }, if load_in_flight => Wake::LoadSettled(outcome),
                near = async {
                    match sub.as_mut() {
                        Some(s) => s.near().await,
                        None => false,
                    }
                }, if awaiting_signal => Wake::ViewportNear(near),
                _ = sleep_until(timer_deadline), if timer_armed => Wake::TimerFired,
                _ = sleep_until(debounce_deadline), if width_pending => Wake::DebounceFired,
            };

            let event = match wake {
                Wake::Command(Some(Command::Interaction)) => {
                    interaction_start.get_or_insert_with(Instant::now);
                    continue;
                }
                Wake::Command(Some(Command::Dispose)) | Wake::Command(None) => break,
                Wake::WidthChanged(ok) => {
                    if !ok {
                        // Scheduler went away; stop watching resizes.
                        watch_width = false;
                        continue;
                    }
                    let width = viewport_rx.borrow().width;
                    // Restart the settling delay on every change so a
                    // continuous resize produces a single re-evaluation.
                    pending_width = Some((width, TokioInstant::now() + settle_delay));
                    continue;
                }
                Wake::ViewportNear(near) => {
                    let Some(generation) = awaiting.take() else {
                        continue;
                    };
                    if !near {
                        continue;
                    }
                    Event::ViewportNear { generation }
                }
                Wake::LoadSettled(outcome) => {
                    let (generation, _) = load.take().expect("load was in flight");
                    Event::LoadSettled { generation, outcome }
                }
                Wake::TimerFired => {
                    let (kind, generation, _) = timer.take().expect("timer was armed");
                    match kind {
                        TimerKind::Stagger => Event::StaggerElapsed { generation },
                        TimerKind::Backoff => Event::BackoffElapsed { generation },
                    }
                }
                Wake::DebounceFired => {
                    let (width, _) = pending_width.take().expect("debounce was pending");
                    Event::WidthSettled { width }
                }
            };

            let fx = machine.on_event(event);
            exec_effects(
                fx,
                &machine,
                &loader,
                &sampler,
                &reporter,
                &viewport_rx,
                &shared,
                &mut awaiting,
                &mut timer,
                &mut load,
                &mut loading_since,
                interaction_start,
            );
            state_tx.send_replace(machine.state());
        }

        // Teardown: the subscription drop releases the observation; pending
        // timers, the in-flight load, and measurement state die with us.
        drop(sub);
        tracing::debug!(id = %machine.request().id, "request driver disposed");
    }
}

#[allow(clippy::too_many_arguments)]
fn exec_effects(
    fx: Vec<Effect>,
    machine: &Machine,
    loader: &Arc<dyn ResourceLoader>,
    sampler: &NetworkSampler,
    reporter: &PerfReporter,
    viewport_rx: &watch::Receiver<ViewportSize>,
    shared: &Shared,
    awaiting: &mut Option<u64>,
    timer: &mut Option<(TimerKind, u64, TokioInstant)>,
    load: &mut Option<(u64, BoxFuture<Result<LoadedResource, SourceLoadError>>)>,
    loading_since: &mut Option<(u64, Instant)>,
    interaction_start: Option<Instant>,
) {
    for effect in fx {
        match effect {
            Effect::AwaitViewport { generation } => {
                *awaiting = Some(generation);
            }
            Effect::StartStagger { generation, delay } => {
                *timer = Some((
                    TimerKind::Stagger,
                    generation,
                    TokioInstant::now() + delay,
                ));
            }
            Effect::StartBackoff { generation, delay } => {
                *timer = Some((
                    TimerKind::Backoff,
                    generation,
                    TokioInstant::now() + delay,
                ));
            }
            Effect::StartLoad { generation, url } => {
                let request = machine.request();
                let quality = sampler
                    .effective_quality(request.quality, request.connection_aware_quality);
                if loading_since.map(|(g, _)| g) != Some(generation) {
                    *loading_since = Some((generation, Instant::now()));
                }
                *shared.active_src.lock().unwrap() = url.clone();
                let fut = loader.load(LoadRequest {
                    request_id: request.id.clone(),
                    url,
                    quality,
                    width: request.width,
                    height: request.height,
                });
                *load = Some((generation, fut));
            }
            Effect::PreloadHint { url } => loader.hint(&url),
            Effect::CancelPending => {
                *timer = None;
                *load = None;
                *awaiting = None;
                *loading_since = None;
            }
            Effect::ReportLoaded {
                generation,
                resource,
                attempts,
            } => {
                let request = machine.request();
                if request.track_performance {
                    let started = loading_since
                        .filter(|(g, _)| *g == generation)
                        .map(|(_, at)| at)
                        .unwrap_or_else(Instant::now);
                    let geometry = request
                        .width
                        .zip(request.height)
                        .map(|(width, height)| ElementGeometry { width, height });
                    reporter.finalize_load(&FinalizedLoad {
                        request_id: &request.id,
                        source_url: &resource.url,
                        tier: request.tier,
                        generation,
                        attempts,
                        started,
                        completed: Instant::now(),
                        interaction_start,
                        geometry,
                        viewport: *viewport_rx.borrow(),
                    });
                }
            }
            Effect::ReportFailed { error } => {
                let request = machine.request();
                tracing::warn!(id = %request.id, %error, "media request failed");
                if request.track_performance {
                    reporter.report_failure(
                        &request.id,
                        request.tier,
                        machine.generation(),
                        &error,
                    );
                }
            }
        }
    }
}
