//! Load orchestration: the scheduler core.
//!
//! One `Scheduler` per page/session owns the shared services (viewport
//! watcher, network sampler, performance reporter, platform loader) and
//! spawns one driver task per registered media request. The driver is the
//! only mutator of its request's state machine, so transitions are applied
//! strictly in event-delivery order; independent requests are fully
//! independent. The machinery is cooperative and runs fine on a
//! current-thread runtime.

mod driver;
mod handle;
mod machine;
mod trace;


pub use handle::MediaHandle;
pub use trace::{TransitionRecord, TransitionTrace};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::config::{MediaOptions, SchedulerConfig};
use crate::error::OptionsError;
use crate::network::NetworkSampler;
use crate::perf::{HashRatioSampler, PerfReporter, TracingTransport};
use crate::platform::ResourceLoader;
use crate::request::{LoadState, MediaRequest};
use crate::select::SourceSelector;
use crate::viewport::{ViewportSize, ViewportWatcher};

use self::driver::{Driver, Shared};
use self::machine::Machine;

/// Session-wide scheduler service.
pub struct Scheduler {
    cfg: SchedulerConfig,
    loader: Arc<dyn ResourceLoader>,
    sampler: Arc<NetworkSampler>,
    reporter: Arc<PerfReporter>,
    watcher: Arc<ViewportWatcher>,
    viewport_tx: watch::Sender<ViewportSize>,
}

impl Scheduler {
    pub fn new(
        cfg: SchedulerConfig,
        loader: Arc<dyn ResourceLoader>,
        sampler: Arc<NetworkSampler>,
        reporter: Arc<PerfReporter>,
        watcher: Arc<ViewportWatcher>,
        viewport: ViewportSize,
    ) -> Self {
        let (viewport_tx, _) = watch::channel(viewport);
        Self {
            cfg,
            loader,
            sampler,
            reporter,
            watcher,
            viewport_tx,
        }
    }

    /// Production reporting wiring: hash-ratio sampling at the configured
    /// rate, records emitted as JSON lines through the tracing transport.
    pub fn with_default_reporting(
        cfg: SchedulerConfig,
        loader: Arc<dyn ResourceLoader>,
        sampler: Arc<NetworkSampler>,
        watcher: Arc<ViewportWatcher>,
        viewport: ViewportSize,
    ) -> Self {
        let reporter = Arc::new(PerfReporter::new(
            cfg.telemetry_sample_rate,
            cfg.lcp_area_fraction,
            Arc::new(HashRatioSampler),
            Arc::new(TracingTransport),
        ));
        Self::new(cfg, loader, sampler, reporter, watcher, viewport)
    }

    /// Register a media element. Validates the options once, registers a
    /// viewport observation when the urgency tier requires one, and spawns
    /// the request's driver task.
    pub fn register(&self, id: &str, opts: &MediaOptions) -> Result<MediaHandle, OptionsError> {
        let request = MediaRequest::from_options(id, opts, &self.cfg)?;
        let selector = SourceSelector::new(
            self.cfg.mobile_breakpoint_px,
            Duration::from_millis(self.cfg.debounce_ms),
        );
        let trace = TransitionTrace::new();
        let width = self.viewport_tx.borrow().width;
        let machine = Machine::new(request.clone(), selector, trace.clone(), width);

        let sub = if request.skips_observation() {
            None
        } else {
            Some(self.watcher.observe(id, request.observe))
        };

        let shared = Arc::new(Shared {
            active_src: Mutex::new(machine.active_url().to_string()),
        });
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LoadState::Pending);

        let driver = Driver {
            machine,
            loader: Arc::clone(&self.loader),
            sampler: Arc::clone(&self.sampler),
            reporter: Arc::clone(&self.reporter),
            viewport_rx: self.viewport_tx.subscribe(),
            settle_delay: Duration::from_millis(self.cfg.debounce_ms),
            sub,
            state_tx,
            shared: Arc::clone(&shared),
        };
        let join = tokio::spawn(driver.run(cmd_rx));

        tracing::debug!(id, tier = ?request.tier, "registered media request");
        Ok(MediaHandle {
            request,
            cmd_tx,
            state_rx,
            trace,
            shared,
            join: Some(join),
        })
    }

    /// Host resize notification. Source re-selection is debounced per
    /// request by the configured settling delay.
    pub fn set_viewport(&self, viewport: ViewportSize) {
        self.viewport_tx.send_replace(viewport);
    }

    pub fn viewport(&self) -> ViewportSize {
        *self.viewport_tx.borrow()
    }

    /// Host connection-change notification: invalidates the cached profile.
    pub fn connection_changed(&self) {
        self.sampler.invalidate();
    }

    pub fn watcher(&self) -> &Arc<ViewportWatcher> {
        &self.watcher
    }

    pub fn sampler(&self) -> &Arc<NetworkSampler> {
        &self.sampler
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.cfg
    }
}
