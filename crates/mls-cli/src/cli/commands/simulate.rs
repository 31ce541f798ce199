//! `mls simulate` – replay a scenario file against the scheduler.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{sleep_until, timeout_at, Instant};

use mls_core::config::SchedulerConfig;
use mls_core::network::{ConnectionInfoSource, ConnectionProfile, NetworkSampler};
use mls_core::orchestrator::{MediaHandle, Scheduler};
use mls_core::perf::{AlwaysSample, PerfReporter, TelemetryTransport};
use mls_core::platform::scripted::{CollectingTransport, ScriptedLoader};
use mls_core::platform::ResourceLoader;
use mls_core::viewport::{ViewportSize, ViewportWatcher};

use crate::cli::scenario::{EventKind, Scenario};

/// Connection source whose profile can be swapped mid-session by a
/// connection-change event.
struct SessionConnection(Mutex<Option<ConnectionProfile>>);

impl ConnectionInfoSource for SessionConnection {
    fn sample(&self) -> Option<ConnectionProfile> {
        *self.0.lock().unwrap()
    }
}

pub async fn run_simulate(
    cfg: &SchedulerConfig,
    path: &Path,
    settle_ms: u64,
    json: bool,
) -> Result<()> {
    let scenario = Scenario::load(path)?;

    let loader = Arc::new(ScriptedLoader::new());
    for script in &scenario.scripts {
        loader.script(&script.url, script.to_source_script());
    }

    let connection = Arc::new(SessionConnection(Mutex::new(scenario.connection)));
    let sampler = Arc::new(NetworkSampler::new(
        Arc::clone(&connection) as Arc<dyn ConnectionInfoSource>,
        cfg.quality_by_connection,
    ));
    let transport = Arc::new(CollectingTransport::new());
    // Sampling is forced to 1.0 in the simulator so the report is complete.
    let reporter = Arc::new(PerfReporter::new(
        1.0,
        cfg.lcp_area_fraction,
        Arc::new(AlwaysSample),
        Arc::clone(&transport) as Arc<dyn TelemetryTransport>,
    ));
    let watcher = Arc::new(ViewportWatcher::new(true));
    let scheduler = Scheduler::new(
        cfg.clone(),
        Arc::clone(&loader) as Arc<dyn ResourceLoader>,
        sampler,
        reporter,
        Arc::clone(&watcher),
        scenario.viewport,
    );

    let mut handles: Vec<MediaHandle> = Vec::with_capacity(scenario.requests.len());
    for req in &scenario.requests {
        let handle = scheduler.register(&req.id, &req.options)?;
        handles.push(handle);
    }

    let start = Instant::now();
    for event in &scenario.events {
        sleep_until(start + Duration::from_millis(event.at_ms)).await;
        match &event.kind {
            EventKind::ViewportEnter { element } => watcher.notify(element, true),
            EventKind::ViewportLeave { element } => watcher.notify(element, false),
            EventKind::Resize { width, height } => scheduler.set_viewport(ViewportSize {
                width: *width,
                height: *height,
            }),
            EventKind::Interaction { element } => {
                if let Some(handle) = handles.iter().find(|h| h.id() == *element) {
                    handle.notify_interaction();
                }
            }
            EventKind::ConnectionChange {
                effective_type,
                save_data,
            } => {
                *connection.0.lock().unwrap() = Some(ConnectionProfile {
                    effective_type: *effective_type,
                    save_data: *save_data,
                    ..ConnectionProfile::unknown()
                });
                scheduler.connection_changed();
            }
        }
    }

    // Give in-flight requests a bounded window to settle; requests still
    // observing (never entered the viewport) are reported as-is.
    let deadline = Instant::now() + Duration::from_millis(settle_ms);
    for handle in &mut handles {
        let _ = timeout_at(deadline, handle.wait_terminal()).await;
    }

    for handle in &handles {
        println!(
            "request {}: {} ({})",
            handle.id(),
            handle.state(),
            handle.active_src()
        );
        let mut by_generation: BTreeMap<u64, Vec<String>> = BTreeMap::new();
        for record in handle.trace() {
            by_generation
                .entry(record.generation)
                .or_default()
                .push(record.to.to_string());
        }
        for (generation, states) in by_generation {
            println!("  gen {}: {}", generation, states.join(" -> "));
        }
    }

    let records = transport.records();
    if records.is_empty() {
        println!("no telemetry emitted");
    } else if json {
        for record in &records {
            println!("{}", serde_json::to_string(record)?);
        }
    } else {
        println!("{:<12} {:>10} {:<16} {}", "METRIC", "VALUE", "ID", "SOURCE");
        for record in &records {
            println!(
                "{:<12} {:>10.1} {:<16} {}",
                record.name, record.value, record.id, record.attribution.source
            );
        }
    }

    Ok(())
}
