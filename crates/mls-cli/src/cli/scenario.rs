//! Scenario file model for `mls simulate`.
//!
//! A scenario is a TOML file describing a page session: the initial viewport,
//! the ambient connection, the media requests on the page, scripted load
//! outcomes per source, and a timeline of host events to replay.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use mls_core::config::MediaOptions;
use mls_core::network::{ConnectionProfile, EffectiveType};
use mls_core::platform::scripted::SourceScript;
use mls_core::viewport::ViewportSize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Initial viewport size.
    pub viewport: ViewportSize,
    /// Ambient connection at session start. Absent means unknown.
    pub connection: Option<ConnectionProfile>,
    #[serde(rename = "request")]
    pub requests: Vec<ScenarioRequest>,
    #[serde(rename = "script")]
    pub scripts: Vec<ScenarioScript>,
    #[serde(rename = "event")]
    pub events: Vec<ScenarioEvent>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            viewport: ViewportSize::default(),
            connection: None,
            requests: Vec::new(),
            scripts: Vec::new(),
            events: Vec::new(),
        }
    }
}

/// One media element on the simulated page.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioRequest {
    pub id: String,
    #[serde(flatten)]
    pub options: MediaOptions,
}

/// Scripted load behaviour for one source URL.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioScript {
    pub url: String,
    #[serde(default)]
    pub failures_before_success: u32,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub always_fail: bool,
}

impl ScenarioScript {
    pub fn to_source_script(&self) -> SourceScript {
        SourceScript {
            failures_before_success: self.failures_before_success,
            latency: Duration::from_millis(self.latency_ms),
            always_fail: self.always_fail,
        }
    }
}

/// A timed host event.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioEvent {
    /// Offset from session start, in ms.
    pub at_ms: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EventKind {
    /// The element scrolled near the viewport.
    ViewportEnter { element: String },
    /// The element left the near region again.
    ViewportLeave { element: String },
    /// The window was resized.
    Resize { width: u32, height: u32 },
    /// A pointer/key event landed on the element's container.
    Interaction { element: String },
    /// The ambient connection changed.
    ConnectionChange {
        #[serde(rename = "effective-type")]
        effective_type: EffectiveType,
        #[serde(default)]
        save_data: bool,
    },
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading scenario file {}", path.display()))?;
        let mut scenario: Scenario = toml::from_str(&data)
            .with_context(|| format!("parsing scenario file {}", path.display()))?;
        scenario.events.sort_by_key(|e| e.at_ms);
        Ok(scenario)
    }
}
