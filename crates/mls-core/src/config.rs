use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::network::QualityByConnection;
use crate::placeholder::PlaceholderType;
use crate::priority::{LoadingStrategy, PriorityHint};
use crate::retry::RetryPolicy;

/// Retry parameters as they appear in config files and per-request options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    pub enabled: bool,
    /// Retries per source, excluding the first attempt.
    pub max_retries: u32,
    /// Base backoff delay in ms; the n-th retry waits `retry_delay_ms * n`.
    pub retry_delay_ms: u64,
    /// Upper bound on the backoff delay in ms.
    pub max_delay_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 2,
            retry_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryOptions {
    pub fn to_policy(self) -> RetryPolicy {
        RetryPolicy {
            enabled: self.enabled,
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Global configuration loaded from `~/.config/mls/config.toml`.
///
/// These are the policy defaults the per-request options fall back to. The
/// exact values (small-image threshold, debounce delay, sampling rate) are
/// deliberately configuration, not constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Connection class to quality budget table.
    pub quality_by_connection: QualityByConnection,
    /// Both target dimensions strictly below this skip lazy-loading entirely.
    pub small_image_max_px: u32,
    /// Viewport width below which the mobile source applies.
    pub mobile_breakpoint_px: u32,
    /// Settling delay for resize/breakpoint re-evaluation, in ms.
    pub debounce_ms: u64,
    /// Delay between a positive viewport signal and the load, in ms. Used to
    /// stagger many simultaneous triggers; 0 loads immediately.
    pub stagger_ms: u64,
    /// Default cross-fade duration in ms when a request does not set one.
    pub default_fade_in_ms: u64,
    /// Fraction of telemetry events actually emitted, 0.0..=1.0.
    pub telemetry_sample_rate: f64,
    /// Minimum element area, as a fraction of the viewport, for LCP candidacy.
    pub lcp_area_fraction: f64,
    /// Default retry policy.
    pub retry: RetryOptions,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            quality_by_connection: QualityByConnection::default(),
            small_image_max_px: 100,
            mobile_breakpoint_px: 768,
            debounce_ms: 100,
            stagger_ms: 0,
            default_fade_in_ms: 300,
            telemetry_sample_rate: 0.1,
            lcp_area_fraction: 0.1,
            retry: RetryOptions::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mls")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SchedulerConfig> {
    load_from_path(&config_path()?)
}

pub fn load_from_path(path: &Path) -> Result<SchedulerConfig> {
    if !path.exists() {
        let default_cfg = SchedulerConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: SchedulerConfig = toml::from_str(&data)?;
    Ok(cfg)
}

/// An art-directed source: applies when the viewport width matches its range.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtDirectedSource {
    pub src: String,
    pub min_width: Option<u32>,
    pub max_width: Option<u32>,
}

/// Per-request option record: the full configuration surface for one media
/// element. Validated once at `MediaRequest` construction; unset fields fall
/// back to `SchedulerConfig` defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaOptions {
    /// Default source URL.
    pub src: String,
    /// Fallback chain tried, in order, once the active source is exhausted.
    /// Accepts a single string or a list.
    #[serde(deserialize_with = "one_or_many")]
    pub fallback_src: Vec<String>,
    /// Source used below the mobile breakpoint.
    pub mobile_src: Option<String>,
    /// Art-directed sources, evaluated in order before the mobile/default ones.
    pub art_direction: Vec<ArtDirectedSource>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub priority: PriorityHint,
    pub loading_strategy: LoadingStrategy,
    pub placeholder: PlaceholderType,
    /// Cross-fade duration; 0 disables the animation (reduced motion).
    pub fade_in_ms: Option<u64>,
    pub root_margin_px: Option<u32>,
    pub threshold: Option<f64>,
    /// Explicit quality, 1..=100. Combined with the network budget by `min`.
    pub quality: Option<u8>,
    pub connection_aware_quality: bool,
    pub retry: Option<RetryOptions>,
    pub track_performance: bool,
    /// Descriptive (alt) text; rendered verbatim in the failure placeholder.
    pub description: String,
    /// Extra delay between a positive viewport signal and the load.
    pub load_delay_ms: Option<u64>,
}

impl Default for MediaOptions {
    fn default() -> Self {
        Self {
            src: String::new(),
            fallback_src: Vec::new(),
            mobile_src: None,
            art_direction: Vec::new(),
            width: None,
            height: None,
            priority: PriorityHint::default(),
            loading_strategy: LoadingStrategy::default(),
            placeholder: PlaceholderType::default(),
            fade_in_ms: None,
            root_margin_px: None,
            threshold: None,
            quality: None,
            connection_aware_quality: true,
            retry: None,
            track_performance: true,
            description: String::new(),
            load_delay_ms: None,
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}
