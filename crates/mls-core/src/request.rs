//! Media request data model: candidate sources, load states, validated
//! per-element configuration.

use std::fmt;
use std::time::Duration;

use crate::config::{MediaOptions, SchedulerConfig};
use crate::error::OptionsError;
use crate::placeholder::PlaceholderType;
use crate::priority::{self, LoadingStrategy, UrgencyTier};
use crate::retry::RetryPolicy;
use crate::viewport::ObserveOptions;

/// Lifecycle state of one generation of a media request.
///
/// `Loaded` and `Failed` are terminal within a generation; a breakpoint
/// change that alters the selected source starts a fresh generation at
/// `Pending` instead of mutating a finished one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Initial state, before the load path is decided.
    Pending,
    /// Waiting on a positive viewport signal.
    Observing,
    /// A platform load of the active source is in flight.
    Loading,
    /// A load failed; waiting out the backoff before re-trying the source.
    Retrying,
    /// Retries exhausted; substituting the next fallback source.
    Fallback,
    /// Terminal success.
    Loaded,
    /// Terminal failure: retries and fallbacks exhausted.
    Failed,
}

impl LoadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Loaded | LoadState::Failed)
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadState::Pending => "pending",
            LoadState::Observing => "observing",
            LoadState::Loading => "loading",
            LoadState::Retrying => "retrying",
            LoadState::Fallback => "fallback",
            LoadState::Loaded => "loaded",
            LoadState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Viewport-width range predicate for an art-directed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaCondition {
    pub min_width: Option<u32>,
    pub max_width: Option<u32>,
}

impl MediaCondition {
    pub fn matches(&self, viewport_width: u32) -> bool {
        if let Some(min) = self.min_width {
            if viewport_width < min {
                return false;
            }
        }
        if let Some(max) = self.max_width {
            if viewport_width > max {
                return false;
            }
        }
        true
    }
}

/// When a candidate source applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    /// Art-directed: applies when the width condition matches.
    Condition(MediaCondition),
    /// Mobile variant: applies below the configured breakpoint.
    Mobile,
    /// Applies unconditionally, with the lowest precedence.
    Default,
}

/// One candidate source with its applicability predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSource {
    pub url: String,
    pub applies: Applicability,
}

/// A validated media request: the immutable configuration for one rendered
/// media element. Owned by the component instance that created it and
/// destroyed when that instance unmounts.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub id: String,
    /// Ordered candidates: art-directed first, then mobile, then default.
    pub candidates: Vec<CandidateSource>,
    /// Fallback chain consumed by the retry context, in order.
    pub fallbacks: Vec<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub tier: UrgencyTier,
    pub strategy: LoadingStrategy,
    pub quality: Option<u8>,
    pub connection_aware_quality: bool,
    pub retry: RetryPolicy,
    pub placeholder: PlaceholderType,
    pub fade_in: Duration,
    pub observe: ObserveOptions,
    pub description: String,
    pub track_performance: bool,
    /// Stagger delay applied between a positive viewport signal and the load.
    pub load_delay: Duration,
    /// Small-image exception applies: load immediately regardless of tier.
    pub small_image: bool,
}

impl MediaRequest {
    /// Validate `opts` against `cfg` and build the request. All option
    /// validation happens here, once, rather than ad hoc downstream.
    pub fn from_options(
        id: impl Into<String>,
        opts: &MediaOptions,
        cfg: &SchedulerConfig,
    ) -> Result<Self, OptionsError> {
        let id = id.into();
        if id.is_empty() {
            return Err(OptionsError::EmptyId);
        }
        if opts.src.is_empty() {
            return Err(OptionsError::NoSources);
        }
        validate_src(&opts.src)?;
        for s in &opts.fallback_src {
            validate_src(s)?;
        }
        if let Some(m) = &opts.mobile_src {
            validate_src(m)?;
        }
        if let Some(q) = opts.quality {
            if q == 0 || q > 100 {
                return Err(OptionsError::QualityOutOfRange(q));
            }
        }
        if let Some(t) = opts.threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(OptionsError::ThresholdOutOfRange(t));
            }
        }

        let mut candidates = Vec::new();
        for art in &opts.art_direction {
            validate_src(&art.src)?;
            candidates.push(CandidateSource {
                url: art.src.clone(),
                applies: Applicability::Condition(MediaCondition {
                    min_width: art.min_width,
                    max_width: art.max_width,
                }),
            });
        }
        if let Some(m) = &opts.mobile_src {
            candidates.push(CandidateSource {
                url: m.clone(),
                applies: Applicability::Mobile,
            });
        }
        candidates.push(CandidateSource {
            url: opts.src.clone(),
            applies: Applicability::Default,
        });

        let tier = priority::classify(opts.priority, opts.loading_strategy);
        let small_image =
            priority::is_small_image(opts.width, opts.height, cfg.small_image_max_px);

        let mut observe = ObserveOptions::default();
        if let Some(m) = opts.root_margin_px {
            observe.root_margin_px = m;
        }
        if let Some(t) = opts.threshold {
            observe.threshold = t;
        }

        Ok(Self {
            id,
            candidates,
            fallbacks: opts.fallback_src.clone(),
            width: opts.width,
            height: opts.height,
            tier,
            strategy: opts.loading_strategy,
            quality: opts.quality,
            connection_aware_quality: opts.connection_aware_quality,
            retry: opts.retry.unwrap_or(cfg.retry).to_policy(),
            placeholder: opts.placeholder,
            fade_in: Duration::from_millis(opts.fade_in_ms.unwrap_or(cfg.default_fade_in_ms)),
            observe,
            description: opts.description.clone(),
            track_performance: opts.track_performance,
            load_delay: Duration::from_millis(opts.load_delay_ms.unwrap_or(cfg.stagger_ms)),
            small_image,
        })
    }

    /// Whether this request loads unconditionally on mount.
    pub fn skips_observation(&self) -> bool {
        priority::bypasses_observation(self.tier) || self.small_image
    }
}

/// Accept absolute URLs and site-relative paths; reject anything else.
fn validate_src(src: &str) -> Result<(), OptionsError> {
    if src.is_empty() {
        return Err(OptionsError::NoSources);
    }
    match url::Url::parse(src) {
        Ok(_) => Ok(()),
        // Site-relative sources ("/images/hero.avif") are resolved by the host.
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(()),
        Err(source) => Err(OptionsError::InvalidUrl {
            url: src.to_string(),
            source,
        }),
    }
}
