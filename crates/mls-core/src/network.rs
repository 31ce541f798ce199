//! Network condition sampling and quality budgets.
//!
//! The sampler reads ambient connection metadata through an injectable
//! source, caches the resulting profile for the session, and maps it to a
//! quality budget. Re-sampling happens only on an explicit connection-change
//! notification (`invalidate`), since per-request sampling would be wasteful.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Quality used when no explicit quality is given and connection-aware
/// bounding is disabled.
pub const DEFAULT_QUALITY: u8 = 75;

/// Effective connection class, as reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

/// Snapshot of ambient connection metadata.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub effective_type: EffectiveType,
    /// Estimated downlink bandwidth in Mbit/s (0.0 when unknown).
    #[serde(default)]
    pub downlink_mbps: f64,
    /// Estimated round-trip time in milliseconds (0 when unknown).
    #[serde(default)]
    pub rtt_ms: u32,
    /// User opted into reduced data usage.
    #[serde(default)]
    pub save_data: bool,
}

impl ConnectionProfile {
    /// Neutral profile used when connection metadata is unavailable.
    pub fn unknown() -> Self {
        Self {
            effective_type: EffectiveType::Unknown,
            downlink_mbps: 0.0,
            rtt_ms: 0,
            save_data: false,
        }
    }
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Connection class to quality budget mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityByConnection {
    pub slow_2g: u8,
    pub cell_2g: u8,
    pub cell_3g: u8,
    pub cell_4g: u8,
    pub unknown: u8,
}

impl Default for QualityByConnection {
    fn default() -> Self {
        Self {
            slow_2g: 30,
            cell_2g: 50,
            cell_3g: 70,
            cell_4g: 80,
            unknown: 75,
        }
    }
}

impl QualityByConnection {
    /// Budget for a profile. The save-data flag clamps to the slow-2g value.
    pub fn budget_for(&self, profile: &ConnectionProfile) -> u8 {
        let by_type = match profile.effective_type {
            EffectiveType::Slow2g => self.slow_2g,
            EffectiveType::TwoG => self.cell_2g,
            EffectiveType::ThreeG => self.cell_3g,
            EffectiveType::FourG => self.cell_4g,
            EffectiveType::Unknown => self.unknown,
        };
        if profile.save_data {
            by_type.min(self.slow_2g)
        } else {
            by_type
        }
    }
}

/// Host seam for reading connection metadata. Returning `None` means the
/// platform exposes nothing; the sampler degrades to the unknown profile.
pub trait ConnectionInfoSource: Send + Sync {
    fn sample(&self) -> Option<ConnectionProfile>;
}

/// Session-wide sampler with a cached profile.
pub struct NetworkSampler {
    source: Arc<dyn ConnectionInfoSource>,
    table: QualityByConnection,
    cached: RwLock<Option<ConnectionProfile>>,
}

impl NetworkSampler {
    pub fn new(source: Arc<dyn ConnectionInfoSource>, table: QualityByConnection) -> Self {
        Self {
            source,
            table,
            cached: RwLock::new(None),
        }
    }

    /// Best-available profile; sampled lazily, then served from cache.
    pub fn profile(&self) -> ConnectionProfile {
        if let Some(p) = *self.cached.read().unwrap() {
            return p;
        }
        let sampled = self.source.sample().unwrap_or_else(ConnectionProfile::unknown);
        *self.cached.write().unwrap() = Some(sampled);
        tracing::debug!(?sampled.effective_type, "sampled connection profile");
        sampled
    }

    /// Drop the cached profile; the next `profile()` call re-samples. Call on
    /// an explicit connection-change notification from the host.
    pub fn invalidate(&self) {
        *self.cached.write().unwrap() = None;
    }

    /// Network-derived quality budget for the current profile.
    pub fn quality_budget(&self) -> u8 {
        self.table.budget_for(&self.profile())
    }

    /// Effective quality for a request.
    ///
    /// With connection-aware bounding the explicit quality is combined with
    /// the network budget by taking the minimum: never serve higher quality
    /// than the network warrants. Without it the explicit quality (or the
    /// default) is used as-is.
    pub fn effective_quality(&self, explicit: Option<u8>, connection_aware: bool) -> u8 {
        if !connection_aware {
            return explicit.unwrap_or(DEFAULT_QUALITY);
        }
        let budget = self.quality_budget();
        match explicit {
            Some(q) => q.min(budget),
            None => budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<ConnectionProfile>);

    impl ConnectionInfoSource for Fixed {
        fn sample(&self) -> Option<ConnectionProfile> {
            self.0
        }
    }

    fn profile(effective_type: EffectiveType) -> ConnectionProfile {
        ConnectionProfile {
            effective_type,
            ..ConnectionProfile::unknown()
        }
    }

    #[test]
    fn missing_metadata_yields_unknown_profile() {
        let sampler = NetworkSampler::new(Arc::new(Fixed(None)), QualityByConnection::default());
        assert_eq!(sampler.profile(), ConnectionProfile::unknown());
        assert_eq!(sampler.quality_budget(), 75);
    }

    #[test]
    fn explicit_quality_is_bounded_by_network_budget() {
        let sampler = NetworkSampler::new(
            Arc::new(Fixed(Some(profile(EffectiveType::TwoG)))),
            QualityByConnection::default(),
        );
        // 2g maps to 50; any explicit value >= 50 is clamped to it.
        assert_eq!(sampler.effective_quality(Some(90), true), 50);
        assert_eq!(sampler.effective_quality(Some(50), true), 50);
        // Below the bound, the explicit value wins.
        assert_eq!(sampler.effective_quality(Some(35), true), 35);
        // No explicit value: the budget itself.
        assert_eq!(sampler.effective_quality(None, true), 50);
    }

    #[test]
    fn bounding_disabled_uses_explicit_or_default() {
        let sampler = NetworkSampler::new(
            Arc::new(Fixed(Some(profile(EffectiveType::Slow2g)))),
            QualityByConnection::default(),
        );
        assert_eq!(sampler.effective_quality(Some(90), false), 90);
        assert_eq!(sampler.effective_quality(None, false), DEFAULT_QUALITY);
    }

    #[test]
    fn save_data_clamps_to_slow_2g_budget() {
        let p = ConnectionProfile {
            effective_type: EffectiveType::FourG,
            save_data: true,
            ..ConnectionProfile::unknown()
        };
        assert_eq!(QualityByConnection::default().budget_for(&p), 30);
    }

    #[test]
    fn profile_is_cached_until_invalidated() {
        struct Counting(std::sync::atomic::AtomicU32);

        impl ConnectionInfoSource for Counting {
            fn sample(&self) -> Option<ConnectionProfile> {
                self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                Some(ConnectionProfile::unknown())
            }
        }

        let source = Arc::new(Counting(std::sync::atomic::AtomicU32::new(0)));
        let sampler = NetworkSampler::new(
            Arc::clone(&source) as Arc<dyn ConnectionInfoSource>,
            QualityByConnection::default(),
        );
        sampler.profile();
        sampler.profile();
        assert_eq!(source.0.load(std::sync::atomic::Ordering::Relaxed), 1);
        sampler.invalidate();
        sampler.profile();
        assert_eq!(source.0.load(std::sync::atomic::Ordering::Relaxed), 2);
    }
}
