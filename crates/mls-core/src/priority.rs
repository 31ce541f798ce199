//! Priority classification: hints in, one urgency tier out.

use serde::{Deserialize, Serialize};

/// Caller-declared priority hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityHint {
    /// Above-the-fold, render-critical media (hero images).
    Critical,
    /// Important but not render-critical.
    High,
    #[default]
    Normal,
    Low,
}

/// Loading strategy hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingStrategy {
    /// Load on mount, skip viewport observation.
    Eager,
    /// Like eager, and additionally issue a resource hint to the platform.
    Preload,
    /// Wait for viewport proximity.
    Lazy,
    /// Defer to the classifier default.
    #[default]
    Auto,
}

/// Urgency tier assigned to a request. Ordered most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyTier {
    Critical,
    Eager,
    High,
    Normal,
}

/// Derives the urgency tier. Precedence, descending: explicit critical hint,
/// eager/preload strategy, explicit high-priority flag, default normal.
pub fn classify(priority: PriorityHint, strategy: LoadingStrategy) -> UrgencyTier {
    if priority == PriorityHint::Critical {
        return UrgencyTier::Critical;
    }
    match strategy {
        LoadingStrategy::Eager | LoadingStrategy::Preload => UrgencyTier::Eager,
        LoadingStrategy::Lazy => UrgencyTier::Normal,
        LoadingStrategy::Auto => match priority {
            PriorityHint::High => UrgencyTier::High,
            _ => UrgencyTier::Normal,
        },
    }
}

/// Whether this tier loads unconditionally on mount, skipping observation.
pub fn bypasses_observation(tier: UrgencyTier) -> bool {
    matches!(tier, UrgencyTier::Critical | UrgencyTier::Eager)
}

/// Small-image exception: when both target dimensions are known and under the
/// threshold, lazy-loading overhead exceeds the benefit and the asset loads
/// immediately regardless of tier.
pub fn is_small_image(
    width: Option<u32>,
    height: Option<u32>,
    small_image_max_px: u32,
) -> bool {
    match (width, height) {
        (Some(w), Some(h)) => w < small_image_max_px && h < small_image_max_px,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_hint_wins_over_strategy() {
        assert_eq!(
            classify(PriorityHint::Critical, LoadingStrategy::Lazy),
            UrgencyTier::Critical
        );
    }

    #[test]
    fn eager_strategy_beats_priority_flag() {
        assert_eq!(
            classify(PriorityHint::High, LoadingStrategy::Eager),
            UrgencyTier::Eager
        );
        assert_eq!(
            classify(PriorityHint::Low, LoadingStrategy::Preload),
            UrgencyTier::Eager
        );
    }

    #[test]
    fn explicit_high_flag_then_default_normal() {
        assert_eq!(
            classify(PriorityHint::High, LoadingStrategy::Auto),
            UrgencyTier::High
        );
        assert_eq!(
            classify(PriorityHint::Normal, LoadingStrategy::Auto),
            UrgencyTier::Normal
        );
        assert_eq!(
            classify(PriorityHint::Low, LoadingStrategy::Lazy),
            UrgencyTier::Normal
        );
    }

    #[test]
    fn only_critical_and_eager_bypass() {
        assert!(bypasses_observation(UrgencyTier::Critical));
        assert!(bypasses_observation(UrgencyTier::Eager));
        assert!(!bypasses_observation(UrgencyTier::High));
        assert!(!bypasses_observation(UrgencyTier::Normal));
    }

    #[test]
    fn small_image_needs_both_dimensions() {
        assert!(is_small_image(Some(40), Some(40), 100));
        assert!(!is_small_image(Some(40), None, 100));
        assert!(!is_small_image(None, Some(40), 100));
        assert!(!is_small_image(Some(100), Some(40), 100));
    }
}
