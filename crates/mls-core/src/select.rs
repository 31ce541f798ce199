//! Active source selection from a request's ordered candidate list.

use std::time::Duration;

use crate::request::{Applicability, CandidateSource};

/// Selects the active source for the current viewport width.
///
/// Precedence: first art-directed candidate whose condition matches, then the
/// mobile variant when below the breakpoint, then the default. The candidate
/// list is already ordered that way, so selection is a first-match scan.
/// Re-evaluation on resize is debounced by the orchestrator using
/// `settle_delay` so continuous resizes do not thrash generations.
#[derive(Debug, Clone, Copy)]
pub struct SourceSelector {
    pub mobile_breakpoint_px: u32,
    pub settle_delay: Duration,
}

impl SourceSelector {
    pub fn new(mobile_breakpoint_px: u32, settle_delay: Duration) -> Self {
        Self {
            mobile_breakpoint_px,
            settle_delay,
        }
    }

    /// Exactly one active source. `candidates` must be non-empty and end with
    /// a default entry, which `MediaRequest` construction guarantees.
    pub fn select<'a>(
        &self,
        candidates: &'a [CandidateSource],
        viewport_width: u32,
    ) -> &'a CandidateSource {
        for candidate in candidates {
            let applies = match candidate.applies {
                Applicability::Condition(cond) => cond.matches(viewport_width),
                Applicability::Mobile => viewport_width < self.mobile_breakpoint_px,
                Applicability::Default => true,
            };
            if applies {
                return candidate;
            }
        }
        // Unreachable with a well-formed list; the last entry is the default.
        candidates
            .last()
            .expect("candidate list must not be empty")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::MediaCondition;

    fn candidates() -> Vec<CandidateSource> {
        vec![
            CandidateSource {
                url: "wide.avif".into(),
                applies: Applicability::Condition(MediaCondition {
                    min_width: Some(1440),
                    max_width: None,
                }),
            },
            CandidateSource {
                url: "mobile.avif".into(),
                applies: Applicability::Mobile,
            },
            CandidateSource {
                url: "default.avif".into(),
                applies: Applicability::Default,
            },
        ]
    }

    fn selector() -> SourceSelector {
        SourceSelector::new(768, Duration::from_millis(100))
    }

    #[test]
    fn art_direction_wins_when_condition_matches() {
        let c = candidates();
        assert_eq!(selector().select(&c, 1920).url, "wide.avif");
    }

    #[test]
    fn mobile_applies_below_breakpoint() {
        let c = candidates();
        assert_eq!(selector().select(&c, 400).url, "mobile.avif");
    }

    #[test]
    fn default_otherwise() {
        let c = candidates();
        assert_eq!(selector().select(&c, 1024).url, "default.avif");
    }

    #[test]
    fn breakpoint_is_exclusive() {
        let c = candidates();
        assert_eq!(selector().select(&c, 768).url, "default.avif");
        assert_eq!(selector().select(&c, 767).url, "mobile.avif");
    }
}
