use std::time::Duration;

/// Decision returned by the retry policy for a failed load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this source again.
    NoRetry,
    /// Retry the same source after the given delay.
    RetryAfter(Duration),
}

/// Linear backoff policy for re-loading a failed source.
///
/// `max_retries` counts retries, not attempts: a source is loaded at most
/// `max_retries + 1` times before the orchestrator moves to a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Master switch; disabled means a single attempt per source.
    pub enabled: bool,
    /// Maximum retries per source (excluding the first attempt).
    pub max_retries: u32,
    /// Base delay; the n-th retry waits `base_delay * n`.
    pub base_delay: Duration,
    /// Upper bound on the backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after a failure. `retries_so_far` is the number of
    /// retries already spent on the current source (0 after the first failure).
    pub fn decide(&self, retries_so_far: u32) -> RetryDecision {
        if !self.enabled || retries_so_far >= self.max_retries {
            return RetryDecision::NoRetry;
        }
        // Linear backoff: base * attempt number of the upcoming retry.
        let n = retries_so_far.saturating_add(1);
        let raw = self.base_delay.saturating_mul(n);
        RetryDecision::RetryAfter(raw.min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_policy_never_retries() {
        let p = RetryPolicy {
            enabled: false,
            ..RetryPolicy::default()
        };
        assert_eq!(p.decide(0), RetryDecision::NoRetry);
    }

    #[test]
    fn linear_backoff_grows_and_is_capped() {
        let p = RetryPolicy {
            enabled: true,
            max_retries: 20,
            base_delay: Duration::from_millis(400),
            max_delay: Duration::from_secs(1),
        };
        assert_eq!(
            p.decide(0),
            RetryDecision::RetryAfter(Duration::from_millis(400))
        );
        assert_eq!(
            p.decide(1),
            RetryDecision::RetryAfter(Duration::from_millis(800))
        );
        // Third retry would be 1200ms, capped at 1s.
        assert_eq!(
            p.decide(2),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );
    }

    #[test]
    fn respects_max_retries() {
        let p = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };
        assert!(matches!(p.decide(0), RetryDecision::RetryAfter(_)));
        assert!(matches!(p.decide(1), RetryDecision::RetryAfter(_)));
        assert_eq!(p.decide(2), RetryDecision::NoRetry);
    }
}
