//! Per-generation retry budget: attempt counter plus fallback queue.

use std::collections::VecDeque;

/// Retry state for one generation of a media request.
///
/// Built fresh whenever a generation starts; a breakpoint change mid-retry
/// therefore never inherits a half-spent budget. Retries and fallbacks
/// strictly consume this context, so recovery always terminates.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Retries already spent on the current source.
    retries: u32,
    /// Load attempts across all sources of this generation.
    total_attempts: u32,
    /// Fallback sources not yet tried, in declaration order.
    fallbacks: VecDeque<String>,
}

impl RetryContext {
    pub fn new(fallbacks: impl IntoIterator<Item = String>) -> Self {
        Self {
            retries: 0,
            total_attempts: 0,
            fallbacks: fallbacks.into_iter().collect(),
        }
    }

    /// Retries spent on the current source so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Total load attempts this generation, including fallbacks.
    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    /// Record that a load attempt was issued.
    pub fn record_attempt(&mut self) {
        self.total_attempts = self.total_attempts.saturating_add(1);
    }

    /// Record that the orchestrator decided to retry the current source.
    pub fn record_retry(&mut self) {
        self.retries = self.retries.saturating_add(1);
    }

    /// Pop the next fallback source and reset the per-source retry counter.
    /// Returns `None` when the queue is exhausted.
    pub fn next_fallback(&mut self) -> Option<String> {
        let next = self.fallbacks.pop_front()?;
        self.retries = 0;
        Some(next)
    }

    pub fn remaining_fallbacks(&self) -> usize {
        self.fallbacks.len()
    }
}
