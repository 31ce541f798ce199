//! Ordered record of state transitions, shared between driver and handle.

use std::sync::{Arc, Mutex};

use crate::request::LoadState;

/// One applied transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRecord {
    /// Generation the transition belongs to.
    pub generation: u64,
    pub from: LoadState,
    pub to: LoadState,
}

/// Shared, append-only transition log for one media request.
#[derive(Debug, Clone, Default)]
pub struct TransitionTrace {
    inner: Arc<Mutex<Vec<TransitionRecord>>>,
}

impl TransitionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, generation: u64, from: LoadState, to: LoadState) {
        self.inner
            .lock()
            .unwrap()
            .push(TransitionRecord { generation, from, to });
    }

    pub fn snapshot(&self) -> Vec<TransitionRecord> {
        self.inner.lock().unwrap().clone()
    }

    /// The entered states, in order. Convenient for asserting sequences.
    pub fn states(&self) -> Vec<LoadState> {
        self.inner.lock().unwrap().iter().map(|r| r.to).collect()
    }

    /// States entered by one generation only.
    pub fn states_for(&self, generation: u64) -> Vec<LoadState> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.generation == generation)
            .map(|r| r.to)
            .collect()
    }
}
