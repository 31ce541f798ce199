//! Caller-facing handle for one registered media request.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::placeholder::{self, Visual};
use crate::request::{LoadState, MediaRequest};

use super::driver::{Command, Shared};
use super::trace::{TransitionRecord, TransitionTrace};

/// Owned view of a scheduled media request.
///
/// Dropping the handle (or calling `dispose`) unmounts the request: the
/// driver releases its viewport observation, clears pending timers, and
/// discards in-flight measurement state.
pub struct MediaHandle {
    pub(crate) request: MediaRequest,
    pub(crate) cmd_tx: mpsc::UnboundedSender<Command>,
    pub(crate) state_rx: watch::Receiver<LoadState>,
    pub(crate) trace: TransitionTrace,
    pub(crate) shared: Arc<Shared>,
    pub(crate) join: Option<JoinHandle<()>>,
}

impl MediaHandle {
    pub fn id(&self) -> &str {
        &self.request.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoadState {
        *self.state_rx.borrow()
    }

    /// The source the current generation is loading (or loaded).
    pub fn active_src(&self) -> String {
        self.shared.active_src.lock().unwrap().clone()
    }

    /// What the host should paint right now.
    pub fn visual(&self) -> Visual {
        placeholder::render(
            self.state(),
            self.request.placeholder,
            self.request.fade_in,
            &self.active_src(),
            &self.request.description,
        )
    }

    /// Full transition log, all generations.
    pub fn trace(&self) -> Vec<TransitionRecord> {
        self.trace.snapshot()
    }

    /// Entered states in order, across generations.
    pub fn states(&self) -> Vec<LoadState> {
        self.trace.states()
    }

    /// Report a pointer/key event on the element's container. Feeds the
    /// INP-relevant latency if the load completes afterwards.
    pub fn notify_interaction(&self) {
        let _ = self.cmd_tx.send(Command::Interaction);
    }

    /// Wait until this request reaches `Loaded` or `Failed`.
    pub async fn wait_terminal(&mut self) -> LoadState {
        loop {
            let state = *self.state_rx.borrow_and_update();
            if state.is_terminal() {
                return state;
            }
            if self.state_rx.changed().await.is_err() {
                return *self.state_rx.borrow();
            }
        }
    }

    /// Wait until `target` is entered. Returns `false` if the driver went
    /// away first.
    pub async fn wait_state(&mut self, target: LoadState) -> bool {
        loop {
            if *self.state_rx.borrow_and_update() == target {
                return true;
            }
            if self.state_rx.changed().await.is_err() {
                return false;
            }
        }
    }

    /// Unmount: tear down the driver and wait for it to finish.
    pub async fn dispose(mut self) {
        let _ = self.cmd_tx.send(Command::Dispose);
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for MediaHandle {
    fn drop(&mut self) {
        // Best-effort unmount when the caller forgets to dispose.
        let _ = self.cmd_tx.send(Command::Dispose);
    }
}
