//! Viewport proximity detection: one shared registry, per-element fan-out.
//!
//! A single `ViewportWatcher` is shared by every media request on a page. The
//! host platform (or the scenario simulator) drives it by calling `notify`
//! when an element crosses the configured margin; subscribers receive the
//! signal over a watch channel. When the host has no observation primitive at
//! all, the watcher fails open: subscriptions start out already "near", so
//! assets load instead of never loading.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Current viewport dimensions, fanned out to every request driver. Width
/// drives source selection; the area feeds LCP candidacy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportSize {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

impl ViewportSize {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Tuning for one element's observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserveOptions {
    /// Buffer distance around the viewport, in px, that counts as "near".
    pub root_margin_px: u32,
    /// Fraction of the element that must intersect before triggering.
    pub threshold: f64,
    /// Stop observing after the first positive signal.
    pub trigger_once: bool,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            root_margin_px: 200,
            threshold: 0.1,
            trigger_once: true,
        }
    }
}

/// The signal fanned out to subscribers: the flag plus the configuration that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSignal {
    pub near: bool,
    pub opts: ObserveOptions,
}

struct Entry {
    tx: watch::Sender<ViewportSignal>,
    opts: ObserveOptions,
    subscribers: usize,
    /// Set once a trigger-once observation has fired; later notifies are ignored.
    done: bool,
}

/// Shared observation registry, keyed by element identity.
pub struct ViewportWatcher {
    /// Whether the host exposes an observation primitive at all.
    available: bool,
    inner: RwLock<HashMap<String, Entry>>,
}

impl ViewportWatcher {
    pub fn new(available: bool) -> Self {
        Self {
            available,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Register interest in an element. Subscriptions for the same element
    /// share one underlying registration; the first caller's options win.
    ///
    /// When the observation primitive is unavailable the subscription starts
    /// out `near = true` (fail-open) and nothing is registered.
    pub fn observe(self: &Arc<Self>, element: &str, opts: ObserveOptions) -> ViewportSubscription {
        if !self.available {
            tracing::debug!(element, "observation primitive unavailable; failing open");
            let (_tx, rx) = watch::channel(ViewportSignal { near: true, opts });
            return ViewportSubscription {
                rx,
                element: element.to_string(),
                watcher: None,
            };
        }

        let mut inner = self.inner.write().unwrap();
        let entry = inner.entry(element.to_string()).or_insert_with(|| {
            let (tx, _rx) = watch::channel(ViewportSignal { near: false, opts });
            Entry {
                tx,
                opts,
                subscribers: 0,
                done: false,
            }
        });
        entry.subscribers += 1;
        ViewportSubscription {
            rx: entry.tx.subscribe(),
            element: element.to_string(),
            watcher: Some(Arc::clone(self)),
        }
    }

    /// Host-driven notification that `element` crossed (or left) the margin.
    /// Unknown elements and already-fired trigger-once observations are ignored.
    pub fn notify(&self, element: &str, near: bool) {
        let mut inner = self.inner.write().unwrap();
        let Some(entry) = inner.get_mut(element) else {
            return;
        };
        if entry.done {
            return;
        }
        let opts = entry.opts;
        let _ = entry.tx.send(ViewportSignal { near, opts });
        if near && opts.trigger_once {
            entry.done = true;
        }
    }

    /// Number of live (not yet fired-and-done) observations. Used by leak
    /// checks and by the simulator's summary output.
    pub fn active_observations(&self) -> usize {
        self.inner
            .read()
            .unwrap()
            .values()
            .filter(|e| !e.done)
            .count()
    }

    /// Total registrations, fired or not.
    pub fn registrations(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    fn release(&self, element: &str) {
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.get_mut(element) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            if entry.subscribers == 0 {
                inner.remove(element);
            }
        }
    }
}

/// One subscriber's view of an element observation. Releasing (dropping) it
/// removes the underlying registration once the last subscriber is gone.
pub struct ViewportSubscription {
    rx: watch::Receiver<ViewportSignal>,
    element: String,
    watcher: Option<Arc<ViewportWatcher>>,
}

impl ViewportSubscription {
    /// Latest signal without waiting.
    pub fn current(&self) -> ViewportSignal {
        *self.rx.borrow()
    }

    /// Wait until the element is near the viewport. Resolves immediately if
    /// it already is. Returns `false` only if the watcher side went away
    /// before a positive signal arrived.
    pub async fn near(&mut self) -> bool {
        if self.rx.borrow().near {
            return true;
        }
        while self.rx.changed().await.is_ok() {
            if self.rx.borrow().near {
                return true;
            }
        }
        false
    }
}

impl Drop for ViewportSubscription {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.release(&self.element);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fail_open_when_primitive_unavailable() {
        let watcher = Arc::new(ViewportWatcher::new(false));
        let mut sub = watcher.observe("hero", ObserveOptions::default());
        assert!(sub.current().near);
        assert!(sub.near().await);
        assert_eq!(watcher.registrations(), 0);
    }

    #[tokio::test]
    async fn notify_reaches_subscriber() {
        let watcher = Arc::new(ViewportWatcher::new(true));
        let mut sub = watcher.observe("card-3", ObserveOptions::default());
        assert!(!sub.current().near);
        watcher.notify("card-3", true);
        assert!(sub.near().await);
    }

    #[test]
    fn trigger_once_disconnects_after_first_positive() {
        let watcher = Arc::new(ViewportWatcher::new(true));
        let _sub = watcher.observe("logo", ObserveOptions::default());
        assert_eq!(watcher.active_observations(), 1);
        watcher.notify("logo", true);
        assert_eq!(watcher.active_observations(), 0);
        // Subsequent notifies are ignored; the last value stays near=true.
        watcher.notify("logo", false);
        assert!(_sub.current().near);
    }

    #[test]
    fn continuous_mode_keeps_emitting_transitions() {
        let watcher = Arc::new(ViewportWatcher::new(true));
        let opts = ObserveOptions {
            trigger_once: false,
            ..ObserveOptions::default()
        };
        let sub = watcher.observe("carousel", opts);
        watcher.notify("carousel", true);
        assert!(sub.current().near);
        watcher.notify("carousel", false);
        assert!(!sub.current().near);
        assert_eq!(watcher.active_observations(), 1);
    }

    #[test]
    fn registration_released_on_drop() {
        let watcher = Arc::new(ViewportWatcher::new(true));
        let sub_a = watcher.observe("shared", ObserveOptions::default());
        let sub_b = watcher.observe("shared", ObserveOptions::default());
        assert_eq!(watcher.registrations(), 1);
        drop(sub_a);
        assert_eq!(watcher.registrations(), 1);
        drop(sub_b);
        assert_eq!(watcher.registrations(), 0);
    }
}
