//! Host-platform seams.
//!
//! The scheduler never fetches bytes itself: the actual load is delegated to
//! the host's resource loader through these traits. `scripted` provides the
//! deterministic doubles used by tests and the scenario simulator.

pub mod scripted;

use std::future::Future;
use std::pin::Pin;

use crate::error::SourceLoadError;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// One platform load, with the computed quality/size attributes applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// Logical id of the media request issuing the load.
    pub request_id: String,
    pub url: String,
    /// Effective quality, 1..=100, after network bounding.
    pub quality: u8,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// A successfully settled load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedResource {
    pub url: String,
    /// Transferred payload size, when the platform reports it.
    pub byte_size: Option<u64>,
}

/// The host's resource loader.
pub trait ResourceLoader: Send + Sync {
    /// Begin loading `req`; the returned future settles when the platform
    /// finishes or fails. Must not block.
    fn load(&self, req: LoadRequest) -> BoxFuture<Result<LoadedResource, SourceLoadError>>;

    /// Issue a preload resource hint for `url`. Best-effort and idempotent:
    /// hinting a source that is also loaded normally must be harmless.
    fn hint(&self, url: &str);
}
