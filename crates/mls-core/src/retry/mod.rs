//! Retry and fallback machinery for failed source loads.
//!
//! The policy decides whether a failed attempt gets another try and how long
//! to back off; the context tracks the attempt counter and the remaining
//! fallback-source queue for one generation of a request.

mod context;
mod policy;

pub use context::RetryContext;
pub use policy::{RetryDecision, RetryPolicy};
