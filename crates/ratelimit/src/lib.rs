//! Retry pacing for the settlement engine
//!
//! - `LinearBackoff`: fixed-step delays (5s, 10s, 15s, ...) for bridge finalization
//! - `ExponentialBackoff`: doubling delays for attestation polling
//! - `retry`: bounded async retry driven by either policy

pub mod backoff;
pub mod retry;

pub use backoff::{Backoff, ExponentialBackoff, LinearBackoff};
pub use retry::{retry, RetryError};
