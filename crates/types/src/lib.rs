pub mod amount;
pub mod asset;
pub mod execution;
pub mod intent;
pub mod status;

pub use amount::*;
pub use asset::*;
pub use execution::*;
pub use intent::*;
pub use status::*;

pub use cosmwasm_std::{Binary, Uint256, Uint512};

pub const PROTOCOL_VERSION: &str = "1.0";

/// Milliseconds since the Unix epoch, used for timeline timestamps.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
