//! Intent netting and settlement engine.
//!
//! The binary wires the workspace crates together: configuration from
//! `intent-settle-config`, an orchestrator over the simulated chain, and
//! an HTTP API with `/metrics` mounted alongside.

pub mod api;
pub mod app;

pub use api::{build_router, ApiError, ApiState};
pub use app::{build_engine, AppError, Engine};
