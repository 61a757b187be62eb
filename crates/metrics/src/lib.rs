//! Metrics and logging for the intent settlement engine.
//!
//! - Prometheus counters, gauges and histograms under the `intent_settle_`
//!   prefix, exported at `/metrics`
//! - `tracing` initialisation with an `EnvFilter` and JSON output
//! - Error-level events counted by their `error_kind` field
//!
//! # Example
//!
//! ```
//! use axum::Router;
//! use intent_settle_metrics::{metrics_router, MetricsCollector};
//!
//! let collector = MetricsCollector::new();
//! collector.record_intent_created();
//!
//! let app: Router = Router::new().merge(metrics_router(collector));
//! ```

pub mod collector;
pub mod http;
pub mod metrics;
pub mod tracing;

pub use collector::{FinalizeAttempt, MetricsCollector, MetricsError};
pub use http::{metrics_router, ExportError};
pub use tracing::{
    init_tracing_with_metrics, intent_span, CorrelationId, LogFormat, MetricsLayer, TracingError,
};
