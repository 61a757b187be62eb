use tracing::{field::Visit, Event, Level, Subscriber};
use tracing_subscriber::{
    fmt,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::collector::MetricsCollector;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(LogFormat::Json),
            "pretty" | "text" => Some(LogFormat::Pretty),
            _ => None,
        }
    }
}

/// Initialize tracing with metrics integration.
///
/// `RUST_LOG` wins over `default_filter` when set.
pub fn init_tracing_with_metrics(
    collector: MetricsCollector,
    default_filter: &str,
    format: LogFormat,
) -> Result<(), TracingError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let metrics_layer = MetricsLayer::new(collector);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(metrics_layer);

    let result = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .json(),
            )
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    result.map_err(|e| TracingError::InitError(e.to_string()))
}

/// Counts error-level events by their `error_kind` field.
pub struct MetricsLayer {
    collector: MetricsCollector,
}

impl MetricsLayer {
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }
}

impl<S> Layer<S> for MetricsLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }

        let mut visitor = ErrorKindVisitor::default();
        event.record(&mut visitor);
        let kind = visitor.error_kind.as_deref().unwrap_or("unclassified");
        self.collector.record_error_logged(kind);
    }
}

#[derive(Default)]
struct ErrorKindVisitor {
    error_kind: Option<String>,
}

impl Visit for ErrorKindVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "error_kind" {
            self.error_kind = Some(format!("{value:?}").trim_matches('"').to_string());
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "error_kind" {
            self.error_kind = Some(value.to_string());
        }
    }
}

/// Correlation ID for tracking requests across components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(uuid::Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Span for one intent's execution. Attach with
/// [`tracing::Instrument::instrument`] so it survives await points.
pub fn intent_span(intent_id: &str, operation: &'static str) -> tracing::Span {
    tracing::info_span!(
        "intent",
        correlation_id = %CorrelationId::new(),
        intent_id = %intent_id,
        operation,
    )
}

/// Tracing error types
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("tracing initialization error: {0}")]
    InitError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_correlation_id_generation() {
        let id1 = CorrelationId::new();
        let id2 = CorrelationId::new();

        assert_ne!(id1, id2);
        assert_eq!(id1.as_str().len(), 36);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("text"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_error_events_are_counted() {
        let collector = MetricsCollector::new();
        let subscriber = tracing_subscriber::registry().with(MetricsLayer::new(collector));

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(error_kind = "invariant_violation", "boom");
            tracing::warn!(error_kind = "network", "not counted");
        });

        let metrics = collector.export_metrics().unwrap();
        assert!(metrics.contains("intent_settle_errors_logged_total"));
        assert!(metrics.contains("kind=\"invariant_violation\""));
    }
}
