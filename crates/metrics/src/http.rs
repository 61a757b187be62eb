//! `/metrics` endpoint in the Prometheus text format.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::collector::{MetricsCollector, MetricsError};

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// `/metrics` route, for merging into the service router.
pub fn metrics_router<S>(collector: MetricsCollector) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/metrics", get(export))
        .with_state(collector)
}

async fn export(State(collector): State<MetricsCollector>) -> Result<Response, ExportError> {
    let body = collector.export_metrics()?;
    Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response())
}

#[derive(Debug, thiserror::Error)]
#[error("failed to export metrics: {0}")]
pub struct ExportError(#[from] MetricsError);

impl IntoResponse for ExportError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, error_kind = "metrics_export", "Metrics export failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
