//! REST API over the orchestrator

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use intent_settle_metrics::{metrics_router, CorrelationId, MetricsCollector};
use intent_settle_orchestrator::{IntentOrchestrator, NettingReport, OrchestratorError, SweepReport};
use intent_settle_settlement::{CancelOutcome, RecordError};
use intent_settle_types::{ErrorKind, Intent, IntentId, IntentStatus, NetworkId, NewIntent};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tokio::task::JoinError;
use tracing::{error, info, info_span, Instrument, Span};

const DEFAULT_LIST_LIMIT: usize = 100;

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<IntentOrchestrator>,
}

/// Build the API router. `/metrics` is mounted when a collector is given.
pub fn build_router(
    orchestrator: Arc<IntentOrchestrator>,
    metrics: Option<MetricsCollector>,
) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/intents", post(submit_intent).get(list_intents))
        .route("/intents/text", post(submit_text))
        .route("/intents/:id", get(get_intent))
        .route("/intents/:id/confirm", post(confirm_intent))
        .route("/intents/:id/cancel", post(cancel_intent))
        .route("/netting/rounds", post(run_netting_round))
        .route("/bridges/recover", post(recover_bridges));
    let router = match metrics {
        Some(collector) => router.merge(metrics_router(collector)),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(ApiState { orchestrator })
}

fn request_span(request: &Request<Body>) -> Span {
    info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        correlation_id = %CorrelationId::new(),
    )
}

/// Error body: `{"error": "...", "kind": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Orchestrator(OrchestratorError),
    /// The detached execution task did not finish.
    Task(String),
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        ApiError::Orchestrator(e)
    }
}

impl From<JoinError> for ApiError {
    fn from(e: JoinError) -> Self {
        error!(error = %e, error_kind = ErrorKind::InvariantViolation.as_str(), "Execution task aborted");
        ApiError::Task(e.to_string())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Orchestrator(e) => match e {
                OrchestratorError::Validation(_)
                | OrchestratorError::InvalidBatch(_)
                | OrchestratorError::Netting(_) => StatusCode::BAD_REQUEST,
                OrchestratorError::Record(RecordError::NotFound(_)) => StatusCode::NOT_FOUND,
                OrchestratorError::Record(RecordError::InvalidTransition { .. }) => {
                    StatusCode::CONFLICT
                }
                OrchestratorError::Record(_) => StatusCode::INTERNAL_SERVER_ERROR,
                OrchestratorError::Classifier(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, kind) = match &self {
            ApiError::BadRequest(message) => (message.clone(), ErrorKind::Validation.as_str()),
            ApiError::Task(message) => (message.clone(), ErrorKind::InvariantViolation.as_str()),
            ApiError::Orchestrator(e) => (e.to_string(), e.kind().as_str()),
        };
        (status, Json(json!({ "error": message, "kind": kind }))).into_response()
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn submit_intent(
    State(state): State<ApiState>,
    Json(request): Json<NewIntent>,
) -> Result<(StatusCode, Json<Intent>), ApiError> {
    let intent = state.orchestrator.submit_intent(request).await?;
    Ok((StatusCode::CREATED, Json(intent)))
}

#[derive(Deserialize)]
pub struct TextRequest {
    pub text: String,
    pub network: NetworkId,
}

#[derive(Serialize)]
pub struct IntentListResponse {
    pub intents: Vec<Intent>,
    pub total: usize,
}

async fn submit_text(
    State(state): State<ApiState>,
    Json(request): Json<TextRequest>,
) -> Result<Json<IntentListResponse>, ApiError> {
    info!(network = %request.network, "Received free-text intent");
    let intents = state
        .orchestrator
        .submit_text(&request.text, &request.network)
        .await?;
    Ok(Json(IntentListResponse {
        total: intents.len(),
        intents,
    }))
}

#[derive(Deserialize)]
pub struct ListIntentsQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

async fn list_intents(
    State(state): State<ApiState>,
    Query(query): Query<ListIntentsQuery>,
) -> Result<Json<IntentListResponse>, ApiError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            IntentStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status '{raw}'")))?,
        ),
        None => None,
    };
    let intents = state
        .orchestrator
        .list_intents(status, query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(IntentListResponse {
        total: intents.len(),
        intents,
    }))
}

async fn get_intent(
    State(state): State<ApiState>,
    Path(id): Path<IntentId>,
) -> Result<Json<Intent>, ApiError> {
    Ok(Json(state.orchestrator.get_intent_status(&id).await?))
}

/// Execution runs on its own task. A client that disconnects drops only the
/// wait, never the execution, so the intent still reaches a terminal state.
async fn detached<T, F>(work: F) -> Result<T, ApiError>
where
    F: std::future::Future<Output = Result<T, OrchestratorError>> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::spawn(work.instrument(Span::current())).await??)
}

async fn confirm_intent(
    State(state): State<ApiState>,
    Path(id): Path<IntentId>,
) -> Result<Json<Intent>, ApiError> {
    let orchestrator = state.orchestrator;
    let intent = detached(async move { orchestrator.confirm_intent(&id).await }).await?;
    Ok(Json(intent))
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub id: IntentId,
    pub outcome: &'static str,
}

async fn cancel_intent(
    State(state): State<ApiState>,
    Path(id): Path<IntentId>,
) -> Result<Json<CancelResponse>, ApiError> {
    let outcome = match state.orchestrator.cancel_intent(&id).await? {
        CancelOutcome::Cancelled => "cancelled",
        CancelOutcome::Queued => "queued",
    };
    Ok(Json(CancelResponse { id, outcome }))
}

#[derive(Deserialize)]
pub struct NettingRequest {
    pub intent_ids: Vec<IntentId>,
}

async fn run_netting_round(
    State(state): State<ApiState>,
    Json(request): Json<NettingRequest>,
) -> Result<Json<NettingReport>, ApiError> {
    let orchestrator = state.orchestrator;
    let report = detached(async move {
        orchestrator.run_netting_round(&request.intent_ids).await
    })
    .await?;
    Ok(Json(report))
}

async fn recover_bridges(State(state): State<ApiState>) -> Result<Json<SweepReport>, ApiError> {
    let orchestrator = state.orchestrator;
    let report = detached(async move { orchestrator.recover_pending_bridges().await }).await?;
    Ok(Json(report))
}
