use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use provider::SharedGeminiClient;
use query::{AnswerResult, PipelineError, RetrievalPipeline, Stage, TitleGenerator};

use crate::metrics::{Metrics, MetricsSnapshot, TimedOperation};

pub struct AppState {
    pub pipeline: Arc<RetrievalPipeline>,
    pub titles: TitleGenerator,
    pub gemini: SharedGeminiClient,
    pub metrics: Arc<Metrics>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    query: String,
    user_id: String,
    #[serde(default)]
    selected_document_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitleRequest {
    first_message: String,
}

#[derive(Serialize)]
struct TitleResponse {
    title: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    vector_index: String,
    provider_client: String,
}

#[derive(Serialize)]
struct ReconfigureResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<Stage>,
}

/// A JSON error reply: `{"error": ..., "stage": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: message.to_string(),
                stage: None,
            },
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = if err.is_configuration() {
            StatusCode::SERVICE_UNAVAILABLE
        } else if err.is_timeout() {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            StatusCode::BAD_GATEWAY
        };

        Self {
            status,
            body: ErrorBody {
                error: err.to_string(),
                stage: Some(err.stage),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Build the service. `/api/admin/*` carries no authentication and is only
/// mounted when `enable_admin` is set, for deployments where the port is not
/// reachable from browsers or the public network.
pub fn router(state: Arc<AppState>, enable_admin: bool) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .route("/api/chat", post(chat))
        .route("/api/chat/title", post(generate_title));

    if enable_admin {
        router = router.route("/api/admin/reconfigure", post(reconfigure));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<AnswerResult>, ApiError> {
    if req.query.trim().is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    let request_id = Uuid::new_v4();
    let timer = TimedOperation::start();

    let result = state
        .pipeline
        .answer(&req.query, &req.user_id, req.selected_document_name.as_deref())
        .instrument(info_span!("chat", %request_id))
        .await;

    match result {
        Ok(answer) => {
            let elapsed = timer.elapsed();
            state.metrics.record_answer(elapsed, !answer.sources.is_empty());
            info!(
                %request_id,
                sources = answer.sources.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "chat request completed"
            );
            Ok(Json(answer))
        }
        Err(e) => {
            state.metrics.record_failure(e.stage);
            warn!(%request_id, stage = %e.stage, error = %e, "chat request failed");
            Err(e.into())
        }
    }
}

async fn generate_title(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TitleRequest>,
) -> Json<TitleResponse> {
    let title = state.titles.generate_title(&req.first_message).await;
    state.metrics.record_title();
    Json(TitleResponse { title })
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let vector_index = match state.pipeline.index().health().await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {}", e),
    };

    let provider_client = if state.gemini.is_initialized() {
        "initialized"
    } else {
        "not initialized"
    };

    Json(HealthResponse {
        vector_index,
        provider_client: provider_client.to_string(),
    })
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// Forget the shared provider client so the next request re-reads credentials.
async fn reconfigure(State(state): State<Arc<AppState>>) -> Json<ReconfigureResponse> {
    state.gemini.reset();
    Json(ReconfigureResponse { status: "reset" })
}
