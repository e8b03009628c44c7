use crate::engine::EngineHandle;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use facematch_core::{PipelineError, SimilarityResult};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Body of `POST /api/compare_faces`.
#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub submitted_image: Option<String>,
    pub reference_image: Option<String>,
}

impl CompareRequest {
    /// Both images, if both are present and non-empty.
    fn into_pair(self) -> Result<(String, String), PipelineError> {
        match (self.submitted_image, self.reference_image) {
            (Some(s), Some(r)) if !s.trim().is_empty() && !r.trim().is_empty() => Ok((s, r)),
            _ => Err(PipelineError::InvalidRequest),
        }
    }
}

pub fn router(engine: EngineHandle, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/compare_faces", post(compare_faces))
        .route("/test", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Compare two faces. Always answers 200 with a result record; failures
/// travel in its `error` field.
async fn compare_faces(
    State(engine): State<EngineHandle>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> Json<SimilarityResult> {
    let started = Instant::now();

    let pair = match payload {
        Ok(Json(request)) => request.into_pair(),
        Err(rejection) => Err(rejection_error(rejection)),
    };

    let result = match pair {
        Ok((submitted, reference)) => engine.compare(submitted, reference).await,
        Err(e) => SimilarityResult::failure(&e),
    };

    match &result.error {
        None => tracing::info!(
            is_match = result.is_match,
            score = result.similarity_score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "compare_faces"
        ),
        Some(error) => tracing::info!(
            error = %error,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "compare_faces failed"
        ),
    }

    Json(result)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "API is working!" }))
}

fn rejection_error(rejection: JsonRejection) -> PipelineError {
    match rejection {
        JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) | JsonRejection::MissingJsonContentType(_) => {
            tracing::debug!(rejection = %rejection.body_text(), "malformed compare request");
            PipelineError::InvalidRequest
        }
        other => PipelineError::Internal(other.body_text()),
    }
}
