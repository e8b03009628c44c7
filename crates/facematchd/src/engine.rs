use facematch_core::{BackendError, Pipeline, PipelineConfig, PipelineError, SimilarityResult};
use std::sync::Arc;

/// Clone-safe handle to the comparison pipeline.
///
/// Comparisons are CPU-bound, so each one runs on tokio's blocking pool;
/// the pipeline itself is shared read-only between requests.
#[derive(Clone)]
pub struct EngineHandle {
    pipeline: Arc<Pipeline>,
}

impl EngineHandle {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline: Arc::new(pipeline) }
    }

    /// Compare two base64 image payloads.
    ///
    /// Never fails: a lost blocking task is reported as an internal error result.
    pub async fn compare(&self, submitted: String, reference: String) -> SimilarityResult {
        let pipeline = Arc::clone(&self.pipeline);
        let task = tokio::task::spawn_blocking(move || pipeline.compare_encoded(&submitted, &reference));

        match task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "comparison task failed");
                SimilarityResult::failure(&PipelineError::Internal(format!("comparison task failed: {e}")))
            }
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

/// Build the pipeline and wrap it in a handle.
///
/// Loads backend models synchronously so the service fails fast at startup
/// if any of them is unavailable.
pub fn spawn_engine(config: &PipelineConfig) -> Result<EngineHandle, BackendError> {
    let pipeline = Pipeline::from_config(config)?;
    tracing::info!(extractor = pipeline.extractor_id(), "engine ready");
    Ok(EngineHandle::new(pipeline))
}
