//! Pipeline orchestration: decode → locate → extract → score → decide.
//!
//! Each stage runs for both images before the next stage starts, and the
//! first failing stage ends the comparison. The submitted image's error wins
//! when both images fail at the same stage.

use crate::config::{Backend, PipelineConfig};
use crate::detector::ScrfdLocator;
use crate::error::{BackendError, PipelineError};
use crate::extractor::{FeatureExtractor, LbpExtractor};
use crate::locator::{FaceLocator, SkinLocator};
use crate::normalizer;
use crate::payload;
use crate::policy::DecisionPolicy;
use crate::recognizer::ArcFaceExtractor;
use crate::scorer::Metric;
use crate::seeta::SeetaLocator;
use crate::types::{FaceRegion, FeatureVector, ImageRole, NormalizedImage, SimilarityResult};
use std::panic::{self, AssertUnwindSafe};

/// Stateless face comparison pipeline.
///
/// Built once at startup and shared by reference; every call works only on
/// its own inputs.
pub struct Pipeline {
    locator: Box<dyn FaceLocator>,
    extractor: Box<dyn FeatureExtractor>,
    metric: Metric,
    policy: DecisionPolicy,
    parallel: bool,
}

impl Pipeline {
    pub fn new(
        locator: Box<dyn FaceLocator>,
        extractor: Box<dyn FeatureExtractor>,
        metric: Metric,
        policy: DecisionPolicy,
    ) -> Self {
        Self {
            locator,
            extractor,
            metric,
            policy,
            parallel: true,
        }
    }

    /// Toggle fork-join processing of the two images.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Build the backend selected by `config`, loading models if needed.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, BackendError> {
        let threshold = config.threshold();
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(BackendError::InvalidThreshold(threshold));
        }

        let (locator, extractor): (Box<dyn FaceLocator>, Box<dyn FeatureExtractor>) = match config.backend {
            Backend::Classic => (
                Box::new(SeetaLocator::load(&config.seeta_model_path())?),
                Box::new(LbpExtractor::new()),
            ),
            Backend::Skin => (Box::new(SkinLocator::new()), Box::new(LbpExtractor::new())),
            Backend::Onnx => (
                Box::new(ScrfdLocator::load(&config.scrfd_model_path(), config.intra_threads)?),
                Box::new(ArcFaceExtractor::load(&config.arcface_model_path(), config.intra_threads)?),
            ),
        };

        tracing::info!(
            backend = %config.backend,
            extractor = extractor.id(),
            descriptor_len = extractor.descriptor_len(),
            metric = %config.metric,
            threshold,
            parallel = config.parallel,
            "pipeline ready"
        );

        Ok(Self::new(locator, extractor, config.metric, DecisionPolicy::new(threshold)).with_parallel(config.parallel))
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn extractor_id(&self) -> &str {
        self.extractor.id()
    }

    /// Compare two encoded images. Never fails: errors are folded into the result.
    pub fn compare(&self, submitted: &[u8], reference: &[u8]) -> SimilarityResult {
        self.finish(guard(|| self.try_compare(submitted, reference)))
    }

    /// Compare two base64 (optionally data-URL prefixed) images.
    pub fn compare_encoded(&self, submitted: &str, reference: &str) -> SimilarityResult {
        self.finish(guard(|| self.try_compare_encoded(submitted, reference)))
    }

    /// Typed-error variant of [`compare`](Self::compare), returning the score.
    pub fn try_compare(&self, submitted: &[u8], reference: &[u8]) -> Result<f32, PipelineError> {
        let (s, r) = self.per_image(submitted, reference, |role, bytes| decode(role, bytes));
        let (submitted_img, reference_img) = (s?, r?);

        let (s, r) = self.per_image(&submitted_img, &reference_img, |role, image| self.first_face(role, image));
        let (submitted_face, reference_face) = (s?, r?);

        let (s, r) = self.per_image(
            (&submitted_img, &submitted_face),
            (&reference_img, &reference_face),
            |role, (image, face)| self.extract(role, image, face),
        );
        let (submitted_vec, reference_vec) = (s?, r?);

        Ok(self.metric.score(&submitted_vec, &reference_vec))
    }

    /// Typed-error variant of [`compare_encoded`](Self::compare_encoded).
    pub fn try_compare_encoded(&self, submitted: &str, reference: &str) -> Result<f32, PipelineError> {
        let submitted = decode_payload(ImageRole::Submitted, submitted)?;
        let reference = decode_payload(ImageRole::Reference, reference)?;
        self.try_compare(&submitted, &reference)
    }

    /// Decode one image and return every face region the locator finds.
    pub fn locate(&self, bytes: &[u8]) -> Result<Vec<FaceRegion>, PipelineError> {
        let image = normalizer::normalize(bytes).map_err(|e| PipelineError::InvalidImage(e.to_string()))?;
        self.locator
            .locate(&image)
            .map_err(|e| PipelineError::Internal(format!("face detection failed: {e}")))
    }

    /// Run `stage` for both images, concurrently when enabled.
    fn per_image<I, T, F>(&self, submitted: I, reference: I, stage: F) -> (T, T)
    where
        I: Send,
        T: Send,
        F: Fn(ImageRole, I) -> T + Sync,
    {
        if self.parallel {
            rayon::join(
                || stage(ImageRole::Submitted, submitted),
                || stage(ImageRole::Reference, reference),
            )
        } else {
            (stage(ImageRole::Submitted, submitted), stage(ImageRole::Reference, reference))
        }
    }

    /// First region in the locator's own order; the rest are ignored.
    fn first_face(&self, role: ImageRole, image: &NormalizedImage) -> Result<FaceRegion, PipelineError> {
        let faces = self
            .locator
            .locate(image)
            .map_err(|e| PipelineError::Internal(format!("face detection failed for {role} image: {e}")))?;

        if faces.len() > 1 {
            tracing::debug!(%role, faces = faces.len(), "multiple faces located; using the first");
        }
        faces.into_iter().next().ok_or(PipelineError::NoFaceDetected(role))
    }

    fn extract(&self, role: ImageRole, image: &NormalizedImage, face: &FaceRegion) -> Result<FeatureVector, PipelineError> {
        self.extractor
            .extract(image, face)
            .map_err(|e| PipelineError::Extraction { role, reason: e.to_string() })
    }

    fn finish(&self, outcome: Result<f32, PipelineError>) -> SimilarityResult {
        match outcome {
            Ok(score) => {
                let result = SimilarityResult::matched(score, &self.policy);
                tracing::debug!(score, is_match = result.is_match, "comparison finished");
                result
            }
            Err(err) => {
                tracing::debug!(kind = ?err.kind(), role = ?err.role(), error = %err, "comparison failed");
                SimilarityResult::failure(&err)
            }
        }
    }
}

fn decode(role: ImageRole, bytes: &[u8]) -> Result<NormalizedImage, PipelineError> {
    normalizer::normalize(bytes).map_err(|e| PipelineError::Decode { role, reason: e.to_string() })
}

fn decode_payload(role: ImageRole, text: &str) -> Result<Vec<u8>, PipelineError> {
    payload::decode_image_payload(text).map_err(|e| PipelineError::InvalidPayload { role, reason: e.to_string() })
}

/// Run `f`, turning a backend panic into an `Internal` error.
fn guard<F>(f: F) -> Result<f32, PipelineError>
where
    F: FnOnce() -> Result<f32, PipelineError>,
{
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "internal error".to_string());
        tracing::error!(error = %message, "pipeline panicked");
        Err(PipelineError::Internal(message))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectorError;
    use crate::extractor::ExtractorError;
    use crate::fixtures::{encode_png, face_image};
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Locator that returns one fixed region and counts its calls.
    struct FixedLocator {
        regions: Vec<FaceRegion>,
        calls: Arc<AtomicUsize>,
    }

    impl FaceLocator for FixedLocator {
        fn locate(&self, _image: &NormalizedImage) -> Result<Vec<FaceRegion>, DetectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.regions.clone())
        }
    }

    struct FailingLocator;

    impl FaceLocator for FailingLocator {
        fn locate(&self, _image: &NormalizedImage) -> Result<Vec<FaceRegion>, DetectorError> {
            Err(DetectorError::InferenceFailed("session exploded".into()))
        }
    }

    struct PanickingExtractor;

    impl FeatureExtractor for PanickingExtractor {
        fn id(&self) -> &str {
            "panic"
        }

        fn descriptor_len(&self) -> usize {
            0
        }

        fn extract(&self, _image: &NormalizedImage, _region: &FaceRegion) -> Result<FeatureVector, ExtractorError> {
            panic!("extractor bug")
        }
    }

    fn skin() -> Pipeline {
        Pipeline::from_config(&PipelineConfig { backend: Backend::Skin, ..Default::default() }).unwrap()
    }

    fn region(x: f32, y: f32, w: f32, h: f32) -> FaceRegion {
        FaceRegion { x, y, width: w, height: h, confidence: 1.0, landmarks: None }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbImage::from_pixel(width, height, Rgb([128, 128, 128])))
    }

    #[test]
    fn test_self_comparison_matches() {
        let face = encode_png(&face_image(200, 200));
        let result = skin().compare(&face, &face);
        assert_eq!(result.error, None);
        assert!(result.is_match);
        assert!(result.similarity_score >= 0.99, "score = {}", result.similarity_score);
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let a = encode_png(&face_image(200, 200));
        let b = encode_png(&face_image(180, 220));
        let parallel = skin().compare(&a, &b);
        let sequential = skin().with_parallel(false).compare(&a, &b);
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_submitted_error_reported_first() {
        let result = skin().compare(b"junk", b"more junk");
        assert!(!result.is_match);
        assert_eq!(result.similarity_score, 0.0);
        let error = result.error.unwrap();
        assert!(error.starts_with("Invalid image data: failed to decode submitted image"), "{error}");
    }

    #[test]
    fn test_decode_failure_stops_before_locating() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new(
            Box::new(FixedLocator { regions: vec![region(0.0, 0.0, 10.0, 10.0)], calls: calls.clone() }),
            Box::new(LbpExtractor::new()),
            Metric::Cosine,
            DecisionPolicy::new(0.8),
        );
        let result = pipeline.compare(&png(20, 20), b"not an image");
        assert!(result.error.unwrap().contains("reference image"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_face_in_reference() {
        let face = encode_png(&face_image(200, 200));
        let result = skin().compare(&face, &png(100, 100));
        assert_eq!(result.error.as_deref(), Some("No face detected in reference image"));
        assert!(!result.is_match);
    }

    #[test]
    fn test_out_of_bounds_region_is_extraction_error() {
        let pipeline = Pipeline::new(
            Box::new(FixedLocator { regions: vec![region(500.0, 500.0, 10.0, 10.0)], calls: Arc::default() }),
            Box::new(LbpExtractor::new()),
            Metric::Cosine,
            DecisionPolicy::new(0.8),
        );
        let result = pipeline.compare(&png(40, 40), &png(40, 40));
        let error = result.error.unwrap();
        assert!(error.starts_with("Failed to extract face features from submitted image"), "{error}");
        assert_eq!(result.similarity_score, 0.0);
    }

    #[test]
    fn test_locator_failure_is_internal() {
        let pipeline = Pipeline::new(
            Box::new(FailingLocator),
            Box::new(LbpExtractor::new()),
            Metric::Cosine,
            DecisionPolicy::new(0.8),
        );
        let err = pipeline.try_compare(&png(40, 40), &png(40, 40)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InternalError);
        assert!(err.to_string().contains("session exploded"));
    }

    #[test]
    fn test_panic_becomes_internal_error() {
        let pipeline = Pipeline::new(
            Box::new(FixedLocator { regions: vec![region(0.0, 0.0, 10.0, 10.0)], calls: Arc::default() }),
            Box::new(PanickingExtractor),
            Metric::Cosine,
            DecisionPolicy::new(0.8),
        );
        let result = pipeline.compare(&png(40, 40), &png(40, 40));
        assert_eq!(result.error.as_deref(), Some("extractor bug"));
        assert!(!result.is_match);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let config = PipelineConfig { threshold: Some(1.5), ..Default::default() };
        assert!(matches!(Pipeline::from_config(&config), Err(BackendError::InvalidThreshold(_))));
        let config = PipelineConfig { threshold: Some(f32::NAN), ..Default::default() };
        assert!(Pipeline::from_config(&config).is_err());
    }

    #[test]
    fn test_onnx_backend_without_models() {
        let config = PipelineConfig {
            backend: Backend::Onnx,
            model_dir: "/nonexistent".into(),
            ..Default::default()
        };
        assert!(matches!(Pipeline::from_config(&config), Err(BackendError::Detector(_))));
    }

    #[test]
    fn test_classic_backend_without_model() {
        let config = PipelineConfig { model_dir: "/nonexistent".into(), ..Default::default() };
        assert!(matches!(
            Pipeline::from_config(&config),
            Err(BackendError::Detector(DetectorError::ModelNotFound(_)))
        ));
    }

    #[test]
    fn test_locate_decode_error_names_no_role() {
        let err = skin().locate(b"not an image").unwrap_err();
        assert_eq!(err.role(), None);
        let message = err.to_string();
        assert!(message.starts_with("Invalid image data: failed to decode image"), "{message}");
        assert!(!message.contains("submitted"), "{message}");
    }

    #[test]
    fn test_locate_lists_regions() {
        let faces = skin().locate(&encode_png(&face_image(200, 200))).unwrap();
        assert_eq!(faces.len(), 1);
    }
}
