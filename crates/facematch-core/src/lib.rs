//! facematch-core — Face similarity decision pipeline.
//!
//! Decodes two images, locates a face in each, extracts a descriptor per
//! face and turns the descriptor distance into a bounded score and a
//! threshold verdict. Three backends: `classic` (SeetaFace frontal
//! detector with an LBP descriptor), `skin` (model-free skin-region
//! locator with an LBP descriptor, colour images only) and `onnx` (SCRFD
//! and ArcFace via ONNX Runtime).

pub mod alignment;
pub mod config;
pub mod detector;
pub mod error;
pub mod extractor;
pub mod locator;
pub mod normalizer;
pub mod payload;
pub mod pipeline;
pub mod policy;
pub mod recognizer;
pub mod scorer;
pub mod seeta;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use config::{default_model_dir, Backend, PipelineConfig};
pub use error::{BackendError, ErrorKind, PipelineError};
pub use extractor::FeatureExtractor;
pub use locator::FaceLocator;
pub use pipeline::Pipeline;
pub use policy::DecisionPolicy;
pub use scorer::Metric;
pub use types::{FaceRegion, FeatureVector, ImageRole, NormalizedImage, SimilarityResult};
