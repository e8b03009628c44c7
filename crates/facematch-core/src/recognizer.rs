//! ArcFace face recognizer via ONNX Runtime.
//!
//! Extracts 512-dimensional face embeddings from aligned face crops,
//! using the w600k_r50 ArcFace model.

use crate::alignment::{self, ALIGNED_SIZE};
use crate::extractor::{ExtractorError, FeatureExtractor};
use crate::types::{l2_normalize, FaceRegion, FeatureVector, NormalizedImage};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Mutex;

// --- Named constants ---
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // symmetric around the mean, unlike SCRFD
const ARCFACE_EMBEDDING_DIM: usize = 512;
const ARCFACE_MODEL_VERSION: &str = "w600k_r50";

/// ArcFace-based feature extractor.
pub struct ArcFaceExtractor {
    session: Mutex<Session>,
}

impl ArcFaceExtractor {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &Path, intra_threads: usize) -> Result<Self, ExtractorError> {
        if !model_path.exists() {
            return Err(ExtractorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session: Mutex::new(session) })
    }

    /// Preprocess a 112x112 RGB face crop into a NCHW float tensor.
    fn preprocess(aligned_face: &RgbImage) -> Array4<f32> {
        let size = ALIGNED_SIZE as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for (x, y, pixel) in aligned_face.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = (pixel.0[c] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
            }
        }

        tensor
    }
}

impl FeatureExtractor for ArcFaceExtractor {
    fn id(&self) -> &str {
        ARCFACE_MODEL_VERSION
    }

    fn descriptor_len(&self) -> usize {
        ARCFACE_EMBEDDING_DIM
    }

    /// Extract an L2-normalized embedding.
    ///
    /// Regions with landmarks are aligned to the canonical ArcFace template;
    /// regions without are cropped and stretched to 112x112.
    fn extract(&self, image: &NormalizedImage, region: &FaceRegion) -> Result<FeatureVector, ExtractorError> {
        let rect = region
            .clamp_to(image.width(), image.height())
            .ok_or(ExtractorError::RegionOutOfBounds { width: image.width(), height: image.height() })?;

        let face = match &region.landmarks {
            Some(landmarks) => alignment::align_face(image.pixels(), landmarks),
            None => alignment::crop_face(image.pixels(), rect),
        };
        let input = Self::preprocess(&face);

        let mut values = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| ExtractorError::InferenceFailed("ArcFace session lock poisoned".into()))?;
            let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

            let (_, raw_data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| ExtractorError::InferenceFailed(format!("embedding extraction: {e}")))?;
            raw_data.to_vec()
        };

        if values.len() != ARCFACE_EMBEDDING_DIM {
            return Err(ExtractorError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                values.len()
            )));
        }

        l2_normalize(&mut values);

        Ok(FeatureVector {
            values,
            extractor: ARCFACE_MODEL_VERSION.to_string(),
        })
    }
}
