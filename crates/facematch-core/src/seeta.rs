//! SeetaFace frontal face detector via the `rustface` crate.
//!
//! The cascade runs on the greyscale rendition of the image, so colour and
//! greyscale photos are located the same way.

use crate::detector::DetectorError;
use crate::locator::FaceLocator;
use crate::types::{FaceRegion, NormalizedImage};
use image::imageops::{self, FilterType};
use std::io::Cursor;
use std::path::Path;

// --- Named constants ---
pub const SEETA_MODEL_FILE: &str = "seeta_fd_frontal_v1.0.bin";
const SEETA_MAX_SIDE: u32 = 640;
const SEETA_MIN_FACE_SIZE: u32 = 20;
const SEETA_SCORE_THRESHOLD: f64 = 2.0;
const SEETA_PYRAMID_SCALE: f32 = 0.8;
const SEETA_WINDOW_STEP: u32 = 4;

/// Face locator backed by the SeetaFace funnel-structured cascade.
///
/// Regions are ordered by detector score, highest first, then
/// top-to-bottom and left-to-right.
pub struct SeetaLocator {
    model: rustface::Model,
}

impl SeetaLocator {
    /// Load the SeetaFace model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let bytes = std::fs::read(model_path).map_err(|e| DetectorError::InvalidModel {
            path: model_path.display().to_string(),
            reason: e.to_string(),
        })?;
        let locator = Self::from_bytes(&bytes).map_err(|e| match e {
            DetectorError::InvalidModel { reason, .. } => DetectorError::InvalidModel {
                path: model_path.display().to_string(),
                reason,
            },
            other => other,
        })?;

        tracing::info!(path = %model_path.display(), "loaded SeetaFace model");
        Ok(locator)
    }

    /// Parse a SeetaFace model already held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DetectorError> {
        let model = rustface::read_model(Cursor::new(bytes)).map_err(|e| DetectorError::InvalidModel {
            path: "<memory>".into(),
            reason: e.to_string(),
        })?;
        Ok(Self { model })
    }
}

impl FaceLocator for SeetaLocator {
    fn locate(&self, image: &NormalizedImage) -> Result<Vec<FaceRegion>, DetectorError> {
        let gray = imageops::grayscale(image.pixels());

        let (width, height) = gray.dimensions();
        let long_side = width.max(height);
        let (gray, factor) = if long_side > SEETA_MAX_SIDE {
            let scale = SEETA_MAX_SIDE as f32 / long_side as f32;
            let new_w = ((width as f32 * scale).round() as u32).max(1);
            let new_h = ((height as f32 * scale).round() as u32).max(1);
            let resized = imageops::resize(&gray, new_w, new_h, FilterType::Triangle);
            (resized, width as f32 / new_w as f32)
        } else {
            (gray, 1.0)
        };

        // Detectors carry per-run scratch state; one per call keeps `locate` shareable.
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(SEETA_MIN_FACE_SIZE);
        detector.set_score_thresh(SEETA_SCORE_THRESHOLD);
        detector.set_pyramid_scale_factor(SEETA_PYRAMID_SCALE);
        detector.set_slide_window_step(SEETA_WINDOW_STEP, SEETA_WINDOW_STEP);

        let faces = detector.detect(&rustface::ImageData::new(gray.as_raw(), gray.width(), gray.height()));

        let mut regions: Vec<FaceRegion> = faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceRegion {
                    x: bbox.x() as f32,
                    y: bbox.y() as f32,
                    width: bbox.width() as f32,
                    height: bbox.height() as f32,
                    confidence: face.score() as f32,
                    landmarks: None,
                }
                .scaled(factor)
            })
            .collect();
        rank(&mut regions);

        tracing::debug!(faces = regions.len(), "SeetaFace detection finished");
        Ok(regions)
    }
}

/// Score descending, then top, then left.
fn rank(regions: &mut [FaceRegion]) {
    regions.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(a.y.total_cmp(&b.y))
            .then(a.x.total_cmp(&b.x))
    });
}
