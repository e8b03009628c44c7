use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;
use crate::policy::DecisionPolicy;

/// Which of the two compared images a value or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageRole {
    Submitted,
    Reference,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRole::Submitted => f.write_str("submitted"),
            ImageRole::Reference => f.write_str("reference"),
        }
    }
}

/// Decoded image in the canonical pixel layout: 8-bit RGB, row-major,
/// top-left origin, never empty.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pixels: RgbImage,
}

impl NormalizedImage {
    /// Wrap an RGB buffer. Returns `None` for zero-sized buffers.
    pub fn new(pixels: RgbImage) -> Option<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return None;
        }
        Some(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}

/// Integer pixel rectangle, guaranteed non-empty and inside its image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Rectangular area of an image believed to contain a face, with optional
/// facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl FaceRegion {
    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Intersect the region with a `width` × `height` image.
    ///
    /// Returns `None` when nothing of the region lies inside the image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        if !(self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()) {
            return None;
        }
        let x0 = self.left().floor().max(0.0).min(width as f32) as u32;
        let y0 = self.top().floor().max(0.0).min(height as f32) as u32;
        let x1 = self.right().ceil().max(0.0).min(width as f32) as u32;
        let y1 = self.bottom().ceil().max(0.0).min(height as f32) as u32;

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }

    /// Map a region found on a resized copy back to source coordinates.
    pub(crate) fn scaled(&self, factor: f32) -> FaceRegion {
        FaceRegion {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
            confidence: self.confidence,
            landmarks: self
                .landmarks
                .map(|lms| lms.map(|(lx, ly)| (lx * factor, ly * factor))),
        }
    }
}

/// Fixed-length face descriptor.
///
/// Two vectors are only comparable when produced by the same extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: Vec<f32>,
    /// Identifier of the extractor that produced this vector (e.g., "w600k_r50").
    pub extractor: String,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compute cosine similarity between two vectors.
    ///
    /// Returns a value in [-1, 1], or 0.0 when either vector has zero norm.
    pub fn similarity(&self, other: &FeatureVector) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Compute Euclidean distance between two vectors.
    pub fn euclidean_distance(&self, other: &FeatureVector) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Scale `values` to unit L2 norm in place. All-zero input is left as is.
pub(crate) fn l2_normalize(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in values.iter_mut() {
            *v /= norm;
        }
    }
}

/// Outcome of one comparison. Every pipeline path, success or failure,
/// ends in exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub is_match: bool,
    pub similarity_score: f32,
    pub error: Option<String>,
}

impl SimilarityResult {
    /// Successful comparison: the verdict is derived from `policy`.
    pub fn matched(score: f32, policy: &DecisionPolicy) -> Self {
        Self {
            is_match: policy.decide(score),
            similarity_score: score,
            error: None,
        }
    }

    /// Failed comparison: never a match, score pinned to zero.
    pub fn failure(err: &PipelineError) -> Self {
        Self {
            is_match: false,
            similarity_score: 0.0,
            error: Some(err.to_string()),
        }
    }
}
