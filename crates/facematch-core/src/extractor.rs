//! Face descriptor extraction.
//!
//! [`LbpExtractor`] builds a local-binary-pattern histogram descriptor and
//! needs no model files; [`crate::recognizer::ArcFaceExtractor`] runs the
//! ArcFace network.

use crate::types::{l2_normalize, FaceRegion, FeatureVector, NormalizedImage};
use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::contrast::equalize_histogram;
use thiserror::Error;

// --- Named constants ---
const LBP_EXTRACTOR_ID: &str = "lbp-u2-4x4";
/// Side of the LBP code grid; the resized crop has a 1-pixel border on top.
const LBP_PATCH: u32 = 64;
const LBP_GRID: u32 = 4;
const LBP_CELL: u32 = LBP_PATCH / LBP_GRID;
/// 58 uniform patterns plus one bin shared by all non-uniform ones.
const LBP_BINS: usize = 59;
pub const LBP_DESCRIPTOR_LEN: usize = (LBP_GRID * LBP_GRID) as usize * LBP_BINS;

/// Neighbour offsets, clockwise from the top-left.
const NEIGHBOURS: [(i32, i32); 8] = [(-1, -1), (0, -1), (1, -1), (1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0)];

const UNIFORM_BINS: [u8; 256] = uniform_bin_table();

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("model file not found: {0} — download from insightface and place in the model directory")]
    ModelNotFound(String),
    #[error("face region lies outside the {width}x{height} image")]
    RegionOutOfBounds { width: u32, height: u32 },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Pluggable descriptor backend.
///
/// Implementations must be deterministic and hold no per-call mutable state
/// visible to other calls, so two extractions can run concurrently.
pub trait FeatureExtractor: Send + Sync {
    /// Identifier stamped on every produced vector.
    fn id(&self) -> &str;

    /// Length of every vector this extractor produces.
    fn descriptor_len(&self) -> usize;

    fn extract(&self, image: &NormalizedImage, region: &FaceRegion) -> Result<FeatureVector, ExtractorError>;
}

/// Uniform LBP histogram descriptor over a 4×4 grid of the face crop.
#[derive(Debug, Clone, Default)]
pub struct LbpExtractor;

impl LbpExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Histogram-equalized greyscale face patch with a 1-pixel border.
    fn patch(image: &NormalizedImage, region: &FaceRegion) -> Result<GrayImage, ExtractorError> {
        let rect = region
            .clamp_to(image.width(), image.height())
            .ok_or(ExtractorError::RegionOutOfBounds { width: image.width(), height: image.height() })?;

        let crop = imageops::crop_imm(image.pixels(), rect.x, rect.y, rect.width, rect.height).to_image();
        let gray = imageops::grayscale(&crop);
        let resized = imageops::resize(&gray, LBP_PATCH + 2, LBP_PATCH + 2, FilterType::Triangle);
        Ok(equalize_histogram(&resized))
    }
}

impl FeatureExtractor for LbpExtractor {
    fn id(&self) -> &str {
        LBP_EXTRACTOR_ID
    }

    fn descriptor_len(&self) -> usize {
        LBP_DESCRIPTOR_LEN
    }

    fn extract(&self, image: &NormalizedImage, region: &FaceRegion) -> Result<FeatureVector, ExtractorError> {
        let patch = Self::patch(image, region)?;

        let mut values = vec![0.0f32; LBP_DESCRIPTOR_LEN];
        for y in 0..LBP_PATCH {
            for x in 0..LBP_PATCH {
                let code = lbp_code(&patch, x + 1, y + 1);
                let cell = ((y / LBP_CELL) * LBP_GRID + x / LBP_CELL) as usize;
                values[cell * LBP_BINS + UNIFORM_BINS[code as usize] as usize] += 1.0;
            }
        }

        let cell_pixels = (LBP_CELL * LBP_CELL) as f32;
        values.iter_mut().for_each(|v| *v /= cell_pixels);
        l2_normalize(&mut values);

        Ok(FeatureVector {
            values,
            extractor: LBP_EXTRACTOR_ID.to_string(),
        })
    }
}

/// 8-neighbour binary pattern at (x, y); a bit is set when the neighbour is
/// at least as bright as the centre. Caller guarantees a 1-pixel margin.
fn lbp_code(image: &GrayImage, x: u32, y: u32) -> u8 {
    let center = image.get_pixel(x, y)[0];
    NEIGHBOURS.iter().enumerate().fold(0u8, |code, (bit, &(dx, dy))| {
        let nx = (x as i32 + dx) as u32;
        let ny = (y as i32 + dy) as u32;
        if image.get_pixel(nx, ny)[0] >= center {
            code | (1 << bit)
        } else {
            code
        }
    })
}

/// Map every 8-bit pattern to its uniform-LBP bin.
///
/// Patterns with at most two circular 0/1 transitions get their own bin in
/// ascending code order (58 of them); the rest share the last bin.
const fn uniform_bin_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut next = 0u8;
    let mut code = 0usize;
    while code < 256 {
        let c = code as u8;
        if (c ^ c.rotate_left(1)).count_ones() <= 2 {
            table[code] = next;
            next += 1;
        } else {
            table[code] = (LBP_BINS - 1) as u8;
        }
        code += 1;
    }
    table
}
