//! Face localization.
//!
//! [`FaceLocator`] is the pluggable seam. [`crate::seeta::SeetaLocator`] is
//! the default, [`crate::detector::ScrfdLocator`] the ONNX-backed one and
//! [`SkinLocator`] a model-free fallback for colour images.
//!
//! Only the first region returned is used downstream. That is a known
//! simplification: with several faces in frame the "first" one is whatever
//! the locator ranks first, not necessarily the subject.

use crate::detector::DetectorError;
use crate::types::{FaceRegion, NormalizedImage};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::region_labelling::{connected_components, Connectivity};

// --- Named constants ---
const ANALYSIS_MAX_SIDE: u32 = 640;
const MIN_FACE_SIZE: u32 = 24;
const MIN_ASPECT: f32 = 0.75;
const MAX_ASPECT: f32 = 2.2;
const MIN_FILL_RATIO: f32 = 0.35;
const MIN_HOLE_PIXELS: u32 = 4;
const MIN_HOLE_FRACTION: f32 = 0.001;

// YCbCr skin cluster (ITU-R BT.601, full range).
const SKIN_CB: (f32, f32) = (77.0, 127.0);
const SKIN_CR: (f32, f32) = (133.0, 173.0);
const SKIN_MIN_LUMA: f32 = 40.0;

/// Pluggable face localization backend.
pub trait FaceLocator: Send + Sync {
    /// Find face regions in `image`, in a deterministic order.
    ///
    /// An image without faces yields an empty vector, not an error.
    fn locate(&self, image: &NormalizedImage) -> Result<Vec<FaceRegion>, DetectorError>;
}

/// Model-free face locator based on skin-colour segmentation.
///
/// A connected skin blob is reported as a face when it has face-like size,
/// proportions and compactness, and encloses at least one non-skin hole
/// (eyes, mouth). Regions are ordered by blob area, largest first, then
/// top-to-bottom and left-to-right.
///
/// Grey pixels sit at Cb = Cr = 128, outside the skin cluster, so
/// greyscale images never yield a face here.
#[derive(Debug, Clone, Default)]
pub struct SkinLocator;

/// Pixel statistics for one labelled component.
#[derive(Debug, Clone, Copy)]
struct Component {
    label: u32,
    area: u32,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Component {
    fn new(label: u32, x: u32, y: u32) -> Self {
        Self { label, area: 0, min_x: x, min_y: y, max_x: x, max_y: y }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.area += 1;
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    fn fill_ratio(&self) -> f32 {
        self.area as f32 / (self.width() * self.height()) as f32
    }
}

impl SkinLocator {
    pub fn new() -> Self {
        Self
    }

    /// Shape filter applied before the (more expensive) hole check.
    fn plausible(component: &Component) -> bool {
        let (w, h) = (component.width(), component.height());
        if w < MIN_FACE_SIZE || h < MIN_FACE_SIZE {
            return false;
        }
        let aspect = h as f32 / w as f32;
        (MIN_ASPECT..=MAX_ASPECT).contains(&aspect) && component.fill_ratio() >= MIN_FILL_RATIO
    }
}

impl FaceLocator for SkinLocator {
    fn locate(&self, image: &NormalizedImage) -> Result<Vec<FaceRegion>, DetectorError> {
        let (width, height) = (image.width(), image.height());
        if width < MIN_FACE_SIZE || height < MIN_FACE_SIZE {
            return Ok(Vec::new());
        }

        // Analyse a bounded-size copy; regions are mapped back afterwards.
        let long_side = width.max(height);
        let (analysis, factor) = if long_side > ANALYSIS_MAX_SIDE {
            let scale = ANALYSIS_MAX_SIDE as f32 / long_side as f32;
            let new_w = ((width as f32 * scale).round() as u32).max(1);
            let new_h = ((height as f32 * scale).round() as u32).max(1);
            let resized = imageops::resize(image.pixels(), new_w, new_h, FilterType::Triangle);
            (resized, width as f32 / new_w as f32)
        } else {
            (image.pixels().clone(), 1.0)
        };

        let mask = skin_mask(&analysis);
        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

        let mut components: Vec<Option<Component>> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0];
            if label == 0 {
                continue;
            }
            let idx = label as usize;
            if idx >= components.len() {
                components.resize(idx + 1, None);
            }
            components[idx]
                .get_or_insert_with(|| Component::new(label, x, y))
                .add(x, y);
        }

        let mut faces: Vec<Component> = components
            .into_iter()
            .flatten()
            .filter(SkinLocator::plausible)
            .filter(|c| count_holes(&labels, c) > 0)
            .collect();

        faces.sort_by(|a, b| {
            b.area
                .cmp(&a.area)
                .then(a.min_y.cmp(&b.min_y))
                .then(a.min_x.cmp(&b.min_x))
        });

        tracing::debug!(
            width,
            height,
            analysis_width = analysis.width(),
            analysis_height = analysis.height(),
            faces = faces.len(),
            "skin locator finished"
        );

        Ok(faces
            .iter()
            .map(|c| {
                FaceRegion {
                    x: c.min_x as f32,
                    y: c.min_y as f32,
                    width: c.width() as f32,
                    height: c.height() as f32,
                    confidence: c.fill_ratio(),
                    landmarks: None,
                }
                .scaled(factor)
            })
            .collect())
    }
}

/// Whether an RGB pixel falls inside the YCbCr skin cluster.
fn is_skin(r: u8, g: u8, b: u8) -> bool {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;

    y >= SKIN_MIN_LUMA
        && (SKIN_CB.0..=SKIN_CB.1).contains(&cb)
        && (SKIN_CR.0..=SKIN_CR.1).contains(&cr)
}

/// Binary mask: 255 for skin pixels, 0 elsewhere.
fn skin_mask(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        if is_skin(r, g, b) { Luma([255]) } else { Luma([0]) }
    })
}

/// Count non-skin areas fully enclosed by `component`.
///
/// The component's bounding box is padded by one pixel so everything
/// touching the box border joins a single "outside" region; every other
/// 4-connected non-component region is a hole.
fn count_holes(labels: &image::ImageBuffer<Luma<u32>, Vec<u32>>, component: &Component) -> usize {
    let (w, h) = (component.width() + 2, component.height() + 2);
    let outside = GrayImage::from_fn(w, h, |x, y| {
        if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
            return Luma([255]);
        }
        let src_x = component.min_x + x - 1;
        let src_y = component.min_y + y - 1;
        if labels.get_pixel(src_x, src_y)[0] == component.label { Luma([0]) } else { Luma([255]) }
    });

    let regions = connected_components(&outside, Connectivity::Four, Luma([0u8]));
    let border_label = regions.get_pixel(0, 0)[0];

    let mut sizes: Vec<u32> = Vec::new();
    for px in regions.pixels() {
        let label = px[0];
        if label == 0 || label == border_label {
            continue;
        }
        let idx = label as usize;
        if idx >= sizes.len() {
            sizes.resize(idx + 1, 0);
        }
        sizes[idx] += 1;
    }

    let min_hole = MIN_HOLE_PIXELS.max((component.area as f32 * MIN_HOLE_FRACTION) as u32);
    sizes.iter().filter(|&&size| size >= min_hole).count()
}
