// End-to-end behaviour of the model-free pipeline on synthetic images.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use facematch_core::detector::DetectorError;
use facematch_core::extractor::LbpExtractor;
use facematch_core::fixtures::{draw_face, encode, encode_png, face_image, FaceSpec, BACKGROUND};
use facematch_core::{Backend, DecisionPolicy, FaceLocator, FaceRegion, Metric, NormalizedImage, Pipeline, PipelineConfig};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

fn skin_config() -> PipelineConfig {
    PipelineConfig { backend: Backend::Skin, ..Default::default() }
}

fn pipeline(metric: Metric) -> Pipeline {
    Pipeline::from_config(&PipelineConfig { metric, ..skin_config() }).unwrap()
}

/// Reports the middle half of every image as the face, whatever its colours.
struct CentreLocator;

impl FaceLocator for CentreLocator {
    fn locate(&self, image: &NormalizedImage) -> Result<Vec<FaceRegion>, DetectorError> {
        let (w, h) = (image.width() as f32, image.height() as f32);
        Ok(vec![FaceRegion {
            x: w * 0.25,
            y: h * 0.25,
            width: w * 0.5,
            height: h * 0.5,
            confidence: 1.0,
            landmarks: None,
        }])
    }
}

fn colour_blind_pipeline() -> Pipeline {
    Pipeline::new(
        Box::new(CentreLocator),
        Box::new(LbpExtractor::new()),
        Metric::Cosine,
        DecisionPolicy::new(0.8),
    )
}

fn grey_face_png() -> Vec<u8> {
    let grey = DynamicImage::ImageRgb8(face_image(200, 200)).to_luma8();
    encode(&DynamicImage::ImageLuma8(grey), ImageFormat::Png)
}

fn solid(width: u32, height: u32) -> Vec<u8> {
    encode_png(&RgbImage::from_pixel(width, height, Rgb([128, 128, 128])))
}

fn other_face() -> Vec<u8> {
    let mut img = RgbImage::from_pixel(200, 200, Rgb(BACKGROUND));
    draw_face(&mut img, &FaceSpec { cx: 90, cy: 110, rx: 45, ry: 80 });
    encode_png(&img)
}

#[test]
fn test_identical_face_scenario() {
    let face = encode_png(&face_image(200, 200));
    for metric in [Metric::Cosine, Metric::Euclidean] {
        let result = pipeline(metric).compare(&face, &face);
        assert_eq!(result.error, None, "{metric}");
        assert!(result.is_match, "{metric}");
        assert!(result.similarity_score >= 0.99, "{metric}: {}", result.similarity_score);
    }
}

#[test]
fn test_solid_colour_submitted_scenario() {
    let face = encode_png(&face_image(200, 200));
    let result = pipeline(Metric::Cosine).compare(&solid(100, 100), &face);
    assert!(!result.is_match);
    assert_eq!(result.similarity_score, 0.0);
    assert_eq!(result.error.as_deref(), Some("No face detected in submitted image"));
}

#[test]
fn test_valid_pair_scores_in_unit_interval() {
    let a = encode_png(&face_image(200, 200));
    let b = other_face();
    for metric in [Metric::Cosine, Metric::Euclidean] {
        let result = pipeline(metric).compare(&a, &b);
        assert_eq!(result.error, None);
        assert!((0.0..=1.0).contains(&result.similarity_score), "{}", result.similarity_score);
    }
}

#[test]
fn test_symmetry() {
    let a = encode_png(&face_image(200, 200));
    let b = other_face();
    for metric in [Metric::Cosine, Metric::Euclidean] {
        let p = pipeline(metric);
        let ab = p.compare(&a, &b).similarity_score;
        let ba = p.compare(&b, &a).similarity_score;
        assert!((ab - ba).abs() < 1e-5, "{metric}: {ab} vs {ba}");
    }
}

#[test]
fn test_threshold_monotonic() {
    let a = encode_png(&face_image(200, 200));
    let b = other_face();
    let score = pipeline(Metric::Cosine).compare(&a, &b).similarity_score;

    let lenient = PipelineConfig { threshold: Some(0.0), ..skin_config() };
    assert!(Pipeline::from_config(&lenient).unwrap().compare(&a, &b).is_match);

    let above = (score + 0.001).min(1.0);
    if above > score {
        let strict = PipelineConfig { threshold: Some(above), ..skin_config() };
        let result = Pipeline::from_config(&strict).unwrap().compare(&a, &b);
        assert!(!result.is_match);
        assert_eq!(result.similarity_score, score);
    }
}

#[test]
fn test_encoded_inputs() {
    let face = encode_png(&face_image(200, 200));
    let plain = STANDARD.encode(&face);
    let data_url = format!("data:image/png;base64,{plain}");

    let result = pipeline(Metric::Cosine).compare_encoded(&data_url, &plain);
    assert_eq!(result.error, None);
    assert!(result.is_match);
}

#[test]
fn test_malformed_base64() {
    let face = STANDARD.encode(encode_png(&face_image(200, 200)));
    let result = pipeline(Metric::Cosine).compare_encoded(&face, "@@not-base64@@");
    assert!(!result.is_match);
    assert_eq!(result.similarity_score, 0.0);
    let error = result.error.unwrap();
    assert!(error.contains("decode"), "{error}");
    assert!(error.contains("reference"), "{error}");
}

#[test]
fn test_non_image_bytes() {
    let face = encode_png(&face_image(200, 200));
    let result = pipeline(Metric::Cosine).compare(b"%PDF-1.4 not an image", &face);
    assert!(!result.is_match);
    assert_eq!(result.similarity_score, 0.0);
    assert!(result.error.unwrap().contains("decode"));
}

#[test]
fn test_explicit_parts() {
    let face = encode_png(&face_image(200, 200));
    let p = Pipeline::new(
        Box::new(facematch_core::locator::SkinLocator::new()),
        Box::new(LbpExtractor::new()),
        Metric::Euclidean,
        DecisionPolicy::new(1.0),
    )
    .with_parallel(false);
    let result = p.compare(&face, &face);
    assert!(result.is_match, "identical descriptors reach even a threshold of 1.0");
    assert_eq!(p.extractor_id(), "lbp-u2-4x4");
}

#[test]
fn test_greyscale_input_reflexive() {
    let grey = grey_face_png();
    let result = colour_blind_pipeline().compare(&grey, &grey);
    assert_eq!(result.error, None);
    assert!(result.is_match);
    assert!(result.similarity_score >= 0.99, "{}", result.similarity_score);
}

#[test]
fn test_grey_alpha_against_colour() {
    let colour = face_image(200, 200);
    let grey_alpha = DynamicImage::ImageRgb8(colour.clone()).to_luma_alpha8();
    let grey_alpha = encode(&DynamicImage::ImageLumaA8(grey_alpha), ImageFormat::Png);

    let result = colour_blind_pipeline().compare(&grey_alpha, &encode_png(&colour));
    assert_eq!(result.error, None);
    assert!(result.is_match, "{}", result.similarity_score);
}

#[test]
fn test_skin_backend_cannot_see_greyscale_faces() {
    let grey = grey_face_png();
    let result = pipeline(Metric::Cosine).compare(&grey, &grey);
    assert_eq!(result.error.as_deref(), Some("No face detected in submitted image"));
}
