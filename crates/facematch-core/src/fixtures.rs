//! Synthetic face images for tests (`test-support` feature).

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_ellipse_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use std::io::Cursor;

pub const SKIN: [u8; 3] = [224, 172, 140];
pub const SHADE: [u8; 3] = [190, 140, 115];
pub const BACKGROUND: [u8; 3] = [70, 110, 200];
const EYE: [u8; 3] = [20, 20, 60];
const MOUTH: [u8; 3] = [150, 30, 40];

/// Ellipse geometry of one drawn face.
pub struct FaceSpec {
    pub cx: i32,
    pub cy: i32,
    pub rx: i32,
    pub ry: i32,
}

impl FaceSpec {
    /// One face filling the middle of a `width` × `height` canvas.
    pub fn centered(width: u32, height: u32) -> Self {
        Self {
            cx: width as i32 / 2,
            cy: height as i32 / 2 + height as i32 / 40,
            rx: (width as f32 * 0.275) as i32,
            ry: (height as f32 * 0.35) as i32,
        }
    }
}

fn rect(x: f32, y: f32, w: f32, h: f32) -> Rect {
    Rect::at(x as i32, y as i32).of_size((w as u32).max(1), (h as u32).max(1))
}

/// Draw a skin ellipse with eyes, nose shading and a mouth.
pub fn draw_face(img: &mut RgbImage, face: &FaceSpec) {
    let (cx, cy) = (face.cx as f32, face.cy as f32);
    let (rx, ry) = (face.rx as f32, face.ry as f32);

    draw_filled_ellipse_mut(img, (face.cx, face.cy), face.rx, face.ry, Rgb(SKIN));

    let eye_w = rx * 0.33;
    let eye_h = ry * 0.13;
    let eye_y = cy - ry * 0.28;
    draw_filled_rect_mut(img, rect(cx - rx * 0.55, eye_y, eye_w, eye_h), Rgb(EYE));
    draw_filled_rect_mut(img, rect(cx + rx * 0.22, eye_y, eye_w, eye_h), Rgb(EYE));

    draw_filled_rect_mut(img, rect(cx - rx * 0.1, cy - ry * 0.1, rx * 0.2, ry * 0.3), Rgb(SHADE));

    draw_filled_rect_mut(img, rect(cx - rx * 0.36, cy + ry * 0.5, rx * 0.73, ry * 0.11), Rgb(MOUTH));
}

/// A `width` × `height` canvas with one centered face.
pub fn face_image(width: u32, height: u32) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, Rgb(BACKGROUND));
    draw_face(&mut img, &FaceSpec::centered(width, height));
    img
}

pub fn encode_png(img: &RgbImage) -> Vec<u8> {
    encode(&DynamicImage::ImageRgb8(img.clone()), ImageFormat::Png)
}

/// Encode any colour model (grey, grey+alpha, RGBA, ...) in `format`.
pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).expect("image encoding into memory");
    buf.into_inner()
}
