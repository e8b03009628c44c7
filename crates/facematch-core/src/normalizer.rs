//! Image decoding into the canonical RGB8 layout.

use crate::types::NormalizedImage;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("image buffer is empty")]
    Empty,
    #[error("unrecognized image format")]
    UnknownFormat,
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Decode(#[from] image::ImageError),
    #[error("image dimensions are zero")]
    ZeroDimensions,
}

/// Decode an encoded image (format detected from its magic bytes) into an
/// upright 8-bit RGB pixel grid.
///
/// EXIF orientation is applied when present. Alpha is dropped, greyscale is
/// replicated across channels and 16-bit samples are truncated.
pub fn normalize(bytes: &[u8]) -> Result<NormalizedImage, NormalizeError> {
    if bytes.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader.format().ok_or(NormalizeError::UnknownFormat)?;

    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut decoded = DynamicImage::from_decoder(decoder)?;
    decoded.apply_orientation(orientation);

    tracing::trace!(
        ?format,
        ?orientation,
        color = ?decoded.color(),
        width = decoded.width(),
        height = decoded.height(),
        "decoded image"
    );

    NormalizedImage::new(decoded.into_rgb8()).ok_or(NormalizeError::ZeroDimensions)
}
