//! Text-encoded image payloads: optional data-URL prefix plus base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Drop a `<scheme>,` prefix such as `data:image/png;base64,`.
///
/// Everything up to and including the first comma is removed; text without
/// a comma is returned unchanged.
pub fn strip_data_url(text: &str) -> &str {
    match text.split_once(',') {
        Some((_, data)) => data,
        None => text,
    }
}

/// Decode a base64 image payload, tolerating a data-URL prefix and
/// embedded whitespace (line-wrapped base64).
pub fn decode_image_payload(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let data = strip_data_url(text);
    if data.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: Vec<u8> = data.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
        STANDARD.decode(compact)
    } else {
        STANDARD.decode(data)
    }
}
