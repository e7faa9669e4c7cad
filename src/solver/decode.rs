//! Tile payload decoding.

use base64::Engine;
use image::DynamicImage;
use thiserror::Error;

use super::types::TilePayload;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Tile has no image data")]
    MissingPayload,

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Payload is not an image (detected {0})")]
    NotAnImage(String),

    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}

/// Strip a `data:<mime>;base64,` prefix, if any.
pub fn strip_data_uri(data: &str) -> &str {
    let data = data.trim();
    match data.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, body)| body).unwrap_or(""),
        None => data,
    }
}

/// Decode base64 text (with or without data-URI prefix) into raw bytes.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, DecodeError> {
    let body: String = strip_data_uri(data)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if body.is_empty() {
        return Err(DecodeError::MissingPayload);
    }
    Ok(base64::engine::general_purpose::STANDARD.decode(body)?)
}

/// Sniff the bytes and decode them as an image.
pub fn decode_image_bytes(bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::MissingPayload);
    }
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {}
        Some(kind) => return Err(DecodeError::NotAnImage(kind.mime_type().to_string())),
        None => return Err(DecodeError::NotAnImage("unknown".to_string())),
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Decode a tile payload into an image.
pub fn decode_payload(payload: &TilePayload) -> Result<DynamicImage, DecodeError> {
    match payload {
        TilePayload::Base64(data) => decode_image_bytes(&decode_base64(data)?),
        TilePayload::Bytes(bytes) => decode_image_bytes(bytes),
    }
}
