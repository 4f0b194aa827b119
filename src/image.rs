//! Inbound homework photo validation
//!
//! Decodes the base64 payload sent by the client and derives the media type
//! from the file signature. The client's own `data:` header is never trusted.

use crate::{Error, Result};
use base64::Engine as _;
use serde::{Deserialize, Serialize};

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl MediaType {
    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Gif => "image/gif",
            MediaType::Webp => "image/webp",
        }
    }
}

/// A validated image, ready to be attached to a model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// Base64 body with any data URL prefix and whitespace removed.
    pub base64: String,
    pub media_type: MediaType,
    pub byte_len: usize,
}

impl ImagePayload {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type.mime(), self.base64)
    }
}

pub fn detect_media_type(bytes: &[u8]) -> Option<MediaType> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some(MediaType::Jpeg),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some(MediaType::Png),
        [0x47, 0x49, 0x46, 0x38, ..] => Some(MediaType::Gif),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some(MediaType::Webp),
        _ => None,
    }
}

/// Strip every leading `data:<mime>;base64,` header.
///
/// Some clients wrap an already prefixed string a second time, so this loops
/// until no header remains.
pub fn strip_data_url_prefixes(input: &str) -> &str {
    let mut rest = input.trim();
    while rest.starts_with(DATA_URL_PREFIX) {
        match rest.find(BASE64_MARKER) {
            Some(idx) => rest = rest[idx + BASE64_MARKER.len()..].trim_start(),
            None => break,
        }
    }
    rest
}

/// Validate an inbound base64 image and detect its media type.
pub fn normalize(input: &str) -> Result<ImagePayload> {
    let body: String = strip_data_url_prefixes(input)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if body.is_empty() {
        return Err(Error::InvalidImageFormat("empty image payload".to_string()));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&body)
        .map_err(|e| Error::InvalidImageFormat(format!("payload is not valid base64: {}", e)))?;

    let media_type = detect_media_type(&bytes).ok_or_else(|| {
        tracing::warn!(
            "Unrecognized image signature (first 4 bytes: {:02X?})",
            &bytes[..bytes.len().min(4)]
        );
        Error::InvalidImageFormat("unrecognized image signature".to_string())
    })?;

    tracing::debug!(
        "Normalized {} image ({} bytes)",
        media_type.mime(),
        bytes.len()
    );

    Ok(ImagePayload {
        base64: body,
        media_type,
        byte_len: bytes.len(),
    })
}
