//! Payload intake: the validation gate in front of the decoder.
//!
//! An attachment is only allowed to reach [`super::normalize`] once it
//! declares an `image/*` MIME type and carries at least one byte. Transport
//! layers deliver attachments as base64 text, so the decoding of that text
//! lives here too.

use crate::error::ConvertError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use tracing::debug;

/// MIME family every accepted attachment must belong to.
pub const IMAGE_MIME_PREFIX: &str = "image/";

/// Raw attachment bytes plus the MIME type the sender declared.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Build a payload from transport-encoded (base64) data.
    pub fn from_base64(mime_type: impl Into<String>, data: &str) -> Result<Self, ConvertError> {
        let bytes = decode_base64(data)?;
        Ok(Self::new(mime_type, bytes))
    }
}

/// Check if a declared MIME type belongs to the raster-image family.
///
/// Matching is case-insensitive and ignores parameters (`image/png; q=1`).
pub fn is_image_mime(mime_type: &str) -> bool {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    essence.len() > IMAGE_MIME_PREFIX.len()
        && essence
            .get(..IMAGE_MIME_PREFIX.len())
            .is_some_and(|family| family.eq_ignore_ascii_case(IMAGE_MIME_PREFIX))
}

/// Check the MIME type alone, before the bytes are even looked at.
pub fn check_mime(mime_type: &str) -> Result<(), ConvertError> {
    if is_image_mime(mime_type) {
        Ok(())
    } else {
        Err(ConvertError::UnsupportedMedia {
            mime_type: mime_type.to_string(),
        })
    }
}

/// The validation gate: image MIME type and a non-empty body.
pub fn validate(payload: &ImagePayload) -> Result<(), ConvertError> {
    check_mime(&payload.mime_type)?;
    if payload.bytes.is_empty() {
        return Err(ConvertError::EmptyPayload);
    }
    debug!(
        mime = %payload.mime_type,
        bytes = payload.bytes.len(),
        "Payload passed validation"
    );
    Ok(())
}

/// Decode transport base64, tolerating surrounding whitespace and line breaks.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, ConvertError> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(ConvertError::EmptyPayload);
    }
    STANDARD.decode(compact.as_bytes()).map_err(|e| ConvertError::Decode {
        detail: format!("attachment is not valid base64: {e}"),
    })
}
