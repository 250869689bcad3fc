//! Image normalisation: any raster encoding → canonical 8-bit PNG.
//!
//! The decoder sniffs the real format from the bytes, so a JPEG declared as
//! `image/png` still decodes. Whatever comes in, the output is an 8-bit PNG
//! (RGBA if the source has alpha, RGB otherwise) so that the assembler has a
//! single embedding path.

use super::input::{check_mime, ImagePayload};
use crate::config::DecodeLimits;
use crate::error::ConvertError;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader, Limits};
use std::io::Cursor;
use tracing::debug;

/// A decoded image re-encoded as PNG, with its pixel dimensions.
#[derive(Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    png: Vec<u8>,
    width: u32,
    height: u32,
    has_alpha: bool,
}

impl std::fmt::Debug for NormalizedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedImage")
            .field("png", &format_args!("<{} bytes>", self.png.len()))
            .field("width", &self.width)
            .field("height", &self.height)
            .field("has_alpha", &self.has_alpha)
            .finish()
    }
}

impl NormalizedImage {
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }
}

/// Decode `payload` and re-encode it as canonical PNG.
///
/// # Errors
/// - [`ConvertError::UnsupportedMedia`] if the MIME type is not `image/*`
/// - [`ConvertError::EmptyPayload`] if there are no bytes
/// - [`ConvertError::Decode`] if the bytes are not a supported raster image
///   or exceed `limits`
/// - [`ConvertError::InvalidDimensions`] if the image has a zero dimension
pub fn normalize(
    payload: &ImagePayload,
    limits: &DecodeLimits,
) -> Result<NormalizedImage, ConvertError> {
    check_mime(&payload.mime_type)?;
    if payload.bytes.is_empty() {
        return Err(ConvertError::EmptyPayload);
    }

    let mut reader = ImageReader::new(Cursor::new(payload.bytes.as_slice()))
        .with_guessed_format()
        .map_err(|e| ConvertError::Decode {
            detail: format!("could not read image header: {e}"),
        })?;

    let format = reader.format().ok_or_else(|| ConvertError::Decode {
        detail: "unrecognised image format".to_string(),
    })?;
    if !format
        .to_mime_type()
        .eq_ignore_ascii_case(payload.mime_type.split(';').next().unwrap_or("").trim())
    {
        debug!(
            declared = %payload.mime_type,
            detected = format.to_mime_type(),
            "Declared MIME type differs from image content"
        );
    }

    reader.limits(decoder_limits(limits));
    let decoded = reader.decode().map_err(decode_error)?;

    let (width, height) = (decoded.width(), decoded.height());
    if width == 0 || height == 0 {
        return Err(ConvertError::InvalidDimensions { width, height });
    }

    let has_alpha = decoded.color().has_alpha();
    let canonical = if has_alpha {
        DynamicImage::ImageRgba8(decoded.into_rgba8())
    } else {
        DynamicImage::ImageRgb8(decoded.into_rgb8())
    };

    let mut png = Vec::new();
    canonical
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| ConvertError::Decode {
            detail: format!("PNG re-encoding failed: {e}"),
        })?;

    debug!(
        source = ?format,
        width,
        height,
        has_alpha,
        png_bytes = png.len(),
        "Normalised image"
    );

    Ok(NormalizedImage {
        png,
        width,
        height,
        has_alpha,
    })
}

fn decoder_limits(limits: &DecodeLimits) -> Limits {
    let mut l = Limits::default();
    l.max_image_width = Some(limits.max_width);
    l.max_image_height = Some(limits.max_height);
    l.max_alloc = Some(limits.max_alloc_bytes);
    l
}

fn decode_error(e: ImageError) -> ConvertError {
    let detail = match &e {
        ImageError::Limits(_) => format!("image exceeds decoder limits: {e}"),
        ImageError::Unsupported(_) => format!("unsupported image variant: {e}"),
        _ => e.to_string(),
    };
    ConvertError::Decode { detail }
}
