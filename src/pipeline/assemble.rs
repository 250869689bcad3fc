//! PDF assembly: one page, one image, one draw instruction.
//!
//! The canonical PNG is decoded back to samples; colour goes into a
//! Flate-compressed `DeviceRGB` image XObject named `Im0`, and alpha (when
//! present) into a `DeviceGray` soft mask. The page content stream is a
//! single `q w 0 0 h x y cm /Im0 Do Q`.
//!
//! ```text
//! Catalog ─▶ Pages ─▶ Page ─┬─▶ Contents (q … cm /Im0 Do Q)
//!                           └─▶ Resources ─▶ XObject /Im0 ─▶ SMask?
//! ```

use super::layout::Placement;
use super::normalize::NormalizedImage;
use crate::config::PageGeometry;
use crate::error::ConvertError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::ImageFormat;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use std::io::Write;
use tracing::debug;

/// PDF version written into the header.
pub const PDF_VERSION: &str = "1.7";

/// Resource name the page uses for its image.
pub const IMAGE_RESOURCE: &str = "Im0";

/// Entries for the document information dictionary.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentInfo<'a> {
    pub producer: &'a str,
    pub title: Option<&'a str>,
}

/// Raw 8-bit samples split into colour and (optional) alpha planes.
struct Samples {
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

/// Build and serialise a single-page PDF holding `image` at `placement`.
pub fn assemble(
    image: &NormalizedImage,
    placement: &Placement,
    geometry: &PageGeometry,
    info: DocumentInfo<'_>,
) -> Result<Vec<u8>, ConvertError> {
    let samples = split_samples(image)?;

    let mut doc = Document::with_version(PDF_VERSION);
    let pages_id = doc.new_object_id();

    // ── Image XObject (+ soft mask) ──────────────────────────────────────
    let mut image_dict = dictionary! {
        "Type" => Object::Name(b"XObject".to_vec()),
        "Subtype" => Object::Name(b"Image".to_vec()),
        "Width" => i64::from(image.width()),
        "Height" => i64::from(image.height()),
        "ColorSpace" => Object::Name(b"DeviceRGB".to_vec()),
        "BitsPerComponent" => 8,
        "Filter" => Object::Name(b"FlateDecode".to_vec()),
    };
    if let Some(alpha) = samples.alpha {
        let smask = Stream::new(
            dictionary! {
                "Type" => Object::Name(b"XObject".to_vec()),
                "Subtype" => Object::Name(b"Image".to_vec()),
                "Width" => i64::from(image.width()),
                "Height" => i64::from(image.height()),
                "ColorSpace" => Object::Name(b"DeviceGray".to_vec()),
                "BitsPerComponent" => 8,
                "Filter" => Object::Name(b"FlateDecode".to_vec()),
            },
            deflate(&alpha)?,
        );
        let smask_id = doc.add_object(smask);
        image_dict.set("SMask", smask_id);
    }
    let image_id = doc.add_object(Stream::new(image_dict, deflate(&samples.rgb)?));

    // ── Page ─────────────────────────────────────────────────────────────
    let content_id = doc.add_object(Stream::new(dictionary! {}, content_stream(placement)?));
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! {
            IMAGE_RESOURCE => image_id,
        },
    });
    let page_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Page".to_vec()),
        "Parent" => pages_id,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            Object::Real(geometry.page_width as f32),
            Object::Real(geometry.page_height as f32),
        ],
        "Contents" => content_id,
        "Resources" => resources_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => Object::Name(b"Pages".to_vec()),
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Catalog".to_vec()),
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut info_dict = lopdf::Dictionary::new();
    info_dict.set(
        "Producer",
        Object::String(info.producer.as_bytes().to_vec(), StringFormat::Literal),
    );
    if let Some(title) = info.title {
        info_dict.set(
            "Title",
            Object::String(title.as_bytes().to_vec(), StringFormat::Literal),
        );
    }
    let info_id = doc.add_object(Object::Dictionary(info_dict));
    doc.trailer.set("Info", info_id);

    // ── Serialise ────────────────────────────────────────────────────────
    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| ConvertError::Assembly {
        detail: format!("PDF serialisation failed: {e}"),
    })?;

    debug!(
        width = image.width(),
        height = image.height(),
        pdf_bytes = out.len(),
        "Assembled PDF"
    );
    Ok(out)
}

/// The page content stream drawing `Im0` into the placement rectangle.
pub fn content_stream(placement: &Placement) -> Result<Vec<u8>, ConvertError> {
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(placement.width as f32),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(placement.height as f32),
                    Object::Real(placement.x as f32),
                    Object::Real(placement.y as f32),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    content.encode().map_err(|e| ConvertError::Assembly {
        detail: format!("content stream encoding failed: {e}"),
    })
}

fn split_samples(image: &NormalizedImage) -> Result<Samples, ConvertError> {
    let pixels = (image.width() as usize)
        .checked_mul(image.height() as usize)
        .ok_or_else(|| ConvertError::Assembly {
            detail: format!(
                "image {}x{} is too large to embed",
                image.width(),
                image.height()
            ),
        })?;

    let decoded = image::load_from_memory_with_format(image.png(), ImageFormat::Png).map_err(
        |e| ConvertError::Assembly {
            detail: format!("normalised PNG could not be read back: {e}"),
        },
    )?;

    if image.has_alpha() {
        let rgba = decoded.into_rgba8();
        let mut rgb = Vec::with_capacity(pixels * 3);
        let mut alpha = Vec::with_capacity(pixels);
        for px in rgba.as_raw().chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
            alpha.push(px[3]);
        }
        Ok(Samples {
            rgb,
            alpha: Some(alpha),
        })
    } else {
        Ok(Samples {
            rgb: decoded.into_rgb8().into_raw(),
            alpha: None,
        })
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let mut enc = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    enc.write_all(data)
        .and_then(|_| enc.finish())
        .map_err(|e| ConvertError::Assembly {
            detail: format!("Flate compression failed: {e}"),
        })
}
