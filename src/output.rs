//! Result types produced by a conversion.

use crate::config::PageGeometry;
use crate::pipeline::layout::Placement;
use serde::{Deserialize, Serialize};
use std::fmt;

/// MIME type of every document the pipeline produces.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A finished single-page PDF plus what went into it.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedDocument {
    /// Serialised PDF.
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Page size the document was laid out on.
    pub geometry: PageGeometry,
    /// Where the image was drawn.
    pub placement: Placement,
    /// Pixel width of the embedded image.
    pub image_width: u32,
    /// Pixel height of the embedded image.
    pub image_height: u32,
    /// Timing of the individual stages.
    pub stats: ConversionStats,
}

impl fmt::Debug for RenderedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedDocument")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("geometry", &self.geometry)
            .field("placement", &self.placement)
            .field("image_width", &self.image_width)
            .field("image_height", &self.image_height)
            .field("stats", &self.stats)
            .finish()
    }
}

impl RenderedDocument {
    /// Always `application/pdf`.
    pub fn mime_type(&self) -> &'static str {
        PDF_MIME_TYPE
    }

    /// Consume the document, keeping only the PDF bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Per-stage timings for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Size of the incoming image payload.
    pub input_bytes: usize,
    /// Size of the canonical PNG.
    pub normalized_bytes: usize,
    /// Size of the serialised PDF.
    pub output_bytes: usize,
    pub normalize_duration_ms: u64,
    pub assemble_duration_ms: u64,
    pub total_duration_ms: u64,
}
