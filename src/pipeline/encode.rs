//! Attachment encoding: rendered PDF → base64 media for the chat transport.
//!
//! Chat transports carry attachments as base64 text alongside a MIME type and
//! a filename, so this is the last step before a document leaves the bridge.

use crate::output::{RenderedDocument, PDF_MIME_TYPE};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An attachment in transport form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMedia {
    pub mimetype: String,
    /// Base64 (standard alphabet, padded) file content.
    pub data: String,
    pub filename: String,
}

/// Encode raw PDF bytes as an outbound `application/pdf` attachment.
pub fn encode_pdf(bytes: &[u8], filename: &str) -> OutboundMedia {
    let data = STANDARD.encode(bytes);
    debug!("Encoded PDF → {} bytes base64", data.len());
    OutboundMedia {
        mimetype: PDF_MIME_TYPE.to_string(),
        data,
        filename: filename.to_string(),
    }
}

/// Encode a rendered document under the given filename.
pub fn encode_document(doc: &RenderedDocument, filename: &str) -> OutboundMedia {
    encode_pdf(&doc.bytes, filename)
}
