//! Error types for the pdfbridge library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`]: **Per-request**: one image could not be turned into a
//!   PDF (not an image, corrupt bytes, timeout, assembly fault). The bridge
//!   maps it to exactly one chat reply and carries on with the next message.
//!
//! * [`BridgeError`]: **Fatal to the caller**: the process cannot do what it
//!   was asked (bad configuration, unreadable input file, transport closed,
//!   server could not bind). Returned from the file-based entry points, the
//!   transport loops and the status server.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Why a single conversion request failed.
///
/// Every variant maps to one [`ReplyClass`]; the sender never sees the
/// message text of the error itself.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ConvertError {
    // ── Input errors (user-correctable) ──────────────────────────────────
    /// The declared MIME type is not in the `image/*` family.
    #[error("Unsupported media type '{mime_type}': only images can be converted")]
    UnsupportedMedia { mime_type: String },

    /// The attachment carried no bytes.
    #[error("Attachment is empty")]
    EmptyPayload,

    // ── Internal faults ──────────────────────────────────────────────────
    /// The bytes are not a decodable raster image (or exceed decoder limits).
    #[error("Image decoding failed: {detail}")]
    Decode { detail: String },

    /// The decoded image has a zero dimension; no scale can be computed.
    #[error("Invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Building or serialising the PDF failed.
    #[error("PDF assembly failed: {detail}")]
    Assembly { detail: String },

    /// The request did not finish within the configured budget.
    #[error("Conversion timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// A blocking worker panicked or was cancelled.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse failure category, used for stage reporting and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnsupportedMedia,
    EmptyPayload,
    Decode,
    InvalidDimensions,
    Assembly,
    Timeout,
    Internal,
}

/// The two externally observable failure outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyClass {
    /// Polite prompt asking the sender to send an image instead.
    RetryPrompt,
    /// Generic "something went wrong, please resend" acknowledgment.
    GenericFailure,
}

impl ConvertError {
    /// The failure category of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            ConvertError::UnsupportedMedia { .. } => FailureKind::UnsupportedMedia,
            ConvertError::EmptyPayload => FailureKind::EmptyPayload,
            ConvertError::Decode { .. } => FailureKind::Decode,
            ConvertError::InvalidDimensions { .. } => FailureKind::InvalidDimensions,
            ConvertError::Assembly { .. } => FailureKind::Assembly,
            ConvertError::Timeout { .. } => FailureKind::Timeout,
            ConvertError::Internal(_) => FailureKind::Internal,
        }
    }

    /// Which user-facing reply this failure maps to.
    pub fn reply_class(&self) -> ReplyClass {
        self.kind().reply_class()
    }
}

impl FailureKind {
    /// Input problems the sender can fix get the retry prompt; everything
    /// else is an internal fault.
    pub fn reply_class(self) -> ReplyClass {
        match self {
            FailureKind::UnsupportedMedia | FailureKind::EmptyPayload => ReplyClass::RetryPrompt,
            FailureKind::Decode
            | FailureKind::InvalidDimensions
            | FailureKind::Assembly
            | FailureKind::Timeout
            | FailureKind::Internal => ReplyClass::GenericFailure,
        }
    }
}

/// Errors that abort an operation outside a single chat request.
#[derive(Debug, Error)]
pub enum BridgeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input image was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file extension does not name a known raster format.
    #[error("Cannot infer an image type from '{path}'\nUse one of: png, jpg, jpeg, gif, bmp, webp, tif, tiff.")]
    UnknownImageType { path: PathBuf },

    // ── Conversion ────────────────────────────────────────────────────────
    /// The conversion pipeline rejected the input.
    #[error(transparent)]
    Convert(#[from] ConvertError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Transient storage for an outbound document could not be used.
    #[error("Spool error in '{dir}': {source}")]
    Spool {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading from or writing to the host transport failed.
    #[error("Transport I/O error: {0}")]
    Transport(#[source] std::io::Error),

    /// The reply channel was closed before a reply could be delivered.
    #[error("Reply channel closed")]
    ReplyChannelClosed,

    /// The status server could not start or crashed.
    #[error("Status server error on {addr}: {detail}")]
    Server { addr: String, detail: String },

    /// A pairing token could not be drawn as a QR code.
    #[error("Cannot render pairing QR code: {0}")]
    PairingCode(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
