//! # pdfbridge
//!
//! Reply to chat image attachments with a single-page A4 PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image attachment (any raster format)
//!  │
//!  ├─ 1. Gate       image/* MIME family, non-empty
//!  ├─ 2. Normalize  decode + re-encode as 8-bit PNG (spawn_blocking)
//!  ├─ 3. Layout     fit to 90% of the page, keep aspect, center
//!  ├─ 4. Assemble   one-page PDF, one image XObject (spawn_blocking)
//!  └─ 5. Deliver    spool → base64 attachment → chat reply
//! ```
//!
//! Every request is bounded by a timeout and ends in exactly one of three
//! replies: the PDF, a retry prompt (not an image), or a generic failure.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfbridge::{convert, ConversionConfig, ImagePayload};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bytes = std::fs::read("photo.jpg")?;
//!     let doc = convert(ImagePayload::new("image/jpeg", bytes), &ConversionConfig::default()).await?;
//!     std::fs::write("photo.pdf", &doc.bytes)?;
//!     eprintln!("scale {:.3}, {}ms", doc.placement.scale, doc.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `pdfbridge` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | HTTP/WebSocket status server (axum) |
//!
//! Library-only use:
//! ```toml
//! pdfbridge = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod bridge;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pairing;
pub mod pipeline;
pub mod progress;
pub mod replies;
#[cfg(feature = "server")]
pub mod server;
pub mod session;
pub mod spool;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use bridge::{handle_message, InboundMedia, InboundMessage, MessageOutcome, Reply};
pub use config::{BridgeConfig, ConversionConfig, ConversionConfigBuilder, DecodeLimits, PageGeometry};
pub use convert::{
    convert, convert_file, convert_file_observed, convert_observed, convert_sync,
    convert_to_file,
};
pub use error::{BridgeError, ConvertError, FailureKind, ReplyClass};
pub use output::{ConversionStats, RenderedDocument, PDF_MIME_TYPE};
pub use pipeline::encode::OutboundMedia;
pub use pipeline::input::ImagePayload;
pub use pipeline::layout::{compute_layout, Placement};
pub use progress::{ConversionObserver, NoopObserver, Stage};
pub use replies::ReplyTexts;
pub use session::{SessionEvent, SessionState, SessionStatus};
