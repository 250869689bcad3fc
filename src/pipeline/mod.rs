//! Pipeline stages for image-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step and is pure
//! apart from logging; sequencing, timeouts and failure mapping live in
//! [`crate::convert`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ normalize ──▶ layout ──▶ assemble ──▶ encode
//! (gate)    (→ PNG)       (geometry) (lopdf)      (base64)
//! ```
//!
//! 1. [`input`]: MIME-family gate and transport base64 decoding
//! 2. [`normalize`]: decode any raster format, re-encode as 8-bit PNG
//! 3. [`layout`]: centered, aspect-preserving placement on the page
//! 4. [`assemble`]: single-page PDF with one image XObject
//! 5. [`encode`]: base64 attachment for the chat transport

pub mod assemble;
pub mod encode;
pub mod input;
pub mod layout;
pub mod normalize;
