//! Configuration types for image-to-PDF conversion and the chat bridge.
//!
//! Conversion behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. The bridge adds its own knobs on top in
//! [`BridgeConfig`]. Both are plain data: cheap to clone into every request
//! task and serialisable for logging.

use crate::error::BridgeError;
use crate::replies::ReplyTexts;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A4 width in PDF points.
pub const A4_WIDTH_PT: f64 = 595.0;
/// A4 height in PDF points.
pub const A4_HEIGHT_PT: f64 = 842.0;
/// Fraction of each page axis available for the image.
pub const DEFAULT_MARGIN_FRACTION: f64 = 0.9;

/// Fixed output page and the usable fraction of it.
///
/// Serialised with the option names `pageWidth`, `pageHeight` and
/// `marginFraction`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageGeometry {
    /// Page width in points. Default: 595 (A4).
    pub page_width: f64,
    /// Page height in points. Default: 842 (A4).
    pub page_height: f64,
    /// Usable fraction of each axis, in `(0, 1]`. Default: 0.9.
    pub margin_fraction: f64,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            page_width: A4_WIDTH_PT,
            page_height: A4_HEIGHT_PT,
            margin_fraction: DEFAULT_MARGIN_FRACTION,
        }
    }
}

impl PageGeometry {
    /// Width available to the image once the margin is taken off.
    pub fn usable_width(&self) -> f64 {
        self.page_width * self.margin_fraction
    }

    /// Height available to the image once the margin is taken off.
    pub fn usable_height(&self) -> f64 {
        self.page_height * self.margin_fraction
    }

    /// Check that the geometry can hold an image at all.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.page_width.is_finite() && self.page_width > 0.0) {
            return Err(format!("page width must be > 0, got {}", self.page_width));
        }
        if !(self.page_height.is_finite() && self.page_height > 0.0) {
            return Err(format!("page height must be > 0, got {}", self.page_height));
        }
        if !(self.margin_fraction > 0.0 && self.margin_fraction <= 1.0) {
            return Err(format!(
                "margin fraction must be in (0, 1], got {}",
                self.margin_fraction
            ));
        }
        Ok(())
    }
}

/// Guards applied while decoding untrusted image bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeLimits {
    /// Largest accepted image width in pixels. Default: 16 384.
    pub max_width: u32,
    /// Largest accepted image height in pixels. Default: 16 384.
    pub max_height: u32,
    /// Upper bound on decoder allocations in bytes. Default: 512 MiB.
    pub max_alloc_bytes: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_width: 16_384,
            max_height: 16_384,
            max_alloc_bytes: 512 * 1024 * 1024,
        }
    }
}

/// Configuration for one image-to-PDF conversion.
///
/// # Example
/// ```rust
/// use pdfbridge::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .margin_fraction(0.8)
///     .timeout_ms(10_000)
///     .build()
///     .unwrap();
/// assert_eq!(config.geometry.page_width, 595.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Output page geometry. Default: A4 with a 0.9 usable fraction.
    pub geometry: PageGeometry,

    /// Optional ceiling on the layout scale factor. Default: `None`.
    ///
    /// With no cap a 1×1 pixel image is blown up to fill the usable area
    /// (scale 535.5 on A4). Setting e.g. `Some(4.0)` keeps tiny images small
    /// while still centering them.
    pub max_upscale: Option<f64>,

    /// Decoder guards for hostile input.
    pub limits: DecodeLimits,

    /// Budget for one whole conversion in milliseconds. Default: 30 000.
    pub timeout_ms: u64,

    /// Optional `/Title` written into the PDF info dictionary.
    pub title: Option<String>,

    /// `/Producer` written into the PDF info dictionary.
    pub producer: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            geometry: PageGeometry::default(),
            max_upscale: None,
            limits: DecodeLimits::default(),
            timeout_ms: 30_000,
            title: None,
            producer: format!("pdfbridge {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The per-request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn geometry(mut self, geometry: PageGeometry) -> Self {
        self.config.geometry = geometry;
        self
    }

    pub fn page_size(mut self, width: f64, height: f64) -> Self {
        self.config.geometry.page_width = width;
        self.config.geometry.page_height = height;
        self
    }

    pub fn margin_fraction(mut self, fraction: f64) -> Self {
        self.config.geometry.margin_fraction = fraction;
        self
    }

    pub fn max_upscale(mut self, cap: Option<f64>) -> Self {
        self.config.max_upscale = cap;
        self
    }

    pub fn limits(mut self, limits: DecodeLimits) -> Self {
        self.config.limits = limits;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn producer(mut self, producer: impl Into<String>) -> Self {
        self.config.producer = producer.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, BridgeError> {
        let c = &self.config;
        c.geometry.validate().map_err(BridgeError::InvalidConfig)?;
        if let Some(cap) = c.max_upscale {
            if !(cap.is_finite() && cap > 0.0) {
                return Err(BridgeError::InvalidConfig(format!(
                    "max upscale must be > 0, got {cap}"
                )));
            }
        }
        if c.timeout_ms == 0 {
            return Err(BridgeError::InvalidConfig("Timeout must be ≥ 1 ms".into()));
        }
        if c.limits.max_width == 0 || c.limits.max_height == 0 || c.limits.max_alloc_bytes == 0 {
            return Err(BridgeError::InvalidConfig(
                "Decode limits must be non-zero".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Configuration for the chat bridge around the conversion core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Settings handed to every conversion.
    pub conversion: ConversionConfig,

    /// Texts sent back to chat senders.
    pub replies: ReplyTexts,

    /// Filename suggested for the outbound PDF. Default: `documento.pdf`.
    pub attachment_name: String,

    /// Write each rendered PDF through a temp file before encoding it for the
    /// transport. Default: true.
    pub spool: bool,

    /// Directory for spooled documents. Default: the system temp directory.
    pub spool_dir: Option<PathBuf>,

    /// Maximum number of messages processed at once. Default: 8.
    pub concurrency: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            conversion: ConversionConfig::default(),
            replies: ReplyTexts::default(),
            attachment_name: "documento.pdf".to_string(),
            spool: true,
            spool_dir: None,
            concurrency: 8,
        }
    }
}

impl BridgeConfig {
    /// Directory spooled documents are written to.
    pub fn spool_dir(&self) -> PathBuf {
        self.spool_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Check bridge-level constraints.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.concurrency == 0 {
            return Err(BridgeError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if self.attachment_name.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "Attachment name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_a4_with_ninety_percent_usable() {
        let g = PageGeometry::default();
        assert_eq!(g.page_width, 595.0);
        assert_eq!(g.page_height, 842.0);
        assert_eq!(g.margin_fraction, 0.9);
        assert!((g.usable_width() - 535.5).abs() < 1e-9);
        assert!((g.usable_height() - 757.8).abs() < 1e-9);
    }

    #[test]
    fn geometry_uses_recognised_option_names() {
        let g: PageGeometry =
            serde_json::from_str(r#"{"pageWidth":612,"pageHeight":792,"marginFraction":0.8}"#)
                .unwrap();
        assert_eq!(g.page_width, 612.0);
        assert_eq!(g.page_height, 792.0);
        assert_eq!(g.margin_fraction, 0.8);

        let partial: PageGeometry = serde_json::from_str(r#"{"marginFraction":1.0}"#).unwrap();
        assert_eq!(partial.page_width, 595.0);
    }

    #[test]
    fn builder_rejects_bad_margin() {
        assert!(ConversionConfig::builder().margin_fraction(0.0).build().is_err());
        assert!(ConversionConfig::builder().margin_fraction(1.5).build().is_err());
        assert!(ConversionConfig::builder().margin_fraction(1.0).build().is_ok());
    }

    #[test]
    fn builder_rejects_degenerate_page() {
        assert!(ConversionConfig::builder().page_size(0.0, 842.0).build().is_err());
        assert!(ConversionConfig::builder()
            .page_size(595.0, f64::NAN)
            .build()
            .is_err());
    }

    #[test]
    fn builder_rejects_zero_timeout_and_bad_cap() {
        assert!(ConversionConfig::builder().timeout_ms(0).build().is_err());
        assert!(ConversionConfig::builder()
            .max_upscale(Some(0.0))
            .build()
            .is_err());
        assert!(ConversionConfig::builder()
            .max_upscale(Some(2.0))
            .build()
            .is_ok());
    }

    #[test]
    fn bridge_defaults() {
        let b = BridgeConfig::default();
        assert_eq!(b.attachment_name, "documento.pdf");
        assert!(b.spool);
        assert!(b.validate().is_ok());
        assert_eq!(b.spool_dir(), std::env::temp_dir());
    }

    #[test]
    fn bridge_rejects_zero_concurrency() {
        let b = BridgeConfig {
            concurrency: 0,
            ..BridgeConfig::default()
        };
        assert!(b.validate().is_err());
    }
}
