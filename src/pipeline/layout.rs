//! Page layout: fit an image inside the usable page area, centered.
//!
//! One scale factor serves both axes, so the aspect ratio is preserved. The
//! tighter axis decides it:
//!
//! ```text
//! scale = min(pageWidth·margin / imageWidth, pageHeight·margin / imageHeight)
//! ```
//!
//! Images smaller than the usable area are scaled *up* to fill it. That is
//! the intended behaviour; [`crate::config::ConversionConfig::max_upscale`]
//! is the opt-in cap.

use crate::config::PageGeometry;
use crate::error::ConvertError;
use serde::{Deserialize, Serialize};

/// Where and how large the image is drawn on the page, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub scale: f64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Compute the centered, aspect-preserving placement of an image.
pub fn compute_layout(
    geometry: &PageGeometry,
    image_width: u32,
    image_height: u32,
) -> Result<Placement, ConvertError> {
    compute_layout_capped(geometry, image_width, image_height, None)
}

/// [`compute_layout`] with an optional ceiling on the scale factor.
pub fn compute_layout_capped(
    geometry: &PageGeometry,
    image_width: u32,
    image_height: u32,
    max_upscale: Option<f64>,
) -> Result<Placement, ConvertError> {
    if image_width == 0 || image_height == 0 {
        return Err(ConvertError::InvalidDimensions {
            width: image_width,
            height: image_height,
        });
    }
    geometry
        .validate()
        .map_err(|e| ConvertError::Internal(format!("invalid page geometry: {e}")))?;

    let fit = f64::min(
        geometry.usable_width() / f64::from(image_width),
        geometry.usable_height() / f64::from(image_height),
    );
    let scale = match max_upscale {
        Some(cap) if cap > 0.0 => fit.min(cap),
        _ => fit,
    };

    // `usable / w * w` can land one ulp past the page edge.
    let width = (f64::from(image_width) * scale).min(geometry.page_width);
    let height = (f64::from(image_height) * scale).min(geometry.page_height);

    Ok(Placement {
        scale,
        x: (geometry.page_width - width) / 2.0,
        y: (geometry.page_height - height) / 2.0,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn a4() -> PageGeometry {
        PageGeometry::default()
    }

    fn assert_centered(p: &Placement, g: &PageGeometry) {
        assert_eq!(p.x, (g.page_width - p.width) / 2.0);
        assert_eq!(p.y, (g.page_height - p.height) / 2.0);
        assert!(p.x + p.width <= g.page_width + EPS);
        assert!(p.y + p.height <= g.page_height + EPS);
        assert!(p.width > 0.0 && p.height > 0.0);
    }

    #[test]
    fn one_pixel_image_is_upscaled_to_the_width_bound() {
        let p = compute_layout(&a4(), 1, 1).unwrap();
        assert!((p.scale - 535.5).abs() < EPS, "scale = {}", p.scale);
        assert!((p.width - 535.5).abs() < EPS);
        assert!((p.height - 535.5).abs() < EPS);
        assert!(p.scale > 1.0, "small images must be upscaled");
        assert!((p.x - 29.75).abs() < EPS);
        assert!((p.y - 153.25).abs() < EPS);
        assert_centered(&p, &a4());
    }

    #[test]
    fn wide_image_is_width_bound() {
        let p = compute_layout(&a4(), 4000, 1000).unwrap();
        assert!((p.scale - 535.5 / 4000.0).abs() < EPS);
        assert!((p.width - 535.5).abs() < EPS);
        assert!((p.height - 133.875).abs() < EPS);
        assert_centered(&p, &a4());
    }

    #[test]
    fn tall_image_is_height_bound() {
        let p = compute_layout(&a4(), 1000, 4000).unwrap();
        assert!((p.scale - 757.8 / 4000.0).abs() < EPS);
        assert!((p.height - 757.8).abs() < EPS);
        assert!((p.width - 189.45).abs() < EPS);
        assert_centered(&p, &a4());
    }

    #[test]
    fn scale_matches_formula_and_preserves_aspect_ratio() {
        let sizes = [
            (1, 1),
            (1, 5000),
            (5000, 1),
            (640, 480),
            (480, 640),
            (595, 842),
            (3024, 4032),
            (12, 7),
        ];
        for (w, h) in sizes {
            let p = compute_layout(&a4(), w, h).unwrap();
            let expected = f64::min(535.5 / w as f64, 757.8 / h as f64);
            assert!(
                (p.scale - expected).abs() < 1e-9 * expected.max(1.0),
                "{w}x{h}: scale {} != {expected}",
                p.scale
            );
            let ratio_in = w as f64 / h as f64;
            let ratio_out = p.width / p.height;
            assert!(
                (ratio_in - ratio_out).abs() < 1e-9 * ratio_in.max(1.0),
                "{w}x{h}: aspect {ratio_out} != {ratio_in}"
            );
            assert_centered(&p, &a4());
        }
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert_eq!(
            compute_layout(&a4(), 0, 10),
            Err(ConvertError::InvalidDimensions {
                width: 0,
                height: 10
            })
        );
        assert!(matches!(
            compute_layout(&a4(), 10, 0),
            Err(ConvertError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn cap_limits_upscaling_but_keeps_centering() {
        let p = compute_layout_capped(&a4(), 10, 10, Some(2.0)).unwrap();
        assert_eq!(p.scale, 2.0);
        assert_eq!(p.width, 20.0);
        assert_centered(&p, &a4());
    }

    #[test]
    fn cap_does_not_affect_downscaling() {
        let uncapped = compute_layout(&a4(), 4000, 3000).unwrap();
        let capped = compute_layout_capped(&a4(), 4000, 3000, Some(1.0)).unwrap();
        assert_eq!(uncapped, capped);
    }

    #[test]
    fn full_margin_touches_the_tight_edges() {
        let g = PageGeometry {
            margin_fraction: 1.0,
            ..a4()
        };
        let p = compute_layout(&g, 595, 100).unwrap();
        assert_eq!(p.x, 0.0);
        assert!((p.width - 595.0).abs() < EPS);
        assert_centered(&p, &g);
    }

    #[test]
    fn full_margin_never_leaves_the_page() {
        let g = PageGeometry {
            margin_fraction: 1.0,
            ..a4()
        };
        for w in 1..=700u32 {
            for h in [1u32, 3, 7, 49, 97, 841, 843, 5000] {
                let p = compute_layout(&g, w, h).unwrap();
                assert!(p.width <= g.page_width, "{w}x{h}: width {}", p.width);
                assert!(p.height <= g.page_height, "{w}x{h}: height {}", p.height);
                assert!(p.x >= 0.0 && p.y >= 0.0, "{w}x{h}: origin ({}, {})", p.x, p.y);
            }
        }
    }

    #[test]
    fn invalid_geometry_is_an_internal_fault() {
        let g = PageGeometry {
            margin_fraction: 0.0,
            ..a4()
        };
        assert!(matches!(
            compute_layout(&g, 10, 10),
            Err(ConvertError::Internal(_))
        ));
    }
}
