//! QR rendering of pairing tokens.
//!
//! The status server hands operators a PNG data URL; the stdio bridge draws
//! the code on the terminal with Unicode half blocks.

use crate::error::BridgeError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{GrayImage, ImageFormat, Luma};
use qrcode::render::unicode::Dense1x2;
use qrcode::{Color, QrCode};
use std::io::Cursor;

/// Side of one QR module in the PNG, in pixels.
pub const MODULE_PIXELS: u32 = 8;
/// Light modules around the symbol.
pub const QUIET_ZONE: u32 = 4;

fn encode(token: &str) -> Result<QrCode, BridgeError> {
    QrCode::new(token.as_bytes()).map_err(|e| BridgeError::PairingCode(e.to_string()))
}

/// Render `token` as a black-on-white grayscale PNG.
pub fn qr_png(token: &str) -> Result<Vec<u8>, BridgeError> {
    let code = encode(token)?;
    let modules = u32::try_from(code.width())
        .map_err(|_| BridgeError::PairingCode("symbol too large".into()))?;
    let colors = code.to_colors();
    let side = (modules + 2 * QUIET_ZONE) * MODULE_PIXELS;

    let img = GrayImage::from_fn(side, side, |x, y| {
        let mx = (x / MODULE_PIXELS).checked_sub(QUIET_ZONE);
        let my = (y / MODULE_PIXELS).checked_sub(QUIET_ZONE);
        let dark = match (mx, my) {
            (Some(mx), Some(my)) if mx < modules && my < modules => {
                colors[(my * modules + mx) as usize] == Color::Dark
            }
            _ => false,
        };
        Luma([if dark { 0 } else { 255 }])
    });

    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| BridgeError::PairingCode(format!("PNG encoding failed: {e}")))?;
    Ok(out)
}

/// `data:image/png;base64,…` URL of the QR code for `token`.
pub fn qr_data_url(token: &str) -> Result<String, BridgeError> {
    Ok(format!(
        "data:image/png;base64,{}",
        STANDARD.encode(qr_png(token)?)
    ))
}

/// The QR code for `token` drawn with half-block characters.
///
/// Colours are inverted so the code scans on dark terminal backgrounds.
pub fn qr_terminal(token: &str) -> Result<String, BridgeError> {
    Ok(encode(token)?
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}
