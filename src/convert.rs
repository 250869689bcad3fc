//! Conversion entry points: one image in, one single-page PDF out.
//!
//! [`convert`] and [`convert_observed`] run the full request state machine
//! on an in-memory payload. The file helpers ([`convert_file`],
//! [`convert_to_file`]) sit on top for the CLI and library users who start
//! from a path.
//!
//! ## Timeouts
//!
//! The whole run is bounded by [`ConversionConfig::timeout_ms`]. Decode and
//! serialisation happen on the blocking pool, which cannot be interrupted:
//! when the budget expires the caller gets [`ConvertError::Timeout`] right
//! away and whatever the worker produces later is dropped.

use crate::config::ConversionConfig;
use crate::error::{BridgeError, ConvertError};
use crate::output::{ConversionStats, RenderedDocument};
use crate::pipeline::assemble::{self, DocumentInfo};
use crate::pipeline::input::{self, ImagePayload};
use crate::pipeline::layout;
use crate::pipeline::normalize;
use crate::progress::{ConversionObserver, NoopObserver, Stage};
use image::ImageFormat;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Convert an image payload into a single-page PDF.
///
/// # Errors
/// Every failure is a [`ConvertError`]; use
/// [`ConvertError::reply_class`] to pick the reply for the sender.
pub async fn convert(
    payload: ImagePayload,
    config: &ConversionConfig,
) -> Result<RenderedDocument, ConvertError> {
    convert_observed(payload, config, &NoopObserver).await
}

/// [`convert`], reporting every stage transition to `observer`.
///
/// The observer sees `Received` first and exactly one terminal stage
/// (`Completed` or `Failed`) last.
pub async fn convert_observed(
    payload: ImagePayload,
    config: &ConversionConfig,
    observer: &dyn ConversionObserver,
) -> Result<RenderedDocument, ConvertError> {
    let started = Instant::now();
    observer.on_stage(Stage::Received);
    info!(
        mime_type = %payload.mime_type,
        bytes = payload.bytes.len(),
        "Conversion started"
    );

    let result = match tokio::time::timeout(
        config.timeout(),
        run_stages(payload, config, observer, started),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(ConvertError::Timeout {
            elapsed_ms: elapsed_ms(started),
        }),
    };

    match &result {
        Ok(doc) => {
            observer.on_stage(Stage::Completed);
            info!(
                bytes = doc.bytes.len(),
                scale = doc.placement.scale,
                total_ms = doc.stats.total_duration_ms,
                "Conversion complete"
            );
        }
        Err(e) => {
            observer.on_stage(Stage::Failed(e.kind()));
            log_failure(e);
        }
    }
    result
}

async fn run_stages(
    payload: ImagePayload,
    config: &ConversionConfig,
    observer: &dyn ConversionObserver,
    started: Instant,
) -> Result<RenderedDocument, ConvertError> {
    // ── Step 1: Validation gate ──────────────────────────────────────────
    observer.on_stage(Stage::Validating);
    input::validate(&payload)?;
    let input_bytes = payload.bytes.len();

    // ── Step 2: Normalize to PNG ─────────────────────────────────────────
    observer.on_stage(Stage::Normalizing);
    let normalize_start = Instant::now();
    let limits = config.limits;
    let image = tokio::task::spawn_blocking(move || normalize::normalize(&payload, &limits))
        .await
        .map_err(|e| ConvertError::Internal(format!("normalize worker failed: {e}")))??;
    let normalize_duration_ms = elapsed_ms(normalize_start);
    debug!(
        width = image.width(),
        height = image.height(),
        png_bytes = image.png().len(),
        "Normalized in {}ms",
        normalize_duration_ms
    );

    // ── Step 3: Layout ───────────────────────────────────────────────────
    observer.on_stage(Stage::LayingOut);
    let geometry = config.geometry;
    let placement =
        layout::compute_layout_capped(&geometry, image.width(), image.height(), config.max_upscale)?;
    debug!(
        scale = placement.scale,
        x = placement.x,
        y = placement.y,
        "Placed {}x{} image",
        image.width(),
        image.height()
    );

    // ── Step 4: Assemble PDF ─────────────────────────────────────────────
    observer.on_stage(Stage::Assembling);
    let assemble_start = Instant::now();
    let (image_width, image_height) = (image.width(), image.height());
    let normalized_bytes = image.png().len();
    let producer = config.producer.clone();
    let title = config.title.clone();
    let bytes = tokio::task::spawn_blocking(move || {
        let info = DocumentInfo {
            producer: &producer,
            title: title.as_deref(),
        };
        assemble::assemble(&image, &placement, &geometry, info)
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("assemble worker failed: {e}")))??;
    let assemble_duration_ms = elapsed_ms(assemble_start);

    let stats = ConversionStats {
        input_bytes,
        normalized_bytes,
        output_bytes: bytes.len(),
        normalize_duration_ms,
        assemble_duration_ms,
        total_duration_ms: elapsed_ms(started),
    };

    Ok(RenderedDocument {
        bytes,
        geometry,
        placement,
        image_width,
        image_height,
        stats,
    })
}

/// Convert an image file, inferring its MIME type from the extension.
///
/// # Errors
/// - [`BridgeError::FileNotFound`] / [`BridgeError::PermissionDenied`]
/// - [`BridgeError::UnknownImageType`] if the extension names no raster format
/// - [`BridgeError::Convert`] for any conversion failure
pub async fn convert_file(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<RenderedDocument, BridgeError> {
    let payload = read_image_file(path.as_ref()).await?;
    Ok(convert(payload, config).await?)
}

/// [`convert_file`] with stage reporting.
pub async fn convert_file_observed(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
    observer: &dyn ConversionObserver,
) -> Result<RenderedDocument, BridgeError> {
    let payload = read_image_file(path.as_ref()).await?;
    Ok(convert_observed(payload, config, observer).await?)
}

/// Convert an image file and write the PDF to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, BridgeError> {
    let doc = convert_file(input_path, config).await?;
    write_document(&doc, output_path.as_ref()).await?;
    Ok(doc.stats)
}

/// Write a rendered document to `path` atomically.
pub async fn write_document(doc: &RenderedDocument, path: &Path) -> Result<(), BridgeError> {
    let write_err = |source| BridgeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &doc.bytes)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    debug!("Wrote {} bytes to {}", doc.bytes.len(), path.display());
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    payload: ImagePayload,
    config: &ConversionConfig,
) -> Result<RenderedDocument, BridgeError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| BridgeError::Internal(format!("Failed to create tokio runtime: {e}")))?;
    Ok(runtime.block_on(convert(payload, config))?)
}

/// Default output path for an input image: same stem, `.pdf` extension.
pub fn suggested_filename(input: &Path) -> PathBuf {
    input.with_extension("pdf")
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn read_image_file(path: &Path) -> Result<ImagePayload, BridgeError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => BridgeError::FileNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => BridgeError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => BridgeError::Internal(format!("reading {}: {e}", path.display())),
    })?;

    let format = ImageFormat::from_path(path).map_err(|_| BridgeError::UnknownImageType {
        path: path.to_path_buf(),
    })?;
    Ok(ImagePayload::new(format.to_mime_type(), bytes))
}

fn log_failure(e: &ConvertError) {
    match e {
        ConvertError::UnsupportedMedia { .. } | ConvertError::EmptyPayload => {
            info!(kind = ?e.kind(), "Rejected attachment: {e}");
        }
        ConvertError::Decode { .. }
        | ConvertError::InvalidDimensions { .. }
        | ConvertError::Timeout { .. } => {
            warn!(kind = ?e.kind(), "Conversion failed: {e}");
        }
        ConvertError::Assembly { .. } | ConvertError::Internal(_) => {
            error!(kind = ?e.kind(), "Conversion failed: {e}");
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
