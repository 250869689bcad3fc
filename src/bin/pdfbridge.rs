//! CLI binary for pdfbridge.
//!
//! A thin shim over the library crate that maps CLI flags onto
//! `ConversionConfig` / `BridgeConfig` and runs one of three modes:
//! one-off file conversion, the stdio bridge, or the bridge plus the
//! status server.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdfbridge::convert::{convert_file_observed, suggested_filename, write_document};
use pdfbridge::transport::stdio::run_stdio;
use pdfbridge::{
    BridgeConfig, ConversionConfig, ConversionObserver, ReplyTexts, SessionState, SessionStatus,
    Stage,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI stage observer using indicatif ───────────────────────────────────────

/// Shows the current stage of one image on the shared progress bar.
struct BarObserver {
    bar: ProgressBar,
    label: String,
}

impl ConversionObserver for BarObserver {
    fn on_stage(&self, stage: Stage) {
        if !stage.is_terminal() {
            self.bar
                .set_message(format!("{}  {}", self.label, dim(&stage.to_string())));
        }
    }
}

fn progress_bar(total: usize) -> ProgressBar {
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} images  {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

    let bar = ProgressBar::new(total as u64);
    bar.set_style(style);
    bar.set_prefix("Converting");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one image next to itself (photo.jpg → photo.pdf)
  pdfbridge convert photo.jpg

  # Convert to a specific file
  pdfbridge convert scan.png -o receipt.pdf

  # Convert several images into a directory
  pdfbridge convert *.jpg -o pdfs/

  # Run the bridge behind a chat host speaking JSON lines on stdio
  # (pairing QR codes are drawn on stderr)
  chat-host | pdfbridge run | chat-host-replies

  # Bridge plus status server on port 8080
  PORT=8080 pdfbridge serve

STDIO PROTOCOL (one JSON object per line):
  host → bridge   {"type":"qr","token":"…"}
                  {"type":"ready"}  {"type":"disconnected"}
                  {"type":"message","id":"…","from":"…","media":{"mimetype":"image/jpeg","data":"<base64>"}}
  bridge → host   {"type":"reply_text","to":"…","body":"…"}
                  {"type":"reply_media","to":"…","media":{"mimetype":"application/pdf","data":"…","filename":"documento.pdf"}}
                  {"type":"restart"}

STATUS SERVER (serve):
  GET  /api/test     health check
  GET  /api/status   {"type":"ready"} | {"type":"qr","qr":"data:image/png;base64,…","timestamp":…} | {"type":"waiting"}
  POST /api/restart  ask the host to restart its session
  GET  /ws           live status updates

ENVIRONMENT VARIABLES:
  RUST_LOG              Log filter (overrides -v / -q); logs go to stderr
  PORT                  Status server port (default 3001)
  PDFBRIDGE_*           Every flag has an env var, e.g. PDFBRIDGE_TIMEOUT_MS
"#;

/// Turn chat image attachments into single-page A4 PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "pdfbridge",
    version,
    about = "Turn chat image attachments into single-page A4 PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFBRIDGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFBRIDGE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert image files to PDF.
    Convert {
        /// Image files (png, jpg, gif, bmp, webp, tiff).
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Output file (one image) or directory (several images).
        #[arg(short, long, env = "PDFBRIDGE_OUTPUT")]
        output: Option<PathBuf>,

        /// Disable progress bar.
        #[arg(long, env = "PDFBRIDGE_NO_PROGRESS")]
        no_progress: bool,

        #[command(flatten)]
        conversion: ConversionArgs,
    },

    /// Run the chat bridge on stdin/stdout (JSON lines).
    Run {
        #[command(flatten)]
        bridge: BridgeArgs,
    },

    /// Run the chat bridge plus the HTTP/WebSocket status server.
    #[cfg(feature = "server")]
    Serve {
        #[command(flatten)]
        bridge: BridgeArgs,

        /// Address to bind the status server to.
        #[arg(long, env = "PDFBRIDGE_HOST", default_value = pdfbridge::server::DEFAULT_HOST)]
        host: String,

        /// Status server port.
        #[arg(long, env = "PORT", default_value_t = pdfbridge::server::DEFAULT_PORT)]
        port: u16,
    },
}

#[derive(Args, Debug, Clone)]
struct ConversionArgs {
    /// Page width in points.
    #[arg(long, env = "PDFBRIDGE_PAGE_WIDTH", default_value_t = pdfbridge::config::A4_WIDTH_PT)]
    page_width: f64,

    /// Page height in points.
    #[arg(long, env = "PDFBRIDGE_PAGE_HEIGHT", default_value_t = pdfbridge::config::A4_HEIGHT_PT)]
    page_height: f64,

    /// Usable fraction of each page axis, in (0, 1].
    #[arg(long, env = "PDFBRIDGE_MARGIN", default_value_t = pdfbridge::config::DEFAULT_MARGIN_FRACTION)]
    margin: f64,

    /// Never scale an image up by more than this factor.
    #[arg(long, env = "PDFBRIDGE_MAX_UPSCALE")]
    max_upscale: Option<f64>,

    /// Per-image time budget in milliseconds.
    #[arg(long, env = "PDFBRIDGE_TIMEOUT_MS", default_value_t = 30_000)]
    timeout_ms: u64,

    /// Title written into the PDF metadata.
    #[arg(long, env = "PDFBRIDGE_TITLE")]
    title: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct BridgeArgs {
    #[command(flatten)]
    conversion: ConversionArgs,

    /// Filename offered for outbound PDFs.
    #[arg(long, env = "PDFBRIDGE_ATTACHMENT_NAME", default_value = "documento.pdf")]
    attachment_name: String,

    /// JSON file overriding reply texts (processing, success, retry_prompt, generic_failure).
    #[arg(long, env = "PDFBRIDGE_REPLIES")]
    replies: Option<PathBuf>,

    /// Encode PDFs straight from memory instead of spooling them to disk.
    #[arg(long, env = "PDFBRIDGE_NO_SPOOL")]
    no_spool: bool,

    /// Directory for spooled PDFs (default: system temp dir).
    #[arg(long, env = "PDFBRIDGE_SPOOL_DIR")]
    spool_dir: Option<PathBuf>,

    /// Maximum messages converted at once.
    #[arg(short, long, env = "PDFBRIDGE_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // stdout carries the protocol in `run`/`serve`, so logs always go to
    // stderr. The progress bar replaces INFO logs in `convert`.
    let show_progress = matches!(
        &cli.command,
        Command::Convert { no_progress: false, .. }
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Convert {
            images,
            output,
            conversion,
            ..
        } => {
            let config = build_conversion(&conversion)?;
            convert_images(&images, output.as_deref(), &config, show_progress, cli.quiet).await
        }
        Command::Run { bridge } => {
            let config = Arc::new(build_bridge(&bridge).await?);
            let session = Arc::new(SessionState::new());
            tokio::spawn(print_pairing_codes(session.subscribe()));
            tokio::select! {
                result = run_stdio(config, session) => result.context("Bridge failed"),
                () = shutdown_signal() => Ok(()),
            }
        }
        #[cfg(feature = "server")]
        Command::Serve { bridge, host, port } => {
            let config = Arc::new(build_bridge(&bridge).await?);
            let session = Arc::new(SessionState::new());
            let addr = format!("{host}:{port}");
            tokio::select! {
                result = run_stdio(config, Arc::clone(&session)) => result.context("Bridge failed"),
                result = pdfbridge::server::serve(&addr, session, shutdown_signal()) => {
                    result.with_context(|| format!("Status server on {addr} failed"))
                }
            }
        }
    }
}

/// Draw each new pairing token as a QR code on stderr.
async fn print_pairing_codes(mut changes: watch::Receiver<SessionStatus>) {
    while changes.changed().await.is_ok() {
        let status = changes.borrow_and_update().clone();
        let SessionStatus::Pairing { token, .. } = status else {
            continue;
        };
        match pdfbridge::pairing::qr_terminal(&token) {
            Ok(code) => eprintln!("{}\n{code}", bold("Scan this QR code to pair:")),
            Err(e) => warn!("{e}"),
        }
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Convert every image, printing one line per file.
async fn convert_images(
    images: &[PathBuf],
    output: Option<&Path>,
    config: &ConversionConfig,
    show_progress: bool,
    quiet: bool,
) -> Result<()> {
    let bar = show_progress.then(|| progress_bar(images.len()));
    let mut failed = 0usize;

    for image in images {
        let target = output_path(image, output, images.len());
        let label = image.display().to_string();
        let observer = BarObserver {
            bar: bar.clone().unwrap_or_else(ProgressBar::hidden),
            label: label.clone(),
        };

        let result = match convert_file_observed(image, config, &observer).await {
            Ok(doc) => write_document(&doc, &target).await.map(|()| doc),
            Err(e) => Err(e),
        };

        let line = match result {
            Ok(doc) => format!(
                "  {} {}  →  {}  {}",
                green("✓"),
                label,
                bold(&target.display().to_string()),
                dim(&format!(
                    "{}x{} @ {:.3}  {}ms",
                    doc.image_width, doc.image_height, doc.placement.scale, doc.stats.total_duration_ms
                )),
            ),
            Err(e) => {
                failed += 1;
                format!("  {} {}  {}", red("✗"), label, red(&e.to_string()))
            }
        };
        match &bar {
            Some(bar) => {
                bar.println(line);
                bar.inc(1);
            }
            None if !quiet => eprintln!("{line}"),
            None => {}
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    let converted = images.len() - failed;
    if !quiet {
        eprintln!(
            "{} {}/{} images converted",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&converted.to_string()),
            images.len()
        );
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} images failed", images.len());
    }
    Ok(())
}

/// Where the PDF for `image` goes.
fn output_path(image: &Path, output: Option<&Path>, count: usize) -> PathBuf {
    match output {
        None => suggested_filename(image),
        Some(out) if count == 1 && !out.is_dir() => out.to_path_buf(),
        Some(dir) => {
            let name = suggested_filename(image);
            dir.join(name.file_name().unwrap_or(name.as_os_str()))
        }
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_conversion(args: &ConversionArgs) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .page_size(args.page_width, args.page_height)
        .margin_fraction(args.margin)
        .max_upscale(args.max_upscale)
        .timeout_ms(args.timeout_ms);
    if let Some(ref title) = args.title {
        builder = builder.title(title.clone());
    }
    builder.build().context("Invalid configuration")
}

/// Map CLI args to `BridgeConfig`.
async fn build_bridge(args: &BridgeArgs) -> Result<BridgeConfig> {
    let replies = match args.replies {
        Some(ref path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read reply texts from {path:?}"))?;
            serde_json::from_str::<ReplyTexts>(&text)
                .with_context(|| format!("Invalid reply texts in {path:?}"))?
        }
        None => ReplyTexts::default(),
    };

    let config = BridgeConfig {
        conversion: build_conversion(&args.conversion)?,
        replies,
        attachment_name: args.attachment_name.clone(),
        spool: !args.no_spool,
        spool_dir: args.spool_dir.clone(),
        concurrency: args.concurrency,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
