//! Integration tests for the chat bridge and the JSON-lines transport.
//!
//! Run with:
//!   cargo test --test bridge -- --nocapture

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use pdfbridge::bridge::{self, handle_message};
use pdfbridge::replies::{
    DEFAULT_GENERIC_FAILURE, DEFAULT_PROCESSING, DEFAULT_RETRY_PROMPT, DEFAULT_SUCCESS,
};
use pdfbridge::transport::stdio::serve_io;
use pdfbridge::{
    BridgeConfig, InboundMedia, InboundMessage, MessageOutcome, Reply, ReplyTexts, SessionState,
    SessionStatus,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::mpsc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn png_base64(w: u32, h: u32) -> String {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([10, 120, 200, 255])));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    STANDARD.encode(out)
}

fn image_message(id: &str, from: &str, mimetype: &str, data: String) -> InboundMessage {
    InboundMessage {
        id: id.into(),
        from: from.into(),
        media: Some(InboundMedia {
            mimetype: mimetype.into(),
            data,
            filename: Some("IMG_0001.jpg".into()),
        }),
    }
}

/// Config whose spool lives in `dir`.
fn spooling_into(dir: &Path) -> BridgeConfig {
    BridgeConfig {
        spool_dir: Some(dir.to_path_buf()),
        ..BridgeConfig::default()
    }
}

async fn collect(mut rx: mpsc::Receiver<Reply>) -> Vec<Reply> {
    let mut out = Vec::new();
    while let Some(reply) = rx.recv().await {
        out.push(reply);
    }
    out
}

fn text(reply: &Reply) -> Option<&str> {
    match reply {
        Reply::Text { body, .. } => Some(body),
        Reply::Media { .. } => None,
    }
}

fn spool_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

// ── handle_message ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_image_gets_ack_pdf_and_confirmation() {
    init_tracing();
    let spool = tempfile::tempdir().unwrap();
    let config = spooling_into(spool.path());
    let (tx, rx) = mpsc::channel(8);

    let outcome = handle_message(
        image_message("m1", "alice@c.us", "image/png", png_base64(64, 32)),
        &config,
        &tx,
    )
    .await
    .unwrap();
    drop(tx);

    let replies = collect(rx).await;
    assert_eq!(replies.len(), 3, "{replies:?}");
    assert!(replies.iter().all(|r| r.to() == "alice@c.us"));
    assert_eq!(text(&replies[0]), Some(DEFAULT_PROCESSING));
    assert_eq!(text(&replies[2]), Some(DEFAULT_SUCCESS));

    let Reply::Media { media, .. } = &replies[1] else {
        panic!("second reply must be the PDF, got {:?}", replies[1]);
    };
    assert_eq!(media.mimetype, "application/pdf");
    assert_eq!(media.filename, "documento.pdf");
    let pdf = STANDARD.decode(&media.data).unwrap();
    assert!(pdf.starts_with(b"%PDF-"));
    assert_eq!(lopdf::Document::load_mem(&pdf).unwrap().get_pages().len(), 1);
    assert_eq!(outcome, MessageOutcome::Converted { pdf_bytes: pdf.len() });

    assert_eq!(spool_entries(spool.path()), 0, "spool must be empty after success");
}

#[tokio::test]
async fn test_spool_is_empty_after_failure() {
    let spool = tempfile::tempdir().unwrap();
    let config = spooling_into(spool.path());
    let (tx, rx) = mpsc::channel(8);

    let outcome = handle_message(
        image_message("m2", "bob@c.us", "image/jpeg", STANDARD.encode(b"definitely not a jpeg")),
        &config,
        &tx,
    )
    .await
    .unwrap();
    drop(tx);

    assert!(matches!(outcome, MessageOutcome::Failed(_)));
    let bodies: Vec<_> = collect(rx).await.iter().filter_map(|r| text(r).map(String::from)).collect();
    assert_eq!(bodies, vec![DEFAULT_PROCESSING, DEFAULT_GENERIC_FAILURE]);
    assert_eq!(spool_entries(spool.path()), 0);
}

#[tokio::test]
async fn test_unwritable_spool_is_generic_failure() {
    let spool = tempfile::tempdir().unwrap();
    let config = spooling_into(&spool.path().join("missing"));
    let (tx, rx) = mpsc::channel(8);

    let outcome = handle_message(
        image_message("m3", "carol@c.us", "image/png", png_base64(4, 4)),
        &config,
        &tx,
    )
    .await
    .unwrap();
    drop(tx);

    assert!(matches!(outcome, MessageOutcome::Failed(_)), "{outcome:?}");
    let replies = collect(rx).await;
    assert_eq!(text(replies.last().unwrap()), Some(DEFAULT_GENERIC_FAILURE));
    assert!(!replies.iter().any(|r| matches!(r, Reply::Media { .. })));
}

#[tokio::test]
async fn test_spooled_and_in_memory_delivery_match() {
    let spool = tempfile::tempdir().unwrap();
    let data = png_base64(20, 30);

    let mut pdfs = Vec::new();
    for config in [
        spooling_into(spool.path()),
        BridgeConfig {
            spool: false,
            ..BridgeConfig::default()
        },
    ] {
        let (tx, rx) = mpsc::channel(8);
        handle_message(image_message("m", "d@c.us", "image/png", data.clone()), &config, &tx)
            .await
            .unwrap();
        drop(tx);
        let media = collect(rx)
            .await
            .into_iter()
            .find_map(|r| match r {
                Reply::Media { media, .. } => Some(media),
                Reply::Text { .. } => None,
            })
            .unwrap();
        pdfs.push(media.data);
    }
    assert_eq!(pdfs[0], pdfs[1]);
}

#[tokio::test]
async fn test_custom_reply_texts_are_used() {
    let config = BridgeConfig {
        replies: ReplyTexts {
            retry_prompt: "Images only, please.".into(),
            ..ReplyTexts::default()
        },
        ..BridgeConfig::default()
    };
    let (tx, rx) = mpsc::channel(8);
    handle_message(
        image_message("m4", "e@c.us", "video/mp4", "AAAA".into()),
        &config,
        &tx,
    )
    .await
    .unwrap();
    drop(tx);

    let replies = collect(rx).await;
    assert_eq!(replies.len(), 1);
    assert_eq!(text(&replies[0]), Some("Images only, please."));
    assert_ne!(text(&replies[0]), Some(DEFAULT_RETRY_PROMPT));
}

// ── bridge::run ──────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_senders_each_get_their_own_sequence() {
    init_tracing();
    let spool = tempfile::tempdir().unwrap();
    let config = Arc::new(spooling_into(spool.path()));
    let (in_tx, in_rx) = mpsc::channel(16);
    let (out_tx, out_rx) = mpsc::channel(64);

    let bridge = tokio::spawn(bridge::run(in_rx, out_tx, config));
    let senders = ["a@c.us", "b@c.us", "c@c.us", "d@c.us"];
    for (i, from) in senders.iter().enumerate() {
        let size = 16 + 8 * i as u32;
        in_tx
            .send(image_message(&format!("m{i}"), from, "image/png", png_base64(size, size)))
            .await
            .unwrap();
    }
    in_tx
        .send(image_message("bad", "e@c.us", "text/plain", "aGVsbG8=".into()))
        .await
        .unwrap();
    drop(in_tx);

    let replies = collect(out_rx).await;
    bridge.await.unwrap().unwrap();

    let mut per_sender: HashMap<String, Vec<Reply>> = HashMap::new();
    for r in replies {
        per_sender.entry(r.to().to_string()).or_default().push(r);
    }
    for from in senders {
        let seq = &per_sender[from];
        assert_eq!(seq.len(), 3, "{from}: {seq:?}");
        assert_eq!(text(&seq[0]), Some(DEFAULT_PROCESSING));
        assert!(matches!(seq[1], Reply::Media { .. }));
        assert_eq!(text(&seq[2]), Some(DEFAULT_SUCCESS));
    }
    assert_eq!(per_sender["e@c.us"].len(), 1);
    assert_eq!(text(&per_sender["e@c.us"][0]), Some(DEFAULT_RETRY_PROMPT));
    assert_eq!(spool_entries(spool.path()), 0);
}

// ── JSON-lines transport ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_stdio_session_and_message_round_trip() {
    init_tracing();
    let message = serde_json::json!({
        "type": "message",
        "id": "wamid.1",
        "from": "5511@c.us",
        "media": {"mimetype": "image/png", "data": png_base64(10, 10), "filename": null},
    });
    let input = format!(
        "{}\n{}\n{{broken\n{}\n",
        r#"{"type":"qr","token":"2@pairing"}"#,
        r#"{"type":"ready"}"#,
        message
    );
    let reader = tokio_test::io::Builder::new().read(input.as_bytes()).build();
    let session = Arc::new(SessionState::new());
    let spool = tempfile::tempdir().unwrap();

    let mut out = Vec::new();
    serve_io(
        BufReader::new(reader),
        &mut out,
        Arc::new(spooling_into(spool.path())),
        Arc::clone(&session),
    )
    .await
    .unwrap();

    assert_eq!(session.status(), SessionStatus::Ready);

    let frames: Vec<serde_json::Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let types: Vec<&str> = frames.iter().map(|f| f["type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["reply_text", "reply_media", "reply_text"]);
    assert!(frames.iter().all(|f| f["to"] == "5511@c.us"));
    assert_eq!(frames[1]["media"]["mimetype"], "application/pdf");
    assert_eq!(frames[2]["body"], DEFAULT_SUCCESS);
}
