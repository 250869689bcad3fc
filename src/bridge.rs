//! Chat bridge: inbound messages in, replies out.
//!
//! The bridge knows nothing about a particular chat network. A transport
//! (see [`crate::transport`]) feeds it [`InboundMessage`]s and delivers the
//! [`Reply`]s it produces. Each message is handled on its own task; one
//! failing request never affects another.
//!
//! ## Reply sequence
//!
//! ```text
//! no media            → (nothing)
//! not image/* | empty → retry prompt
//! image               → processing ack → PDF attachment → success text
//!                                      ╰→ retry prompt | generic failure
//! ```

use crate::config::BridgeConfig;
use crate::convert;
use crate::error::{BridgeError, ConvertError};
use crate::pipeline::encode::{self, OutboundMedia};
use crate::pipeline::input::{self, ImagePayload};
use crate::spool;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

/// A chat message as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Transport-assigned message id, used only for logging.
    pub id: String,
    /// Chat the reply goes back to.
    pub from: String,
    #[serde(default)]
    pub media: Option<InboundMedia>,
}

/// An attachment on an inbound message.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMedia {
    pub mimetype: String,
    /// Base64 file content.
    pub data: String,
    #[serde(default)]
    pub filename: Option<String>,
}

impl std::fmt::Debug for InboundMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundMedia")
            .field("mimetype", &self.mimetype)
            .field("data", &format_args!("<{} chars>", self.data.len()))
            .field("filename", &self.filename)
            .finish()
    }
}

/// Something to send back to a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Reply {
    #[serde(rename = "reply_text")]
    Text { to: String, body: String },
    #[serde(rename = "reply_media")]
    Media { to: String, media: OutboundMedia },
}

impl Reply {
    /// Chat this reply is addressed to.
    pub fn to(&self) -> &str {
        match self {
            Reply::Text { to, .. } | Reply::Media { to, .. } => to,
        }
    }
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    /// No attachment; nothing was sent.
    Ignored,
    /// Failed the validation gate; the retry prompt was sent.
    Rejected(ConvertError),
    /// A PDF was delivered.
    Converted { pdf_bytes: usize },
    /// Conversion or delivery failed after the acknowledgment.
    Failed(ConvertError),
}

/// Handle a single inbound message, sending every reply through `replies`.
///
/// # Errors
/// Only [`BridgeError::ReplyChannelClosed`]; conversion failures are turned
/// into replies and reported through [`MessageOutcome`].
pub async fn handle_message(
    msg: InboundMessage,
    config: &BridgeConfig,
    replies: &mpsc::Sender<Reply>,
) -> Result<MessageOutcome, BridgeError> {
    let InboundMessage { id, from, media } = msg;
    let Some(media) = media else {
        debug!(id = %id, "Message without media ignored");
        return Ok(MessageOutcome::Ignored);
    };

    // ── Gate: image family, non-empty ────────────────────────────────────
    let gate = input::check_mime(&media.mimetype).and_then(|()| {
        if media.data.trim().is_empty() {
            Err(ConvertError::EmptyPayload)
        } else {
            Ok(())
        }
    });
    if let Err(e) = gate {
        info!(id = %id, from = %from, "Rejected attachment: {e}");
        send_text(replies, &from, config.replies.for_failure(e.reply_class())).await?;
        return Ok(MessageOutcome::Rejected(e));
    }

    info!(id = %id, from = %from, mime_type = %media.mimetype, "Image received");
    send_text(replies, &from, &config.replies.processing).await?;

    // ── Convert and deliver ──────────────────────────────────────────────
    match render_media(media, config).await {
        Ok((outbound, pdf_bytes)) => {
            send(
                replies,
                Reply::Media {
                    to: from.clone(),
                    media: outbound,
                },
            )
            .await?;
            send_text(replies, &from, &config.replies.success).await?;
            info!(id = %id, from = %from, "PDF delivered");
            Ok(MessageOutcome::Converted { pdf_bytes })
        }
        Err(e) => {
            send_text(replies, &from, config.replies.for_failure(e.reply_class())).await?;
            Ok(MessageOutcome::Failed(e))
        }
    }
}

/// Consume `inbound` until it closes, handling up to
/// `config.concurrency` messages at once.
pub async fn run(
    inbound: mpsc::Receiver<InboundMessage>,
    replies: mpsc::Sender<Reply>,
    config: Arc<BridgeConfig>,
) -> Result<(), BridgeError> {
    config.validate()?;
    info!(concurrency = config.concurrency, "Bridge running");

    ReceiverStream::new(inbound)
        .for_each_concurrent(config.concurrency, |msg| {
            let config = Arc::clone(&config);
            let replies = replies.clone();
            async move {
                let id = msg.id.clone();
                let task =
                    tokio::spawn(async move { handle_message(msg, &config, &replies).await });
                match task.await {
                    Ok(Ok(outcome)) => debug!(id = %id, ?outcome, "Message handled"),
                    Ok(Err(e)) => warn!(id = %id, "Reply not delivered: {e}"),
                    Err(e) => error!(id = %id, "Message task panicked: {e}"),
                }
            }
        })
        .await;

    info!("Inbound channel closed, bridge stopped");
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Decode, convert and encode one attachment. Returns the outbound media and
/// the PDF size.
async fn render_media(
    media: InboundMedia,
    config: &BridgeConfig,
) -> Result<(OutboundMedia, usize), ConvertError> {
    let payload = ImagePayload::from_base64(media.mimetype, &media.data)?;
    let doc = convert::convert(payload, &config.conversion).await?;
    let pdf_bytes = doc.bytes.len();

    if !config.spool {
        return Ok((encode::encode_document(&doc, &config.attachment_name), pdf_bytes));
    }
    let outbound = spool::spool_media(
        config.spool_dir(),
        doc.into_bytes(),
        config.attachment_name.clone(),
    )
    .await
    .map_err(|e| {
        error!("Spooling failed: {e}");
        ConvertError::Internal(e.to_string())
    })?;
    Ok((outbound, pdf_bytes))
}

async fn send_text(
    replies: &mpsc::Sender<Reply>,
    to: &str,
    body: &str,
) -> Result<(), BridgeError> {
    send(
        replies,
        Reply::Text {
            to: to.to_string(),
            body: body.to_string(),
        },
    )
    .await
}

async fn send(replies: &mpsc::Sender<Reply>, reply: Reply) -> Result<(), BridgeError> {
    replies
        .send(reply)
        .await
        .map_err(|_| BridgeError::ReplyChannelClosed)
}
