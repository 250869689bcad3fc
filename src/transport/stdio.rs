//! JSON-lines transport over any async reader/writer pair.
//!
//! [`run_stdio`] wires the bridge to the process's stdin/stdout. [`serve_io`]
//! does the same for arbitrary streams (sockets, pipes, test mocks).
//! Malformed input lines are logged and skipped; EOF on the reader shuts
//! the bridge down once in-flight messages have been answered.

use super::{ControlFrame, InboundFrame, OutboundFrame};
use crate::bridge::{self, InboundMessage, Reply};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::session::SessionState;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outbound frames buffered between the bridge and the writer.
const REPLY_BUFFER: usize = 64;

/// Run the bridge on stdin/stdout until stdin closes.
pub async fn run_stdio(
    config: Arc<BridgeConfig>,
    session: Arc<SessionState>,
) -> Result<(), BridgeError> {
    serve_io(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        config,
        session,
    )
    .await
}

/// Run the bridge over `reader`/`writer` until the reader hits EOF.
pub async fn serve_io<R, W>(
    reader: R,
    writer: W,
    config: Arc<BridgeConfig>,
    session: Arc<SessionState>,
) -> Result<(), BridgeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    config.validate()?;
    let (inbound_tx, inbound_rx) = mpsc::channel(config.concurrency.saturating_mul(2));
    let (reply_tx, reply_rx) = mpsc::channel(REPLY_BUFFER);

    let (forwarded, (), ()) = tokio::try_join!(
        read_frames(reader, &session, inbound_tx),
        bridge::run(inbound_rx, reply_tx, config),
        write_frames(writer, reply_rx, &session),
    )?;
    info!(messages = forwarded, "Transport closed");
    Ok(())
}

/// Parse frames from `reader`, update `session` and forward messages.
///
/// Returns the number of messages forwarded. Ends at EOF or when the
/// message receiver goes away.
pub async fn read_frames<R>(
    mut reader: R,
    session: &SessionState,
    messages: mpsc::Sender<InboundMessage>,
) -> Result<usize, BridgeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut forwarded = 0usize;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(BridgeError::Transport)?;
        if read == 0 {
            break;
        }
        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }
        // Covers invalid UTF-8 as well as bad JSON.
        let frame: InboundFrame = match serde_json::from_slice(line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping malformed frame: {e}");
                continue;
            }
        };

        if let Some(event) = frame.session_event() {
            session.apply(event);
            continue;
        }
        if let InboundFrame::Message(msg) = frame {
            debug!(id = %msg.id, "Message frame");
            if messages.send(msg).await.is_err() {
                warn!("Bridge stopped accepting messages");
                break;
            }
            forwarded += 1;
        }
    }
    Ok(forwarded)
}

/// Write replies and restart requests to `writer`, one JSON object per line.
///
/// Ends when every reply sender has been dropped.
pub async fn write_frames<W>(
    mut writer: W,
    mut replies: mpsc::Receiver<Reply>,
    session: &SessionState,
) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            () = session.restart_requested() => OutboundFrame::Control(ControlFrame::Restart),
            reply = replies.recv() => match reply {
                Some(reply) => OutboundFrame::Reply(reply),
                None => break,
            },
        };
        write_frame(&mut writer, &frame).await?;
    }
    writer.flush().await.map_err(BridgeError::Transport)?;
    Ok(())
}

async fn write_frame<W>(writer: &mut W, frame: &OutboundFrame) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(frame)
        .map_err(|e| BridgeError::Internal(format!("serialising frame: {e}")))?;
    line.push(b'\n');
    writer
        .write_all(&line)
        .await
        .map_err(BridgeError::Transport)?;
    writer.flush().await.map_err(BridgeError::Transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;

    #[tokio::test]
    async fn reader_updates_session_and_forwards_messages() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"type\":\"qr\",\"token\":\"abc\"}\n")
            .read(b"not json at all\n\n")
            .read(b"{\"type\":\"ready\"}\n{\"type\":\"message\",\"id\":\"1\",\"from\":\"a\"}\n")
            .build();
        let session = SessionState::new();
        let (tx, mut rx) = mpsc::channel(4);

        let forwarded = read_frames(BufReader::new(mock), &session, tx).await.unwrap();

        assert_eq!(forwarded, 1);
        assert_eq!(session.status(), SessionStatus::Ready);
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.id, "1");
        assert!(msg.media.is_none());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn reader_skips_lines_that_are_not_utf8() {
        let mock = tokio_test::io::Builder::new()
            .read(b"\xff\xfe garbage\n")
            .read(b"{\"type\":\"message\",\"id\":\"1\",\"from\":\"a\"}\n")
            .build();
        let (tx, mut rx) = mpsc::channel(4);

        let forwarded = read_frames(BufReader::new(mock), &SessionState::new(), tx)
            .await
            .unwrap();

        assert_eq!(forwarded, 1);
        assert_eq!(rx.recv().await.unwrap().id, "1");
    }

    #[tokio::test]
    async fn last_line_without_newline_is_read() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"type\":\"message\",\"id\":\"7\",\"from\":\"a\"}")
            .build();
        let (tx, mut rx) = mpsc::channel(4);

        let forwarded = read_frames(BufReader::new(mock), &SessionState::new(), tx)
            .await
            .unwrap();

        assert_eq!(forwarded, 1);
        assert_eq!(rx.recv().await.unwrap().id, "7");
    }

    #[tokio::test]
    async fn reader_stops_when_bridge_is_gone() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"type\":\"message\",\"id\":\"1\",\"from\":\"a\"}\n")
            .build();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let forwarded = read_frames(BufReader::new(mock), &SessionState::new(), tx)
            .await
            .unwrap();
        assert_eq!(forwarded, 0);
    }

    #[tokio::test]
    async fn writer_emits_one_line_per_frame() {
        let session = SessionState::new();
        let (tx, rx) = mpsc::channel(4);
        tx.send(Reply::Text {
            to: "a".into(),
            body: "oi".into(),
        })
        .await
        .unwrap();
        drop(tx);

        let mut out = Vec::new();
        write_frames(&mut out, rx, &session).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "{\"type\":\"reply_text\",\"to\":\"a\",\"body\":\"oi\"}\n");
    }

    #[tokio::test]
    async fn writer_emits_restart_frame() {
        let session = SessionState::new();
        session.request_restart();
        let (tx, rx) = mpsc::channel::<Reply>(1);
        drop(tx);

        let mut out = Vec::new();
        write_frames(&mut out, rx, &session).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"type\":\"restart\"}\n");
    }
}
