//! Host transports feeding the bridge.
//!
//! A chat-network client (the "host") runs as a separate process and talks to
//! pdfbridge over a line-oriented JSON protocol. Every frame is one JSON
//! object tagged by `type`.
//!
//! ## Host → bridge
//!
//! | `type`         | Fields                       | Effect                     |
//! |----------------|------------------------------|----------------------------|
//! | `qr`           | `token`                      | new pairing token          |
//! | `ready`        |                              | session authenticated      |
//! | `disconnected` |                              | session lost               |
//! | `message`      | `id`, `from`, `media?`       | handed to the bridge       |
//!
//! ## Bridge → host
//!
//! | `type`        | Fields           |
//! |---------------|------------------|
//! | `reply_text`  | `to`, `body`     |
//! | `reply_media` | `to`, `media`    |
//! | `restart`     |                  |

pub mod stdio;

use crate::bridge::{InboundMessage, Reply};
use crate::session::SessionEvent;
use serde::{Deserialize, Serialize};

/// One frame sent by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    Qr { token: String },
    Ready,
    Disconnected,
    Message(InboundMessage),
}

impl InboundFrame {
    /// The session event carried by this frame, if any.
    pub fn session_event(&self) -> Option<SessionEvent> {
        match self {
            InboundFrame::Qr { token } => Some(SessionEvent::PairingToken(token.clone())),
            InboundFrame::Ready => Some(SessionEvent::Ready),
            InboundFrame::Disconnected => Some(SessionEvent::Disconnected),
            InboundFrame::Message(_) => None,
        }
    }
}

/// One frame sent to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    Reply(Reply),
    Control(ControlFrame),
}

/// Frames the bridge emits on its own behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// The operator asked the host to drop and re-create its session.
    Restart,
}
