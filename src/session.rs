//! Chat-session status shared between the transport and the status server.
//!
//! The host reports pairing tokens and connection changes; operators read the
//! status and may ask for a restart. The conversion core never touches this.
//!
//! ```text
//!                 PairingToken             Ready
//! Disconnected ───────────────▶ Pairing ─────────▶ Ready
//!      ▲                                             │
//!      └──────── Disconnected | request_restart ─────┘
//! ```

use crate::pairing;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

/// Current connection status.
///
/// The serialised form carries the raw pairing token; [`status_json`] swaps
/// it for the rendered QR image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionStatus {
    #[serde(rename = "waiting")]
    Disconnected,
    #[serde(rename = "qr")]
    Pairing {
        #[serde(rename = "qr")]
        token: String,
        #[serde(rename = "timestamp")]
        issued_at_ms: u64,
    },
    #[serde(rename = "ready")]
    Ready,
}

/// A status change reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    PairingToken(String),
    Ready,
    Disconnected,
}

/// Shared, observable session status.
#[derive(Debug)]
pub struct SessionState {
    status: watch::Sender<SessionStatus>,
    restart: Notify,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        let (status, _) = watch::channel(SessionStatus::Disconnected);
        Self {
            status,
            restart: Notify::new(),
        }
    }

    /// Snapshot of the current status.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Receiver that wakes on every status change.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Apply a transport event. Returns `true` if the status changed.
    ///
    /// A pairing token arriving while already `Ready` is ignored.
    pub fn apply(&self, event: SessionEvent) -> bool {
        self.status.send_if_modified(|status| {
            let next = match (&*status, event) {
                (SessionStatus::Ready, SessionEvent::PairingToken(_)) => {
                    debug!("Pairing token ignored while ready");
                    return false;
                }
                (_, SessionEvent::PairingToken(token)) => SessionStatus::Pairing {
                    token,
                    issued_at_ms: now_ms(),
                },
                (_, SessionEvent::Ready) => SessionStatus::Ready,
                (_, SessionEvent::Disconnected) => SessionStatus::Disconnected,
            };
            if *status == next {
                return false;
            }
            info!(status = status_label(&next), "Session status changed");
            *status = next;
            true
        })
    }

    /// Reset to `Disconnected` and wake whoever waits on
    /// [`restart_requested`](Self::restart_requested).
    pub fn request_restart(&self) {
        info!("Session restart requested");
        self.status.send_replace(SessionStatus::Disconnected);
        self.restart.notify_one();
    }

    /// Resolves once a restart has been requested. A request made while
    /// nobody is waiting is kept for the next call.
    pub async fn restart_requested(&self) {
        self.restart.notified().await;
    }
}

/// The status JSON served on `/api/status` and `/ws`.
///
/// While pairing, `qr` holds a `data:image/png;base64,…` QR code of the
/// token. If rendering fails the raw token is sent instead.
pub fn status_json(status: &SessionStatus) -> serde_json::Value {
    if let SessionStatus::Pairing {
        token,
        issued_at_ms,
    } = status
    {
        let qr = pairing::qr_data_url(token).unwrap_or_else(|e| {
            warn!("{e}");
            token.clone()
        });
        return serde_json::json!({ "type": "qr", "qr": qr, "timestamp": issued_at_ms });
    }
    serde_json::to_value(status).unwrap_or_else(|_| serde_json::json!({ "type": "waiting" }))
}

fn status_label(status: &SessionStatus) -> &'static str {
    match status {
        SessionStatus::Disconnected => "disconnected",
        SessionStatus::Pairing { .. } => "pairing",
        SessionStatus::Ready => "ready",
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
