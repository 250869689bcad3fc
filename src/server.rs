//! HTTP/WebSocket status server for operators.
//!
//! Exposes the session status and a restart trigger. It never touches the
//! conversion pipeline.
//!
//! | Method | Path           | Response                                             |
//! |--------|----------------|------------------------------------------------------|
//! | GET    | `/api/test`    | `{"status":"API is working"}`                        |
//! | GET    | `/api/status`  | `{"type":"ready"}` / `{"type":"qr",…}` / `{"type":"waiting"}` |
//! | POST   | `/api/restart` | `{"status":"restarting"}`                            |
//! | GET    | `/ws`          | status JSON on connect and after every change        |
//!
//! While pairing, `qr` is a PNG data URL of the QR code. Every response
//! carries `Access-Control-Allow-Origin: *` and the allowed request headers.

use crate::error::BridgeError;
use crate::session::{status_json, SessionState};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default bind port.
pub const DEFAULT_PORT: u16 = 3001;

const ALLOWED_HEADERS: &str = "Origin, X-Requested-With, Content-Type, Accept";

/// Build the router over a shared session.
pub fn router(session: Arc<SessionState>) -> Router {
    Router::new()
        .route("/api/test", get(api_test))
        .route("/api/status", get(api_status))
        .route("/api/restart", post(api_restart).options(preflight))
        .route("/ws", get(ws_status))
        .layer(middleware::map_response(allow_any_origin))
        .with_state(session)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve<F>(
    addr: &str,
    session: Arc<SessionState>,
    shutdown: F,
) -> Result<(), BridgeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| BridgeError::Server {
            addr: addr.to_string(),
            detail: format!("bind failed: {e}"),
        })?;
    serve_listener(listener, session, shutdown).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_listener<F>(
    listener: TcpListener,
    session: Arc<SessionState>,
    shutdown: F,
) -> Result<(), BridgeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    info!(address = %addr, "Status server listening");

    axum::serve(listener, router(session))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| BridgeError::Server {
            addr: addr.clone(),
            detail: e.to_string(),
        })?;

    info!("Status server shut down");
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn api_test() -> Json<serde_json::Value> {
    Json(json!({ "status": "API is working" }))
}

async fn api_status(State(session): State<Arc<SessionState>>) -> Json<serde_json::Value> {
    Json(status_json(&session.status()))
}

async fn api_restart(State(session): State<Arc<SessionState>>) -> Json<serde_json::Value> {
    session.request_restart();
    Json(json!({ "status": "restarting" }))
}

async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS")],
    )
}

async fn ws_status(
    ws: WebSocketUpgrade,
    State(session): State<Arc<SessionState>>,
) -> Response {
    ws.on_upgrade(move |socket| push_status(socket, session))
}

/// Send the status now and after every change until the client leaves.
async fn push_status(mut socket: WebSocket, session: Arc<SessionState>) {
    let mut changes = session.subscribe();
    debug!("WebSocket client connected");

    loop {
        let status = changes.borrow_and_update().clone();
        if socket
            .send(Message::Text(status_json(&status).to_string()))
            .await
            .is_err()
        {
            break;
        }

        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {
                    // Clients have nothing to say; resend the current status.
                }
            },
        }
    }
    debug!("WebSocket client disconnected");
}

async fn allow_any_origin(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionEvent;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    struct TestServer {
        addr: SocketAddr,
        stop: Option<oneshot::Sender<()>>,
        handle: tokio::task::JoinHandle<Result<(), BridgeError>>,
    }

    impl TestServer {
        async fn start(session: Arc<SessionState>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (tx, rx) = oneshot::channel();
            let handle = tokio::spawn(serve_listener(listener, session, async move {
                let _ = rx.await;
            }));
            Self {
                addr,
                stop: Some(tx),
                handle,
            }
        }

        async fn request(&self, method: &str, path: &str) -> String {
            let mut stream = TcpStream::connect(self.addr).await.unwrap();
            let req = format!(
                "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            );
            stream.write_all(req.as_bytes()).await.unwrap();
            let mut out = String::new();
            stream.read_to_string(&mut out).await.unwrap();
            out
        }

        async fn stop(mut self) {
            if let Some(tx) = self.stop.take() {
                let _ = tx.send(());
            }
            self.handle.await.unwrap().unwrap();
        }
    }

    fn body(response: &str) -> serde_json::Value {
        let (_, body) = response.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn test_endpoint_and_cors_header() {
        let server = TestServer::start(Arc::new(SessionState::new())).await;
        let resp = server.request("GET", "/api/test").await;
        assert!(resp.starts_with("HTTP/1.1 200"));
        assert!(resp
            .to_ascii_lowercase()
            .contains("access-control-allow-origin: *"));
        assert_eq!(body(&resp), json!({"status": "API is working"}));
        server.stop().await;
    }

    #[tokio::test]
    async fn allowed_headers_are_on_every_response() {
        let server = TestServer::start(Arc::new(SessionState::new())).await;
        for (method, path) in [
            ("GET", "/api/test"),
            ("GET", "/api/status"),
            ("POST", "/api/restart"),
            ("OPTIONS", "/api/restart"),
        ] {
            let resp = server.request(method, path).await.to_ascii_lowercase();
            assert!(
                resp.contains(
                    "access-control-allow-headers: origin, x-requested-with, content-type, accept"
                ),
                "{method} {path}: {resp}"
            );
            assert!(resp.contains("access-control-allow-origin: *"), "{method} {path}");
        }
        server.stop().await;
    }

    #[tokio::test]
    async fn status_follows_session() {
        let session = Arc::new(SessionState::new());
        let server = TestServer::start(Arc::clone(&session)).await;

        assert_eq!(
            body(&server.request("GET", "/api/status").await),
            json!({"type": "waiting"})
        );

        session.apply(SessionEvent::PairingToken("2@tok".into()));
        let pairing = body(&server.request("GET", "/api/status").await);
        assert_eq!(pairing["type"], "qr");
        let qr = pairing["qr"].as_str().unwrap();
        let png = qr
            .strip_prefix("data:image/png;base64,")
            .expect("pairing token is served as a PNG data URL");
        let png = STANDARD.decode(png).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.width(), img.height());
        assert!(pairing["timestamp"].as_u64().unwrap() > 0);

        session.apply(SessionEvent::Ready);
        assert_eq!(
            body(&server.request("GET", "/api/status").await),
            json!({"type": "ready"})
        );
        server.stop().await;
    }

    #[tokio::test]
    async fn restart_resets_session() {
        let session = Arc::new(SessionState::new());
        session.apply(SessionEvent::Ready);
        let server = TestServer::start(Arc::clone(&session)).await;

        let resp = server.request("POST", "/api/restart").await;
        assert_eq!(body(&resp), json!({"status": "restarting"}));
        assert_eq!(status_json(&session.status()), json!({"type": "waiting"}));
        server.stop().await;
    }

    #[tokio::test]
    async fn bind_failure_is_a_server_error() {
        let err = serve(
            "not-an-address",
            Arc::new(SessionState::new()),
            std::future::ready(()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BridgeError::Server { .. }));
    }
}
