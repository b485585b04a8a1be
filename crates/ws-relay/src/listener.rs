use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use http::StatusCode;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as HsRequest, Response as HsResponse,
};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use session_log::{EventSink, SessionEvent, SessionEventKind, SessionRef};

use crate::dialer;
use crate::session::Session;
use crate::target::{self, TargetPolicy, TargetRejection};

/// Configuration for the relay server.
pub struct RelayConfig {
    /// Address to bind the listening socket to.
    pub listen_addr: SocketAddr,
    /// Request path the relay endpoint is exposed at (e.g. `/relay`).
    /// Upgrade requests for any other path are refused with 404.
    pub endpoint_path: String,
    /// Policy deciding which target hosts may be dialed.
    pub policy: TargetPolicy,
    /// Limit on the outbound WebSocket handshake.
    pub dial_timeout: Duration,
    /// Per-direction receive limit during forwarding. `None` disables the
    /// idle limit, letting sessions stay open indefinitely while quiet.
    pub idle_timeout: Option<Duration>,
    /// Session event log sink.
    pub events: EventSink,
}

/// The WebSocket relay server.
///
/// Accepts client WebSocket connections on a fixed path, resolves the
/// `target` query parameter, opens an outbound connection to that target
/// (with no Origin header), and relays messages bidirectionally until
/// either side closes or errors.
pub struct RelayServer {
    config: Arc<RelayConfig>,
    listener: TcpListener,
}

impl RelayServer {
    /// Bind the listening socket. Binding is separate from [`run`](Self::run)
    /// so callers can bind to port 0 and discover the assigned address via
    /// [`local_addr`](Self::local_addr).
    pub async fn bind(config: RelayConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        tracing::info!(
            addr = %listener.local_addr()?,
            path = %config.endpoint_path,
            "relay listening"
        );

        Ok(Self {
            config: Arc::new(config),
            listener,
        })
    }

    /// The address the listening socket is actually bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the relay server.
    ///
    /// Loops forever accepting connections. Each connection is handled in
    /// its own Tokio task, so a failure in one session never affects any
    /// other session or the accept loop itself.
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            let (stream, client_addr) = self.listener.accept().await?;
            let config = Arc::clone(&self.config);

            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, client_addr, config).await {
                    tracing::debug!(%client_addr, %err, "connection handler ended");
                }
            });
        }
    }
}

/// Handle a single TCP connection from accept through relay and teardown.
async fn handle_connection(
    stream: TcpStream,
    client_addr: SocketAddr,
    config: Arc<RelayConfig>,
) -> anyhow::Result<()> {
    let session_id = uuid::Uuid::new_v4();

    // ------------------------------------------------------------------
    // 1. Accept the WebSocket handshake, capturing the request URI via the
    //    callback. The upgrade completes before any relay logic so the
    //    client sees an accepted connection even when the session is then
    //    refused; diagnostics travel over the WebSocket itself.
    // ------------------------------------------------------------------
    let captured_uri: Arc<std::sync::Mutex<Option<http::Uri>>> =
        Arc::new(std::sync::Mutex::new(None));
    let captured_uri_cb = Arc::clone(&captured_uri);
    let endpoint_path = config.endpoint_path.clone();

    let callback =
        move |req: &HsRequest, response: HsResponse| -> Result<HsResponse, ErrorResponse> {
            if req.uri().path() != endpoint_path {
                let mut not_found = ErrorResponse::new(Some("unknown endpoint".to_string()));
                *not_found.status_mut() = StatusCode::NOT_FOUND;
                return Err(not_found);
            }

            if let Ok(mut guard) = captured_uri_cb.lock() {
                *guard = Some(req.uri().clone());
            }

            Ok(response)
        };

    let client_ws = tokio_tungstenite::accept_hdr_async(stream, callback).await?;

    let uri = captured_uri.lock().ok().and_then(|guard| guard.clone());
    let raw_target = uri.as_ref().and_then(|u| target::target_param(u.query()));

    tracing::info!(
        %session_id,
        %client_addr,
        target = raw_target.as_deref().unwrap_or("<none>"),
        "client connected"
    );

    // ------------------------------------------------------------------
    // 2. Resolve and validate the target. A refused target ends the
    //    session here: one diagnostic text message, then a structured
    //    close. No outbound dial is attempted.
    // ------------------------------------------------------------------
    let target = match target::resolve_target(raw_target.as_deref(), &config.policy) {
        Ok(url) => url,
        Err(rejection) => {
            let kind = match rejection {
                TargetRejection::Missing => SessionEventKind::TargetMissing,
                _ => SessionEventKind::TargetRejected,
            };
            tracing::warn!(%session_id, %client_addr, %rejection, "target refused");

            config
                .events
                .log(SessionEvent::for_session(
                    kind,
                    SessionRef::new(session_id.to_string())
                        .with_client_addr(client_addr.to_string()),
                    serde_json::json!({
                        "reason": rejection.to_string(),
                        "target": raw_target,
                    }),
                ))
                .await;

            refuse(client_ws, rejection.close_code(), rejection.to_string()).await;
            return Ok(());
        }
    };

    // ------------------------------------------------------------------
    // 3. Dial the target. The outbound handshake carries no Origin header
    //    and none of the inbound request's headers. A dial failure is
    //    terminal: one diagnostic text message, then a structured close.
    // ------------------------------------------------------------------
    let remote_ws = match dialer::dial(&target, config.dial_timeout).await {
        Ok(ws) => ws,
        Err(err) => {
            tracing::warn!(%session_id, %target, %err, "outbound dial failed");

            config
                .events
                .log(SessionEvent::for_session(
                    SessionEventKind::DialFailed,
                    SessionRef::new(session_id.to_string())
                        .with_client_addr(client_addr.to_string())
                        .with_target(target.to_string()),
                    serde_json::json!({ "error": err.to_string() }),
                ))
                .await;

            refuse(client_ws, err.close_code(), err.to_string()).await;
            return Ok(());
        }
    };

    // ------------------------------------------------------------------
    // 4. Forward until either side ends, then tear down both connections.
    // ------------------------------------------------------------------
    let session = Session::new(session_id, client_addr, target.to_string());

    config
        .events
        .log(SessionEvent::for_session(
            SessionEventKind::SessionOpened,
            SessionRef::new(session_id.to_string())
                .with_client_addr(client_addr.to_string())
                .with_target(target.to_string()),
            serde_json::json!({}),
        ))
        .await;

    let cause = session
        .run(client_ws, remote_ws, config.idle_timeout)
        .await;

    tracing::info!(
        %session_id,
        %client_addr,
        cause = cause.as_str(),
        "session closed"
    );

    config
        .events
        .log(SessionEvent::for_session(
            SessionEventKind::SessionClosed,
            SessionRef::new(session_id.to_string())
                .with_client_addr(client_addr.to_string())
                .with_target(session.target.clone()),
            serde_json::json!({
                "cause": cause.as_str(),
                "msgs_to_remote": session.msgs_to_remote(),
                "msgs_to_client": session.msgs_to_client(),
                "duration_ms": session.duration().as_millis() as u64,
            }),
        ))
        .await;

    Ok(())
}

/// Refuse an already-upgraded connection: deliver exactly one diagnostic
/// text message, then close with the structured code for the error kind.
async fn refuse(mut client: WebSocketStream<TcpStream>, code: u16, reason: String) {
    if let Err(err) = client.send(Message::text(reason.clone())).await {
        tracing::debug!(%err, "failed to deliver diagnostic before close");
        return;
    }

    let frame = CloseFrame {
        code: CloseCode::Library(code),
        reason: reason.into(),
    };
    if let Err(err) = client.close(Some(frame)).await {
        tracing::debug!(%err, "error closing refused connection");
    }
}
