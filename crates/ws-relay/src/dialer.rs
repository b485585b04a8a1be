use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

/// The outbound half of a relay session.
pub type RemoteStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why the outbound connection could not be established. Terminal for the
/// session; the relay never retries a dial.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("handshake with {target} did not complete within {timeout:?}")]
    Timeout { target: String, timeout: Duration },
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        source: tokio_tungstenite::tungstenite::Error,
    },
}

impl DialError {
    /// WebSocket close code sent to the client alongside the diagnostic
    /// message.
    pub fn close_code(&self) -> u16 {
        4002
    }
}

/// Opens the outbound WebSocket connection for a session.
///
/// The outbound handshake is a fresh client handshake: it carries no
/// `Origin` header and none of the inbound request's headers. Targets that
/// reject browser origins accept this connection where they would refuse
/// the browser's own.
pub async fn dial(target: &Url, dial_timeout: Duration) -> Result<RemoteStream, DialError> {
    tracing::debug!(%target, "dialing outbound target");

    match tokio::time::timeout(dial_timeout, connect_async(target.as_str())).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(source)) => Err(DialError::Connect {
            target: target.to_string(),
            source,
        }),
        Err(_) => Err(DialError::Timeout {
            target: target.to_string(),
            timeout: dial_timeout,
        }),
    }
}
