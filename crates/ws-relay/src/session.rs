use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::dialer::RemoteStream;

/// Why a relay session's forwarding stage ended.
///
/// Whichever forwarding loop finishes first determines the cause; the
/// sibling loop is cancelled and both connections are released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCause {
    /// The browser client closed its connection or its socket ended.
    ClientClosed,
    /// The dialed target closed its connection or its socket ended.
    RemoteClosed,
    /// A receive or send on the client connection failed.
    ClientError,
    /// A receive or send on the outbound connection failed.
    RemoteError,
    /// No message arrived in either direction within the idle limit.
    IdleTimeout,
}

impl CloseCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseCause::ClientClosed => "client_closed",
            CloseCause::RemoteClosed => "remote_closed",
            CloseCause::ClientError => "client_error",
            CloseCause::RemoteError => "remote_error",
            CloseCause::IdleTimeout => "idle_timeout",
        }
    }
}

/// How a single forwarding loop ended.
enum LoopEnd {
    /// The source stream ended, either with a close frame or by EOF.
    SourceClosed,
    /// Receiving from the source failed.
    ReadError,
    /// Sending to the destination failed.
    WriteError,
    /// The idle limit elapsed with no message from the source.
    Idle,
}

/// One relay session: the pairing of one inbound and one outbound WebSocket
/// connection plus the two forwarding tasks moving messages between them.
///
/// Nothing here is shared across sessions; both connections are exclusively
/// owned by the session's forwarding tasks.
pub struct Session {
    pub id: uuid::Uuid,
    pub client_addr: SocketAddr,
    pub target: String,
    started: Instant,
    msgs_to_remote: AtomicU64,
    msgs_to_client: AtomicU64,
}

impl Session {
    pub fn new(id: uuid::Uuid, client_addr: SocketAddr, target: String) -> Arc<Self> {
        Arc::new(Self {
            id,
            client_addr,
            target,
            started: Instant::now(),
            msgs_to_remote: AtomicU64::new(0),
            msgs_to_client: AtomicU64::new(0),
        })
    }

    /// Messages forwarded client -> remote so far.
    pub fn msgs_to_remote(&self) -> u64 {
        self.msgs_to_remote.load(Ordering::Relaxed)
    }

    /// Messages forwarded remote -> client so far.
    pub fn msgs_to_client(&self) -> u64 {
        self.msgs_to_client.load(Ordering::Relaxed)
    }

    pub fn duration(&self) -> Duration {
        self.started.elapsed()
    }

    /// Runs the forwarding stage until either direction ends, then cancels
    /// the sibling loop and waits for it so that both connections are
    /// released before returning.
    ///
    /// Messages are forwarded verbatim in both directions; boundaries and
    /// type (text vs. binary) are preserved and payloads are never
    /// inspected. Each direction is FIFO; the two directions are
    /// independent streams.
    pub async fn run(
        self: &Arc<Self>,
        client: WebSocketStream<TcpStream>,
        remote: RemoteStream,
        idle_timeout: Option<Duration>,
    ) -> CloseCause {
        let (client_write, client_read) = client.split();
        let (remote_write, remote_read) = remote.split();

        let session_up = Arc::clone(self);
        let mut to_remote = tokio::spawn(async move {
            forward(client_read, remote_write, idle_timeout, &session_up.msgs_to_remote).await
        });

        let session_down = Arc::clone(self);
        let mut to_client = tokio::spawn(async move {
            forward(remote_read, client_write, idle_timeout, &session_down.msgs_to_client).await
        });

        // First loop to finish decides the cause; the sibling is cancelled.
        // Aborting a forwarding task drops its stream halves, which closes
        // the underlying socket and unblocks the peer within bounded time.
        let cause = tokio::select! {
            end = &mut to_remote => {
                let cause = match end {
                    Ok(LoopEnd::SourceClosed) => CloseCause::ClientClosed,
                    Ok(LoopEnd::ReadError) => CloseCause::ClientError,
                    Ok(LoopEnd::WriteError) => CloseCause::RemoteError,
                    Ok(LoopEnd::Idle) => CloseCause::IdleTimeout,
                    Err(_) => CloseCause::ClientError,
                };
                to_client.abort();
                let _ = to_client.await;
                cause
            }
            end = &mut to_client => {
                let cause = match end {
                    Ok(LoopEnd::SourceClosed) => CloseCause::RemoteClosed,
                    Ok(LoopEnd::ReadError) => CloseCause::RemoteError,
                    Ok(LoopEnd::WriteError) => CloseCause::ClientError,
                    Ok(LoopEnd::Idle) => CloseCause::IdleTimeout,
                    Err(_) => CloseCause::RemoteError,
                };
                to_remote.abort();
                let _ = to_remote.await;
                cause
            }
        };

        tracing::debug!(
            session_id = %self.id,
            cause = cause.as_str(),
            msgs_to_remote = self.msgs_to_remote(),
            msgs_to_client = self.msgs_to_client(),
            duration_ms = self.duration().as_millis() as u64,
            "forwarding stage ended"
        );

        cause
    }
}

/// Relays messages from a reader half to a writer half until the source
/// ends, an I/O error occurs, or the idle limit elapses.
///
/// The receive is the loop's only suspension point; a slow destination
/// blocks the next receive, so a fast producer can never overrun the relay
/// (there is no buffering beyond the one in-flight message).
async fn forward<R, W>(
    mut reader: R,
    mut writer: W,
    idle_timeout: Option<Duration>,
    forwarded: &AtomicU64,
) -> LoopEnd
where
    R: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    W: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    loop {
        let received = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, reader.next()).await {
                Ok(received) => received,
                Err(_) => return LoopEnd::Idle,
            },
            None => reader.next().await,
        };

        match received {
            None => return LoopEnd::SourceClosed,
            Some(Err(_)) => return LoopEnd::ReadError,
            Some(Ok(Message::Close(frame))) => {
                // Propagate the close frame so the destination sees a clean
                // shutdown, then stop. The other side's socket having closed
                // is a normal end of session, not an error.
                let _ = writer.send(Message::Close(frame)).await;
                return LoopEnd::SourceClosed;
            }
            Some(Ok(msg)) => {
                if writer.send(msg).await.is_err() {
                    return LoopEnd::WriteError;
                }
                forwarded.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
