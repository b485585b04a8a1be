//! Bidirectional WebSocket relay for the ha-bridge project.
//!
//! The relay lets a browser reach a WebSocket endpoint it cannot address
//! directly: typically a Home Assistant instance that rejects the
//! browser's `Origin` header, or one on a network the browser cannot route
//! to. It terminates an inbound WebSocket connection, dials a second
//! outbound connection to the target named in the `target` query
//! parameter, and pipes messages verbatim in both directions until either
//! side closes or errors.
//!
//! # Architecture
//!
//! ```text
//! Browser  <--WS-->  ws-relay  <--WS-->  ws(s)://<target>
//!                       |
//!                 [Target policy]
//!                       |
//!                 [Session log]
//! ```
//!
//! One [`session::Session`] exists per inbound connection and owns exactly
//! one outbound connection. Two forwarding loops run concurrently; when
//! either ends, the sibling is cancelled and both connections are closed.
//! The outbound handshake never carries the inbound request's headers, so
//! no `Origin` reaches the target.

pub mod dialer;
pub mod listener;
pub mod session;
pub mod target;

// Re-export the primary public types at the crate root for convenience.
pub use dialer::{DialError, RemoteStream};
pub use listener::{RelayConfig, RelayServer};
pub use session::{CloseCause, Session};
pub use target::{TargetPolicy, TargetRejection};
