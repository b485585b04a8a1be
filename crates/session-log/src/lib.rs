//! Append-only structured JSON-lines session logging for the ha-bridge
//! project.
//!
//! Every relay session lifecycle transition (opened, refused, dial failed,
//! closed) is recorded as a single newline-terminated JSON object appended
//! to a log file, producing a [JSON Lines](https://jsonlines.org/) stream
//! that is easy to ship, parse, and replay.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use session_log::{EventSink, SessionEvent, SessionEventKind};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (sink, _handle) = EventSink::start("/var/log/ha-bridge/sessions.jsonl").await?;
//!
//! sink.log(SessionEvent::new(
//!     SessionEventKind::ProcessStarted,
//!     serde_json::json!({"version": "0.1.0"}),
//! ))
//! .await;
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod sink;
pub mod writer;

// Re-export primary public types at the crate root for convenience.
pub use entry::{SessionEvent, SessionEventKind, SessionRef};
pub use sink::EventSink;
pub use writer::{EventWriteError, EventWriter};
