use serde::{Deserialize, Serialize};

/// A single log event describing a relay session lifecycle transition or a
/// process-level event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: uuid::Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub kind: SessionEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionRef>,
    pub details: serde_json::Value,
}

impl SessionEvent {
    /// Create a process-level event (no session attached) with an
    /// auto-generated UUID v4 and the current UTC timestamp.
    pub fn new(kind: SessionEventKind, details: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            kind,
            session: None,
            details,
        }
    }

    /// Create an event attached to a specific relay session.
    pub fn for_session(
        kind: SessionEventKind,
        session: SessionRef,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            kind,
            session: Some(session),
            details,
        }
    }
}

/// The category of session event being recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    ProcessStarted,
    ProcessStopped,
    SessionOpened,
    TargetMissing,
    TargetRejected,
    DialFailed,
    SessionClosed,
}

/// Identifies the relay session an event belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRef {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl SessionRef {
    /// Convenience constructor that only requires the session id. Optional
    /// fields default to `None`.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            client_addr: None,
            target: None,
        }
    }

    /// Attach the client's TCP address, consuming and returning `self` for
    /// builder-style usage.
    pub fn with_client_addr(mut self, addr: impl Into<String>) -> Self {
        self.client_addr = Some(addr.into());
        self
    }

    /// Attach the session's target URI.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}
