use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::entry::SessionEvent;

/// Errors that can occur during session log I/O.
#[derive(Debug, thiserror::Error)]
pub enum EventWriteError {
    #[error("failed to create parent directories: {0}")]
    CreateDir(std::io::Error),

    #[error("failed to open session log file: {0}")]
    OpenFile(std::io::Error),

    #[error("failed to serialize session event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write to session log: {0}")]
    Write(std::io::Error),

    #[error("failed to flush session log: {0}")]
    Flush(std::io::Error),
}

/// Append-only file writer that serialises [`SessionEvent`] values as
/// JSON-lines.
///
/// Each call to [`write`](Self::write) produces exactly one
/// newline-terminated JSON object in the output file.
pub struct EventWriter {
    file: tokio::fs::File,
}

impl EventWriter {
    /// Open (or create) the session log file at `path` in append mode.
    ///
    /// Parent directories are created automatically if they do not exist.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, EventWriteError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(EventWriteError::CreateDir)?;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(EventWriteError::OpenFile)?;

        Ok(Self { file })
    }

    /// Serialise `event` as a single JSON line and append it to the file.
    pub async fn write(&mut self, event: &SessionEvent) -> Result<(), EventWriteError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        self.file
            .write_all(&line)
            .await
            .map_err(EventWriteError::Write)?;

        Ok(())
    }

    /// Flush the underlying file, ensuring all buffered data reaches disk.
    pub async fn flush(&mut self) -> Result<(), EventWriteError> {
        self.file.flush().await.map_err(EventWriteError::Flush)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{SessionEventKind, SessionRef};

    #[tokio::test]
    async fn writes_one_json_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.jsonl");

        let mut writer = EventWriter::new(&path).await.unwrap();
        writer
            .write(&SessionEvent::new(
                SessionEventKind::ProcessStarted,
                serde_json::json!({"version": "test"}),
            ))
            .await
            .unwrap();
        writer
            .write(&SessionEvent::for_session(
                SessionEventKind::SessionOpened,
                SessionRef::new("abc").with_client_addr("127.0.0.1:1234"),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        writer.flush().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: SessionEvent = serde_json::from_str(lines[0]).unwrap();
        assert!(matches!(first.kind, SessionEventKind::ProcessStarted));
        assert!(first.session.is_none());

        let second: SessionEvent = serde_json::from_str(lines[1]).unwrap();
        let session = second.session.unwrap();
        assert_eq!(session.session_id, "abc");
        assert_eq!(session.client_addr.as_deref(), Some("127.0.0.1:1234"));
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/sessions.jsonl");

        let mut writer = EventWriter::new(&path).await.unwrap();
        writer
            .write(&SessionEvent::new(
                SessionEventKind::ProcessStopped,
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        writer.flush().await.unwrap();

        assert!(path.exists());
    }
}
