use std::path::Path;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::entry::SessionEvent;
use crate::writer::EventWriter;

/// Channel buffer size used between producers and the background writer task.
const CHANNEL_BUFFER: usize = 1024;

/// Flush the writer at most every this many seconds when the channel is idle.
const FLUSH_INTERVAL_SECS: u64 = 1;

/// A cheap, cloneable handle used to submit [`SessionEvent`] values into the
/// background session-log writer.
///
/// `EventSink` is `Clone + Send + Sync` so it can be shared freely across
/// sessions and tasks.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<SessionEvent>,
}

impl EventSink {
    /// Spawn the background writer task and return a `(sink, join_handle)`
    /// pair.
    ///
    /// The writer opens (or creates) the file at `path` in append mode and
    /// begins draining events from the internal channel. The background task
    /// will:
    ///
    /// * Write each event as a JSON line via [`EventWriter`].
    /// * Flush periodically (every ~1 second of channel inactivity).
    /// * Flush once more when the last `EventSink` clone is dropped and the
    ///   channel closes, then exit cleanly.
    ///
    /// # Panics
    ///
    /// The background task will **not** panic. I/O errors are logged via
    /// `tracing::error` and the event is skipped.
    pub async fn start(
        path: impl AsRef<Path>,
    ) -> Result<(Self, JoinHandle<()>), crate::writer::EventWriteError> {
        let (tx, rx) = mpsc::channel::<SessionEvent>(CHANNEL_BUFFER);

        let mut writer = EventWriter::new(path).await?;

        let handle = tokio::spawn(async move {
            run_writer_loop(&mut writer, rx).await;
        });

        Ok((Self { tx }, handle))
    }

    /// Send a session event to the background writer.
    ///
    /// If the channel is full this will wait asynchronously until space is
    /// available. If the background task has already exited (e.g. after a
    /// fatal I/O error) the event is silently dropped and a warning is
    /// logged.
    pub async fn log(&self, event: SessionEvent) {
        if let Err(err) = self.tx.send(event).await {
            tracing::warn!(
                kind = ?err.0.kind,
                "session log channel closed — event dropped"
            );
        }
    }
}

/// Core loop executed inside the background task.
///
/// Reads events from the channel and writes them to the session log. When
/// the channel has no events ready for [`FLUSH_INTERVAL_SECS`] the writer is
/// flushed. On channel close a final flush is performed.
async fn run_writer_loop(writer: &mut EventWriter, mut rx: mpsc::Receiver<SessionEvent>) {
    let flush_interval = tokio::time::Duration::from_secs(FLUSH_INTERVAL_SECS);
    let mut dirty = false;

    loop {
        // Wait for the next event, but time out so we can periodically flush.
        let maybe_event = tokio::time::timeout(flush_interval, rx.recv()).await;

        match maybe_event {
            // Received an event before the timeout.
            Ok(Some(event)) => {
                if let Err(err) = writer.write(&event).await {
                    tracing::error!(%err, "failed to write session event");
                } else {
                    dirty = true;
                }
            }
            // Channel closed — perform final flush and exit.
            Ok(None) => {
                if dirty {
                    if let Err(err) = writer.flush().await {
                        tracing::error!(%err, "failed to flush session log on shutdown");
                    }
                }
                tracing::debug!("session log background task shutting down");
                return;
            }
            // Timeout — flush if we have outstanding writes.
            Err(_) => {
                if dirty {
                    if let Err(err) = writer.flush().await {
                        tracing::error!(%err, "periodic session log flush failed");
                    } else {
                        dirty = false;
                    }
                }
            }
        }
    }
}
