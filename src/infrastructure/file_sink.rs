//! File-backed persistence sink.
//!
//! Accepted messages are enqueued on a channel and written by a
//! background task as JSON Lines, batched and flushed once per second so
//! the broker's critical section never waits on disk I/O. Recovery reads
//! the file once at startup and tolerates anything: a missing file or a
//! corrupt line yields less history, never a failed start.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::domain::{Message, MessageSink};

const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
enum SinkError {
    #[error("failed to open message log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write message log: {0}")]
    Write(#[from] std::io::Error),
}

/// Append-only JSON Lines log of accepted messages.
pub struct FileMessageSink {
    path: PathBuf,
    tx: mpsc::UnboundedSender<Message>,
}

impl FileMessageSink {
    /// Create a sink writing to `path` and spawn its writer task.
    pub fn new(path: PathBuf) -> Self {
        Self::with_flush_interval(path, FLUSH_INTERVAL)
    }

    /// As [`FileMessageSink::new`] with a custom flush interval. Tests
    /// use short intervals to avoid waiting out the production one.
    pub fn with_flush_interval(path: PathBuf, flush_interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer_path = path.clone();
        tokio::spawn(async move {
            run_writer(writer_path, rx, flush_interval).await;
        });
        Self { path, tx }
    }
}

#[async_trait]
impl MessageSink for FileMessageSink {
    fn append(&self, message: &Message) {
        // Only fails if the writer task is gone, which means we are
        // shutting down; the message is still in the in-memory history.
        if self.tx.send(message.clone()).is_err() {
            tracing::warn!("message log writer is gone, dropping message");
        }
    }

    async fn recover_all(&self) -> Vec<Message> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no message log at {}, starting empty", self.path.display());
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(
                    "failed to read message log {}: {}, starting empty",
                    self.path.display(),
                    e
                );
                return Vec::new();
            }
        };

        let mut messages = Vec::new();
        let mut skipped = 0usize;
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(line) {
                Ok(message) => messages.push(message),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(
                "skipped {} malformed line(s) while recovering {}",
                skipped,
                self.path.display()
            );
        }
        tracing::info!(
            "recovered {} message(s) from {}",
            messages.len(),
            self.path.display()
        );
        messages
    }
}

/// Drain the channel into a pending batch and flush it on every interval
/// tick, and once more when the sink is dropped and the channel closes.
async fn run_writer(
    path: PathBuf,
    mut rx: mpsc::UnboundedReceiver<Message>,
    flush_interval: Duration,
) {
    let mut pending: Vec<Message> = Vec::new();
    let mut interval = tokio::time::interval(flush_interval);
    interval.tick().await; // first tick is immediate

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(message) => pending.push(message),
                None => {
                    flush_pending(&path, &mut pending).await;
                    break;
                }
            },
            _ = interval.tick() => {
                flush_pending(&path, &mut pending).await;
            }
        }
    }
}

async fn flush_pending(path: &Path, pending: &mut Vec<Message>) {
    if pending.is_empty() {
        return;
    }
    if let Err(e) = write_batch(path, pending).await {
        // Best effort: the batch is dropped, the in-memory history and
        // fan-out were never blocked on it.
        tracing::error!("dropping {} message(s): {}", pending.len(), e);
    }
    pending.clear();
}

async fn write_batch(path: &Path, batch: &[Message]) -> Result<(), SinkError> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let mut out = String::new();
    for message in batch {
        // Message serialization cannot fail: no maps, no non-string keys.
        out.push_str(&serde_json::to_string(message).map_err(std::io::Error::other)?);
        out.push('\n');
    }
    file.write_all(out.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
