//! Destinations for access-log lines.
//!
//! [`FileSink`] appends to a file through a buffer and makes it durable on
//! [`LogSink::sync`]. [`MemorySink`] keeps lines in shared memory so tests
//! and embedders can read them back.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::FrontdoorError;

/// A line-oriented log destination owned by the access-log writer task.
#[async_trait]
pub trait LogSink: Send {
    /// Append one line. The newline is added by the sink.
    async fn write_line(&mut self, line: &str) -> std::io::Result<()>;

    /// Push buffered lines to durable storage.
    async fn sync(&mut self) -> std::io::Result<()>;

    async fn close(&mut self) -> std::io::Result<()> {
        self.sync().await
    }
}

pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    /// Open `path` for appending, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, FrontdoorError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| FrontdoorError::AccessLogOpen {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LogSink for FileSink {
    async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await
    }

    async fn sync(&mut self) -> std::io::Result<()> {
        self.writer.flush().await?;
        self.writer.get_ref().sync_data().await
    }

    async fn close(&mut self) -> std::io::Result<()> {
        self.sync().await?;
        self.writer.shutdown().await
    }
}

/// In-memory sink. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
    syncs: Arc<AtomicUsize>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of times the writer asked for a durability flush.
    #[must_use]
    pub fn syncs(&self) -> usize {
        self.syncs.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }

    async fn sync(&mut self) -> std::io::Result<()> {
        self.syncs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_sink_appends_to_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        std::fs::write(&path, "old line\n").unwrap();

        let mut sink = FileSink::open(&path).await.unwrap();
        sink.write_line("new line").await.unwrap();
        sink.close().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "old line\nnew line\n");
    }

    #[tokio::test]
    async fn file_sink_open_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("access.log");
        let err = FileSink::open(&path).await.err().unwrap();
        assert!(matches!(err, FrontdoorError::AccessLogOpen { .. }));
    }

    #[tokio::test]
    async fn memory_sink_clones_share_lines() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.write_line("a").await.unwrap();
        writer.close().await.unwrap();
        assert_eq!(sink.lines(), vec!["a"]);
        assert_eq!(sink.syncs(), 1);
    }
}
