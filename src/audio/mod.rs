//! Append-only audio storage for live sessions.
//!
//! Every session owns one raw audio file under the storage root. Chunks are
//! only ever appended in arrival order; there is no compaction, truncation,
//! or random access. One logical writer per session.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

const AUDIO_FILE_NAME: &str = "audio.raw";

/// Storage root for per-session audio data.
#[derive(Debug, Clone)]
pub struct AudioStore {
    root: PathBuf,
}

impl AudioStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    /// Create the session directory and return the path of its audio file.
    pub fn prepare(&self, session_id: &str) -> Result<PathBuf> {
        let dir = self.session_dir(session_id);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create session storage dir {dir:?}"))?;
        Ok(dir.join(AUDIO_FILE_NAME))
    }

    /// Open an append-only sink for a session's audio file.
    pub async fn open(&self, audio_path: &Path) -> std::io::Result<AudioSink> {
        AudioSink::open(audio_path).await
    }
}

/// Append-only sink for one session's audio bytes.
pub struct AudioSink {
    file: File,
    bytes_written: u64,
}

impl AudioSink {
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await?;
        Ok(Self {
            file,
            bytes_written: 0,
        })
    }

    /// Durably extend the file with one chunk.
    pub async fn append(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.file.write_all(bytes).await?;
        self.file.flush().await?;
        self.bytes_written += bytes.len() as u64;
        Ok(bytes.len())
    }

    /// Bytes appended through this sink (not the total file size).
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Sync outstanding writes and release the handle.
    pub async fn close(mut self) -> std::io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        debug!("Audio sink closed after {} bytes", self.bytes_written);
        Ok(())
    }
}

/// One-shot append for callers that do not hold a sink open (REST uploads).
pub async fn append_chunk(path: &Path, bytes: &[u8]) -> std::io::Result<usize> {
    let mut file = OpenOptions::new().append(true).create(true).open(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path());
        let path = store.prepare("s1").unwrap();

        let mut sink = store.open(&path).await.unwrap();
        sink.append(b"abc").await.unwrap();
        sink.append(b"def").await.unwrap();
        assert_eq!(sink.bytes_written(), 6);
        sink.close().await.unwrap();

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(contents, b"abcdef");
    }

    #[tokio::test]
    async fn test_reopened_sink_extends_existing_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path());
        let path = store.prepare("s1").unwrap();

        let mut sink = store.open(&path).await.unwrap();
        sink.append(b"first").await.unwrap();
        sink.close().await.unwrap();

        let mut sink = store.open(&path).await.unwrap();
        sink.append(b"-second").await.unwrap();
        sink.close().await.unwrap();

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(contents, b"first-second");
    }

    #[tokio::test]
    async fn test_append_chunk_without_sink() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path());
        let path = store.prepare("s1").unwrap();

        append_chunk(&path, b"one").await.unwrap();
        append_chunk(&path, b"two").await.unwrap();

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(contents, b"onetwo");
    }

    #[test]
    fn test_prepare_creates_session_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path());

        let path = store.prepare("abc-123").unwrap();
        assert!(path.parent().unwrap().is_dir());
        assert!(path.ends_with("abc-123/audio.raw"));
    }
}
