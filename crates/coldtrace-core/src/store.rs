//! Persistent storage for decoded readings.
//!
//! Readings are append-only. The only query is "most recent N, newest
//! first", served to the dashboard.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::types::DecodedReading;

/// Number of readings returned by the recent-readings query.
pub const RECENT_READINGS_LIMIT: usize = 5;

/// File name of the JSON lines store inside the data directory.
pub const READINGS_FILE: &str = "readings.jsonl";

/// How much of the JSON lines file is read per step when scanning from the end.
const TAIL_CHUNK_BYTES: u64 = 8 * 1024;

/// Errors raised by a [`Store`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store I/O failed on {}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A reading could not be serialized.
    #[error("failed to serialize reading: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The write did not complete in time.
    #[error("store write timed out after {0} ms")]
    Timeout(u64),

    /// Backend-specific failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durable append of decoded readings.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist one reading.
    async fn append(&self, reading: &DecodedReading) -> StoreResult<()>;

    /// Up to `limit` readings, newest `timestamp` first.
    async fn recent(&self, limit: usize) -> StoreResult<Vec<DecodedReading>>;
}

/// Keep the `limit` newest readings, newest first. Ties keep the later
/// append first.
fn newest_first(mut readings: Vec<DecodedReading>, limit: usize) -> Vec<DecodedReading> {
    readings.reverse();
    readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    readings.truncate(limit);
    readings
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: Mutex<Vec<DecodedReading>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored readings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.lock().len()
    }

    /// Whether nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.lock().is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn append(&self, reading: &DecodedReading) -> StoreResult<()> {
        self.readings.lock().push(reading.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<DecodedReading>> {
        let readings = self.readings.lock().clone();
        Ok(newest_first(readings, limit))
    }
}

/// Append-only JSON lines file, one reading per line.
#[derive(Debug)]
pub struct JsonLinesStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonLinesStore {
    /// Open (creating if needed) the store inside `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|source| StoreError::Io {
            path: data_dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: data_dir.join(READINGS_FILE),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The last `limit` parseable readings, in append order.
    ///
    /// Reads the file backwards in fixed-size chunks and stops as soon as
    /// enough lines parse, so the cost follows `limit` and not file size.
    async fn read_tail(&self, limit: usize) -> StoreResult<Vec<DecodedReading>> {
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        let mut pos = file.metadata().await.map_err(|e| self.io_error(e))?.len();

        let mut newest_last = Vec::new();
        // Bytes of a line that started before the chunk we just read.
        let mut partial: Vec<u8> = Vec::new();

        while pos > 0 && newest_last.len() < limit {
            let chunk_len = pos.min(TAIL_CHUNK_BYTES);
            pos -= chunk_len;

            let mut chunk = vec![0; usize::try_from(chunk_len).unwrap_or_default()];
            file.seek(SeekFrom::Start(pos))
                .await
                .map_err(|e| self.io_error(e))?;
            file.read_exact(&mut chunk)
                .await
                .map_err(|e| self.io_error(e))?;
            chunk.extend_from_slice(&partial);

            let mut lines = chunk.split(|b| *b == b'\n');
            // Unless we reached the start of the file, the first piece may
            // be the tail end of an earlier line.
            let head = if pos > 0 { lines.next() } else { None };
            let complete: Vec<&[u8]> = lines.collect();

            for line in complete.into_iter().rev() {
                if newest_last.len() == limit {
                    break;
                }
                if let Some(reading) = self.parse_line(line) {
                    newest_last.push(reading);
                }
            }
            partial = head.map(<[u8]>::to_vec).unwrap_or_default();
        }

        newest_last.reverse();
        Ok(newest_last)
    }

    fn parse_line(&self, line: &[u8]) -> Option<DecodedReading> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        match serde_json::from_slice(line) {
            Ok(reading) => Some(reading),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Skipping corrupt reading"
                );
                None
            }
        }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl Store for JsonLinesStore {
    async fn append(&self, reading: &DecodedReading) -> StoreResult<()> {
        let mut line = serde_json::to_vec(reading)?;
        line.push(b'\n');

        // One writer at a time so lines never interleave.
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(&line).await.map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<DecodedReading>> {
        let readings = self.read_tail(limit).await?;
        Ok(newest_first(readings, limit))
    }
}
