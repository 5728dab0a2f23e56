//! Serialized, durable log file appends.
//!
//! Each `LogWriter` owns one append-mode file handle behind an async mutex.
//! An append formats the whole line first, then writes it with a single
//! `write_all`, flushes and calls `sync_data` before releasing the lock.
//! Concurrent callers are therefore serialized: a line is either fully in
//! the file or not there at all, and is durable when `append` returns.

use crate::journal::entry::{Actor, LogEntry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Errors raised by the log writer.
#[derive(Debug, Error)]
pub enum JournalError {
    /// The log file could not be created or opened for appending
    #[error("cannot open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line could not be written or synced
    #[error("cannot append to log file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A shared handle to one append-only log file.
#[derive(Debug, Clone)]
pub struct LogWriter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    file: Mutex<File>,
}

impl LogWriter {
    /// Opens (creating if needed) `path` for appending.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| JournalError::Open {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "Log file opened");

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                file: Mutex::new(file),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Stamps `message` with the current time and appends it.
    pub async fn append(
        &self,
        actor: Actor,
        message: impl Into<String>,
    ) -> Result<LogEntry, JournalError> {
        let entry = LogEntry::new(actor, message);
        self.write_entry(&entry).await?;
        Ok(entry)
    }

    /// Appends a prepared entry.
    pub async fn write_entry(&self, entry: &LogEntry) -> Result<(), JournalError> {
        let line = entry.to_line();
        let write_err = |source| JournalError::Write {
            path: self.inner.path.clone(),
            source,
        };

        {
            let mut file = self.inner.file.lock().await;
            file.write_all(line.as_bytes()).await.map_err(write_err)?;
            file.flush().await.map_err(write_err)?;
            file.sync_data().await.map_err(write_err)?;
        }

        debug!(
            target: "cmdrelay::journal",
            log = %self.inner.path.display(),
            actor = %entry.actor,
            "{}",
            entry.message
        );
        Ok(())
    }
}
