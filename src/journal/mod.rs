//! Log Files
//!
//! The server keeps two append-only text logs:
//!
//! - the **connection log**: one line per accepted connection, plus the final
//!   shutdown marker
//! - the **processing log**: one line per dispatched command
//!
//! Both the acceptor and the processors write concurrently, so all appends
//! go through a [`LogWriter`], which serializes them and makes each line
//! durable before returning.

pub mod entry;
pub mod writer;

use std::path::Path;

pub use entry::{format_timestamp, init_local_offset, now, Actor, LogEntry};
pub use writer::{JournalError, LogWriter};

/// The pair of log files used by a running server.
#[derive(Debug, Clone)]
pub struct ServerLogs {
    pub connections: LogWriter,
    pub processing: LogWriter,
}

impl ServerLogs {
    /// Opens both logs. Failing to open either one is fatal for the server.
    pub async fn open(
        connection_log: impl AsRef<Path>,
        process_log: impl AsRef<Path>,
    ) -> Result<Self, JournalError> {
        Ok(Self {
            connections: LogWriter::open(connection_log).await?,
            processing: LogWriter::open(process_log).await?,
        })
    }
}
