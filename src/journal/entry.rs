//! Log entries and their timestamps.

use std::fmt;
use std::sync::OnceLock;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Captures the local UTC offset for log timestamps.
///
/// The offset can only be read reliably while the process is still
/// single-threaded, so the binary calls this before starting the runtime.
/// Without it timestamps are written in UTC.
pub fn init_local_offset() -> UtcOffset {
    *LOCAL_OFFSET.get_or_init(|| UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
}

/// Current time in the captured local offset.
pub fn now() -> OffsetDateTime {
    let offset = LOCAL_OFFSET.get().copied().unwrap_or(UtcOffset::UTC);
    OffsetDateTime::now_utc().to_offset(offset)
}

/// Formats a timestamp like `Mon Oct 19 14:03:12 2026`.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[weekday repr:short] [month repr:short] [day padding:space] [hour]:[minute]:[second] [year]"
    ))
    .unwrap_or_else(|_| at.to_string())
}

/// Who produced a log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Acceptor,
    Processor(String),
    Driver,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Acceptor => f.write_str("acceptor"),
            Actor::Processor(name) => f.write_str(name),
            Actor::Driver => f.write_str("driver"),
        }
    }
}

/// One line of an append-only log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: OffsetDateTime,
    pub actor: Actor,
    pub message: String,
}

impl LogEntry {
    pub fn new(actor: Actor, message: impl Into<String>) -> Self {
        Self {
            timestamp: now(),
            actor,
            message: message.into(),
        }
    }

    /// The entry as written to disk, including the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Messages are single-line; embedded newlines would split an entry.
        let message = self.message.replace(['\n', '\r'], " ");
        write!(f, "{} -- {}", format_timestamp(self.timestamp), message)
    }
}
