//! Fatal server errors.
//!
//! Everything here stops the server before it starts serving. Per-connection
//! problems (failed accepts, bad reads, unknown commands) are never errors at
//! this level; they are logged and the loops keep going.

use crate::journal::JournalError;
use crate::queue::QueueError;
use crate::server::config::ConfigError;
use thiserror::Error;

/// Errors that prevent the server from running.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} did not resolve to any address")]
    NoAddress(String),

    #[error("cannot listen on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error("cannot create job queue: {0}")]
    Queue(#[from] QueueError),
}
