//! # cmdrelay - A TCP Command Relay for Embedded Control
//!
//! cmdrelay accepts TCP connections, queues them in arrival order and hands
//! each one to a processor that reads a short command token and runs a fixed
//! action. It is meant for small control front ends: poking an attached
//! microcontroller, re-running a local server configuration, or stopping the
//! process remotely.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              cmdrelay                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │  Acceptor   │───>│  JobQueue   │───>│ Processor   │──> ActionTable   │
//! │  │ (Listener)  │    │ (bounded)   │    │ (1..N)      │                  │
//! │  └──────┬──────┘    └─────────────┘    └──────┬──────┘                  │
//! │         │                                     │                         │
//! │         ▼                                     ▼                         │
//! │   connection log        LogWriter        processing log                 │
//! │                                               │                         │
//! │                                               ▼ SHUTDOWN                │
//! │                                        ShutdownSignal ──> driver exits  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use cmdrelay::server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     let report = server.run().await;
//!     println!("served {} commands", report.stats.commands_dispatched());
//!     Ok(())
//! }
//! ```
//!
//! ## Protocol
//!
//! A client connects and sends one token, NUL-padded to 10 bytes or ended by
//! a newline. Tokens are case-insensitive:
//!
//! - `ARDUINO` - forward to the microcontroller action
//! - `SERVER` - run the server configuration action
//! - `SHUTDOWN` - stop the server
//!
//! Anything else is logged as an unrecognized command. The server never
//! replies on the wire.
//!
//! ## Module Overview
//!
//! - [`protocol`]: command vocabulary and frame reading
//! - [`queue`]: bounded FIFO hand-off queue
//! - [`commands`]: action handlers for `ARDUINO` and `SERVER`
//! - [`journal`]: serialized, durable log files
//! - [`shutdown`]: the shared shutdown signal
//! - [`server`]: acceptor, processors, configuration and the driver

pub mod commands;
pub mod journal;
pub mod protocol;
pub mod queue;
pub mod server;
pub mod shutdown;

// Re-export commonly used types for convenience
pub use commands::{ActionError, ActionHandler, ActionTable};
pub use journal::{LogWriter, ServerLogs};
pub use protocol::{Command, FrameReader, ReceivedCommand};
pub use queue::{JobQueue, QueueError};
pub use server::{Server, ServerConfig, ServerError, ShutdownReport};
pub use shutdown::ShutdownSignal;

/// The default port cmdrelay listens on
pub const DEFAULT_PORT: u16 = 44444;

/// The default host cmdrelay binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Listen backlog for connections the acceptor has not taken yet
pub const DEFAULT_BACKLOG: u32 = 5;

/// Default capacity of the hand-off queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default number of processors
pub const DEFAULT_WORKERS: usize = 1;

/// Default time allowed for a client to send its command frame
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;

/// Default connection log file
pub const DEFAULT_CONNECTION_LOG: &str = "ServerLog.txt";

/// Default processing log file
pub const DEFAULT_PROCESS_LOG: &str = "ProcessLog.txt";

/// Version of cmdrelay
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
