//! Connection Acceptor
//!
//! Owns the listening socket. Every accepted connection is wrapped in a
//! [`ConnectionHandle`], pushed onto the job queue and recorded in the
//! connection log.
//!
//! ## Lifecycle
//!
//! ```text
//! accept() ──> enqueue() ──> log ──┐
//!    ▲                             │
//!    └─────────────────────────────┘  until the shutdown signal
//! ```
//!
//! A full queue blocks the enqueue, so no further connections are accepted
//! until a processor frees a slot; nothing is dropped. A failed accept is
//! logged and the loop carries on. When the shutdown signal is raised the
//! loop ends and the listener is dropped, so new connections are refused.

use crate::journal::{Actor, LogWriter};
use crate::queue::JobQueue;
use crate::server::connection::ConnectionHandle;
use crate::server::stats::ServerStats;
use crate::shutdown::ShutdownSignal;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Pause after a failed accept, so persistent errors (e.g. out of file
/// descriptors) do not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// The connection-log line for an accepted peer.
pub fn connection_message(peer: SocketAddr) -> String {
    format!(
        "Connection established to {}, port {}. Placed in process queue.",
        peer.ip(),
        peer.port()
    )
}

pub struct Acceptor {
    listener: TcpListener,
    queue: Arc<JobQueue<ConnectionHandle>>,
    log: LogWriter,
    stats: Arc<ServerStats>,
    shutdown: ShutdownSignal,
    next_id: u64,
}

impl Acceptor {
    pub fn new(
        listener: TcpListener,
        queue: Arc<JobQueue<ConnectionHandle>>,
        log: LogWriter,
        stats: Arc<ServerStats>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            listener,
            queue,
            log,
            stats,
            shutdown,
            next_id: 1,
        }
    }

    /// Runs the accept loop until shutdown. Returns the number of
    /// connections handed to the queue.
    pub async fn run(mut self) -> u64 {
        if let Ok(addr) = self.listener.local_addr() {
            info!(address = %addr, "Acceptor listening");
        }

        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.shutdown.wait() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    if !self.hand_off(stream, peer).await {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    self.stats.accept_failed();
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }

        let handed_off = self.next_id - 1;
        info!(connections = handed_off, "Acceptor stopped, listener closed");
        handed_off
    }

    /// Queues one connection and logs it. Returns false if shutdown
    /// interrupted the hand-off.
    async fn hand_off(&mut self, stream: TcpStream, peer: SocketAddr) -> bool {
        let handle = ConnectionHandle::new(self.next_id, stream, peer);

        if self.queue.len() >= self.queue.capacity() {
            debug!(client = %peer, "Job queue full, waiting for a free slot");
        }

        let queued = tokio::select! {
            biased;
            _ = self.shutdown.wait() => {
                debug!(client = %peer, "Shutdown while waiting for a queue slot, closing connection");
                return false;
            }
            queued = self.queue.enqueue(handle) => queued,
        };
        if let Err(e) = queued {
            warn!(client = %peer, error = %e, "Connection not queued");
            return false;
        }

        debug!(client = %peer, id = self.next_id, queued = self.queue.len(), "Connection queued");
        self.next_id += 1;
        self.stats.connection_accepted();

        if let Err(e) = self.log.append(Actor::Acceptor, connection_message(peer)).await {
            error!(error = %e, "Failed to write connection log");
            self.stats.log_failed();
        }
        true
    }
}
