//! The unit of work passed from the acceptor to a processor.

use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::TcpStream;

/// An accepted client stream plus what was known about it at accept time.
///
/// Ownership moves acceptor → queue → exactly one processor. Dropping the
/// handle closes the stream.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Accept sequence number, starting at 1
    pub id: u64,
    pub stream: TcpStream,
    pub peer: SocketAddr,
    pub accepted_at: Instant,
}

impl ConnectionHandle {
    pub fn new(id: u64, stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            id,
            stream,
            peer,
            accepted_at: Instant::now(),
        }
    }
}
