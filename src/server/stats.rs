//! Counters shared by the acceptor, the processors and the driver.

use crate::protocol::Command;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for a running server
#[derive(Debug, Default)]
pub struct ServerStats {
    /// Total number of connections accepted and queued
    pub connections_accepted: AtomicU64,
    /// Accept calls that failed
    pub accept_failures: AtomicU64,
    /// `ARDUINO` commands dispatched
    pub arduino_commands: AtomicU64,
    /// `SERVER` commands dispatched
    pub server_commands: AtomicU64,
    /// `SHUTDOWN` commands received
    pub shutdown_commands: AtomicU64,
    /// Unrecognized, empty or unreadable commands
    pub unknown_commands: AtomicU64,
    /// Frame reads that failed or timed out
    pub read_failures: AtomicU64,
    /// Action handlers that returned an error
    pub handler_failures: AtomicU64,
    /// Log appends that failed
    pub log_failures: AtomicU64,
    /// Queued connections closed without dispatch at shutdown
    pub discarded_at_shutdown: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accept_failed(&self) {
        self.accept_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_dispatched(&self, command: Command) {
        let counter = match command {
            Command::Arduino => &self.arduino_commands,
            Command::Server => &self.server_commands,
            Command::Shutdown => &self.shutdown_commands,
            Command::Unknown => &self.unknown_commands,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn read_failed(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_failed(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn log_failed(&self) {
        self.log_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn discarded(&self, count: usize) {
        self.discarded_at_shutdown
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Total commands dispatched, of any kind.
    pub fn commands_dispatched(&self) -> u64 {
        self.snapshot().commands_dispatched()
    }

    /// A point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            accept_failures: self.accept_failures.load(Ordering::Relaxed),
            arduino_commands: self.arduino_commands.load(Ordering::Relaxed),
            server_commands: self.server_commands.load(Ordering::Relaxed),
            shutdown_commands: self.shutdown_commands.load(Ordering::Relaxed),
            unknown_commands: self.unknown_commands.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            log_failures: self.log_failures.load(Ordering::Relaxed),
            discarded_at_shutdown: self.discarded_at_shutdown.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`ServerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connections_accepted: u64,
    pub accept_failures: u64,
    pub arduino_commands: u64,
    pub server_commands: u64,
    pub shutdown_commands: u64,
    pub unknown_commands: u64,
    pub read_failures: u64,
    pub handler_failures: u64,
    pub log_failures: u64,
    pub discarded_at_shutdown: u64,
}

impl StatsSnapshot {
    pub fn commands_dispatched(&self) -> u64 {
        self.arduino_commands + self.server_commands + self.shutdown_commands + self.unknown_commands
    }
}
