//! Command Processor
//!
//! A processor takes connections off the job queue one at a time, reads the
//! command token, dispatches it and records the outcome in the processing
//! log. Several processors may share one queue; each keeps FIFO order for
//! what it takes.
//!
//! ## State Machine
//!
//! ```text
//!        ┌──────────────────────────────────────────────────────────┐
//!        ▼                                                          │
//!      Idle ──> Dequeuing ──> Reading ──> Classifying ──> Dispatching ──> Logging
//!                   │                                                  │
//!                   │ shutdown while waiting                 SHUTDOWN  │
//!                   ▼                                                  ▼
//!                Stopped <──────────────────────────────────────── Stopped
//! ```
//!
//! An empty queue suspends the processor on the queue itself; there is no
//! polling. A read that fails, times out or returns nothing is treated as
//! an unrecognized command, so one bad client never stops the loop.

use crate::commands::ActionTable;
use crate::journal::{Actor, LogWriter};
use crate::protocol::{Command, FrameReader, ReceivedCommand};
use crate::queue::JobQueue;
use crate::server::connection::ConnectionHandle;
use crate::server::stats::ServerStats;
use crate::shutdown::ShutdownSignal;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

/// Where a processor is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    Dequeuing,
    Reading,
    Classifying,
    Dispatching,
    Logging,
    Stopped,
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Whether the loop carries on after a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
    /// Shutdown arrived before the command was read; the connection was
    /// closed without being dispatched.
    Abandoned,
}

/// The processing-log line for a dispatched command.
pub fn dispatch_message(
    processor: &str,
    received: &ReceivedCommand,
    handler_error: Option<&str>,
) -> String {
    match handler_error {
        Some(e) => format!(
            "{} received command {}, {} (handler error: {}).",
            processor,
            received.token,
            received.command.action(),
            e
        ),
        None => format!(
            "{} received command {}, {}.",
            processor,
            received.token,
            received.command.action()
        ),
    }
}

/// What a processor did before it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorSummary {
    pub name: String,
    pub processed: u64,
}

pub struct Processor {
    name: String,
    queue: Arc<JobQueue<ConnectionHandle>>,
    reader: FrameReader,
    actions: ActionTable,
    log: LogWriter,
    stats: Arc<ServerStats>,
    shutdown: ShutdownSignal,
    state: ProcessorState,
    processed: u64,
}

impl Processor {
    pub fn new(
        name: impl Into<String>,
        queue: Arc<JobQueue<ConnectionHandle>>,
        reader: FrameReader,
        actions: ActionTable,
        log: LogWriter,
        stats: Arc<ServerStats>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            reader,
            actions,
            log,
            stats,
            shutdown,
            state: ProcessorState::Idle,
            processed: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Runs until a `SHUTDOWN` command is processed here, the shutdown
    /// signal is observed, or the queue is closed. Connections abandoned
    /// mid-read are not counted as processed.
    pub async fn run(mut self) -> ProcessorSummary {
        info!(processor = %self.name, "Processor ready");

        loop {
            self.transition(ProcessorState::Idle);
            self.transition(ProcessorState::Dequeuing);

            let next = tokio::select! {
                biased;
                _ = self.shutdown.wait() => None,
                handle = self.queue.dequeue() => handle,
            };
            let Some(handle) = next else {
                break;
            };

            debug!(
                processor = %self.name,
                id = handle.id,
                client = %handle.peer,
                waited_ms = handle.accepted_at.elapsed().as_millis() as u64,
                "Pulled connection from queue"
            );
            match self.process(handle).await {
                Flow::Continue => self.processed += 1,
                Flow::Stop => {
                    self.processed += 1;
                    break;
                }
                Flow::Abandoned => break,
            }
        }

        self.transition(ProcessorState::Stopped);
        info!(processor = %self.name, processed = self.processed, "Processor stopped");

        ProcessorSummary {
            name: self.name,
            processed: self.processed,
        }
    }

    /// Handles one connection from read to log. The stream is closed when
    /// this returns.
    ///
    /// If the shutdown signal is raised while the command is still being
    /// read, the connection is dropped unlogged and counted as discarded.
    pub async fn process(&mut self, handle: ConnectionHandle) -> Flow {
        let ConnectionHandle {
            id,
            mut stream,
            peer,
            ..
        } = handle;

        self.transition(ProcessorState::Reading);
        let read = tokio::select! {
            biased;
            read = self.reader.read_command(&mut stream) => read,
            _ = self.shutdown.wait() => {
                info!(processor = %self.name, id, client = %peer, "Shutdown during read, dropping connection");
                self.stats.discarded(1);
                return Flow::Abandoned;
            }
        };
        let received = match read {
            Ok(received) => received,
            Err(e) => {
                warn!(processor = %self.name, id, client = %peer, error = %e, "Failed to read command");
                self.stats.read_failed();
                ReceivedCommand::empty()
            }
        };

        self.transition(ProcessorState::Classifying);
        trace!(processor = %self.name, token = %received.token, command = %received.command, "Classified command");

        self.transition(ProcessorState::Dispatching);
        let handler_error = self.dispatch(received.command, &mut stream, peer).await;
        self.stats.command_dispatched(received.command);

        self.transition(ProcessorState::Logging);
        let message = dispatch_message(&self.name, &received, handler_error.as_deref());
        if let Err(e) = self
            .log
            .append(Actor::Processor(self.name.clone()), message)
            .await
        {
            error!(processor = %self.name, error = %e, "Failed to write processing log");
            self.stats.log_failed();
        }

        if received.command.stops_processor() {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    /// Runs the action bound to `command`. Returns the handler's error text,
    /// if any.
    async fn dispatch(
        &self,
        command: Command,
        stream: &mut TcpStream,
        peer: SocketAddr,
    ) -> Option<String> {
        match command {
            Command::Shutdown => {
                if self.shutdown.signal() {
                    info!(processor = %self.name, client = %peer, "Shutdown command received");
                }
                None
            }
            Command::Unknown => {
                warn!(processor = %self.name, client = %peer, "Command unrecognized");
                None
            }
            Command::Arduino | Command::Server => {
                let handler = self.actions.handler_for(command)?;
                match handler.handle(stream, peer).await {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(processor = %self.name, client = %peer, command = %command, error = %e, "Action failed");
                        self.stats.handler_failed();
                        Some(e.to_string())
                    }
                }
            }
        }
    }

    fn transition(&mut self, next: ProcessorState) {
        trace!(processor = %self.name, from = %self.state, to = %next, "Processor state");
        self.state = next;
    }
}
