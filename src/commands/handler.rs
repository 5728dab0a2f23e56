//! Action Handlers
//!
//! `ARDUINO` and `SERVER` are bound to external actions. What those actions
//! do (talk to a microcontroller over serial, rewrite a local config, ...) is
//! outside this crate; the processor only needs to hand them the client
//! stream and learn whether they succeeded.
//!
//! ## Bindings
//!
//! ```text
//! ARDUINO   ──> Arc<dyn ActionHandler>   (default: ArduinoRelay)
//! SERVER    ──> Arc<dyn ActionHandler>   (default: ServerReconfigure)
//! SHUTDOWN  ──> none, handled by the processor
//! UNKNOWN   ──> none
//! ```

use crate::protocol::Command;
use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::info;

/// Errors an action handler can report.
#[derive(Debug, Error)]
pub enum ActionError {
    /// I/O error while talking to the client or the device
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The action ran but could not complete
    #[error("{0}")]
    Failed(String),
}

/// An external action bound to a command.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Runs the action for one client. The stream is closed by the caller
    /// once this returns.
    async fn handle(&self, stream: &mut TcpStream, peer: SocketAddr) -> Result<(), ActionError>;
}

/// Default `ARDUINO` action: records the hand-off.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArduinoRelay;

#[async_trait]
impl ActionHandler for ArduinoRelay {
    async fn handle(&self, _stream: &mut TcpStream, peer: SocketAddr) -> Result<(), ActionError> {
        info!(client = %peer, "Arduino action requested");
        Ok(())
    }
}

/// Default `SERVER` action: records the configuration request.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServerReconfigure;

#[async_trait]
impl ActionHandler for ServerReconfigure {
    async fn handle(&self, _stream: &mut TcpStream, peer: SocketAddr) -> Result<(), ActionError> {
        info!(client = %peer, "Server configuration requested");
        Ok(())
    }
}

/// Binds commands to their action handlers.
#[derive(Clone)]
pub struct ActionTable {
    arduino: Arc<dyn ActionHandler>,
    server: Arc<dyn ActionHandler>,
}

impl ActionTable {
    pub fn new(arduino: Arc<dyn ActionHandler>, server: Arc<dyn ActionHandler>) -> Self {
        Self { arduino, server }
    }

    pub fn with_arduino(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        self.arduino = handler;
        self
    }

    pub fn with_server(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        self.server = handler;
        self
    }

    /// The handler bound to `command`, if it has one.
    pub fn handler_for(&self, command: Command) -> Option<&Arc<dyn ActionHandler>> {
        match command {
            Command::Arduino => Some(&self.arduino),
            Command::Server => Some(&self.server),
            Command::Shutdown | Command::Unknown => None,
        }
    }
}

impl Default for ActionTable {
    fn default() -> Self {
        Self::new(Arc::new(ArduinoRelay), Arc::new(ServerReconfigure))
    }
}

impl fmt::Debug for ActionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTable").finish_non_exhaustive()
    }
}
