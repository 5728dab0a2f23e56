//! Command Types
//!
//! The command vocabulary is closed: three known tokens plus a catch-all.
//! A `Command` is built fresh for every connection and dropped after the
//! dispatch has been logged.

use std::fmt;

/// A classified command token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Forward to the attached microcontroller
    Arduino,
    /// Run the local server configuration
    Server,
    /// Stop the whole process
    Shutdown,
    /// Anything else, including empty and oversized tokens
    Unknown,
}

impl Command {
    /// Every variant, in dispatch-table order.
    pub const ALL: [Command; 4] = [
        Command::Arduino,
        Command::Server,
        Command::Shutdown,
        Command::Unknown,
    ];

    /// Classifies a decoded token, ignoring ASCII case.
    ///
    /// Only exact matches count: `"arduino"` is [`Command::Arduino`] but
    /// `"ARDUINOX"` is [`Command::Unknown`].
    pub fn classify(token: &str) -> Self {
        match token.to_ascii_uppercase().as_str() {
            "ARDUINO" => Command::Arduino,
            "SERVER" => Command::Server,
            "SHUTDOWN" => Command::Shutdown,
            _ => Command::Unknown,
        }
    }

    /// The canonical wire name.
    pub fn name(self) -> &'static str {
        match self {
            Command::Arduino => "ARDUINO",
            Command::Server => "SERVER",
            Command::Shutdown => "SHUTDOWN",
            Command::Unknown => "UNKNOWN",
        }
    }

    /// The phrase written to the processing log after dispatch.
    pub fn action(self) -> &'static str {
        match self {
            Command::Arduino => "sent to arduino",
            Command::Server => "ran server config",
            Command::Shutdown => "began system shutdown",
            Command::Unknown => "unrecognized command",
        }
    }

    /// Whether the processor that handled this command must stop afterwards.
    pub fn stops_processor(self) -> bool {
        matches!(self, Command::Shutdown)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A command together with the token text the client actually sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedCommand {
    pub command: Command,
    pub token: String,
}

impl ReceivedCommand {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            command: Command::classify(&token),
            token,
        }
    }

    /// The command produced when nothing usable was read from the peer.
    pub fn empty() -> Self {
        Self {
            command: Command::Unknown,
            token: String::new(),
        }
    }
}
