//! Command Protocol
//!
//! The wire protocol is a single short token sent by the client right after
//! connecting. There is no reply; outcomes are visible only in the log files.
//!
//! ## Modules
//!
//! - `types`: the `Command` vocabulary and its classification
//! - `parser`: frame reading and token decoding
//!
//! ## Example
//!
//! ```
//! use cmdrelay::protocol::{decode_token, Command};
//!
//! let token = decode_token(b"arduino\0\0\0");
//! assert_eq!(Command::classify(&token), Command::Arduino);
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{decode_token, frame_complete, FrameError, FrameReader, FRAME_LEN};
pub use types::{Command, ReceivedCommand};
