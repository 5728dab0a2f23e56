//! Command Actions
//!
//! This module binds the dispatchable commands to the external actions the
//! processor invokes.
//!
//! ## Architecture
//!
//! ```text
//! Client token
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  FrameReader    │  (protocol module)
//! └────────┬────────┘
//!          │ Command
//!          ▼
//! ┌─────────────────┐
//! │  Processor      │  (server module)
//! └────────┬────────┘
//!          │ ARDUINO / SERVER
//!          ▼
//! ┌─────────────────┐
//! │  ActionTable    │  (this module)
//! └─────────────────┘
//! ```

pub mod handler;

pub use handler::{ActionError, ActionHandler, ActionTable, ArduinoRelay, ServerReconfigure};
