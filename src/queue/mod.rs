//! Bounded Hand-off Queue
//!
//! The queue carries accepted connections from the acceptor to the
//! processors. It is the only backpressure mechanism in the server: when it
//! is full the acceptor stops taking new connections until a slot frees.
//!
//! ```text
//!  Acceptor ──enqueue──> ┌───┬───┬───┬───┬───┐ ──dequeue──> Processor(s)
//!                        │ 1 │ 2 │ 3 │   │   │
//!                        └───┴───┴───┴───┴───┘
//!                         head          tail
//! ```

pub mod bounded;

pub use bounded::{JobQueue, QueueError};
