//! Shutdown Coordinator
//!
//! A one-way, process-wide stop signal. It is created by the driver and a
//! clone is handed to every long-running component at construction. The
//! processor raises it when a client sends `SHUTDOWN`; the acceptor, the
//! processors and the driver observe it cooperatively.
//!
//! Internally this is a `tokio::sync::watch` channel carrying a `bool`, so
//! any number of tasks can wait on it and late subscribers still see it set.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Cloneable handle to the shared shutdown flag.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// Creates a new, unsignaled shutdown flag.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raises the signal.
    ///
    /// Returns `true` only for the call that actually flipped the flag;
    /// repeated calls are harmless no-ops that return `false`.
    pub fn signal(&self) -> bool {
        let flipped = self.tx.send_if_modified(|raised| {
            if *raised {
                false
            } else {
                *raised = true;
                true
            }
        });
        if flipped {
            debug!("Shutdown signal raised");
        }
        flipped
    }

    /// Non-blocking check of the flag.
    pub fn is_signaled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal has been raised (immediately if it already was).
    ///
    /// Cancel-safe, so it can sit in a `tokio::select!` next to blocking work.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|raised| *raised).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_starts_unsignaled() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_signaled());
    }

    #[test]
    fn test_signal_is_idempotent() {
        let signal = ShutdownSignal::new();
        assert!(signal.signal());
        assert!(!signal.signal());
        assert!(!signal.signal());
        assert!(signal.is_signaled());
    }

    #[test]
    fn test_clones_share_state() {
        let signal = ShutdownSignal::new();
        let observer = signal.clone();

        signal.signal();
        assert!(observer.is_signaled());
    }

    #[test]
    fn test_wait_wakes_on_signal() {
        let signal = ShutdownSignal::new();
        let mut waiting = task::spawn(signal.wait());
        assert_pending!(waiting.poll());

        signal.signal();
        assert!(waiting.is_woken());
        assert_ready!(waiting.poll());
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_already_signaled() {
        let signal = ShutdownSignal::new();
        signal.signal();

        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("wait should not block once signaled");
    }

    #[tokio::test]
    async fn test_signal_from_another_task() {
        let signal = ShutdownSignal::new();
        let remote = signal.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            remote.signal();
        });

        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("signal never observed");
    }
}
