//! Server Driver
//!
//! Wires the pipeline together and owns its lifecycle.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   enqueue   ┌──────────────┐   dequeue   ┌──────────────┐
//! │   Acceptor   │────────────>│   JobQueue   │────────────>│ Processor(s) │
//! │ (TcpListener)│             │  (bounded)   │             │              │
//! └──────┬───────┘             └──────────────┘             └──────┬───────┘
//!        │ connection log                           processing log │
//!        ▼                                                         ▼
//!  ServerLog.txt                                            ProcessLog.txt
//!
//!                   ShutdownSignal <── raised on SHUTDOWN (or Ctrl+C)
//!                         │
//!                         ▼
//!                   Server::run_until returns
//! ```
//!
//! ## Shutdown
//!
//! The driver waits on the shutdown signal. Once it is raised:
//!
//! 1. the acceptor stops and drops the listener, so new connections are refused
//! 2. each processor finishes the command it is dispatching, then stops; one
//!    still waiting for a client's command drops that connection unlogged
//! 3. connections still queued are closed without being dispatched
//!
//! Connections dropped in steps 2 and 3 are counted in `discarded_at_shutdown`.
//! 4. the final `SERVER SHUTDOWN` line is appended to the connection log

pub mod acceptor;
pub mod config;
pub mod connection;
pub mod error;
pub mod processor;
pub mod stats;

pub use acceptor::Acceptor;
pub use config::{CliAction, ConfigError, ServerConfig};
pub use connection::ConnectionHandle;
pub use error::ServerError;
pub use processor::{Flow, Processor, ProcessorState, ProcessorSummary};
pub use stats::{ServerStats, StatsSnapshot};

use crate::commands::ActionTable;
use crate::journal::{format_timestamp, now, Actor, ServerLogs};
use crate::protocol::{FrameReader, FRAME_LEN};
use crate::queue::JobQueue;
use crate::shutdown::ShutdownSignal;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{lookup_host, TcpListener, TcpSocket};
use tracing::{error, info, warn};

/// The connection-log line written just before the process exits.
pub fn shutdown_message() -> String {
    format!("==========SERVER SHUTDOWN: {}=========", format_timestamp(now()))
}

/// What happened over the server's lifetime.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub stats: StatsSnapshot,
    pub processors: Vec<ProcessorSummary>,
}

/// A bound, not yet running server.
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    logs: ServerLogs,
    queue: Arc<JobQueue<ConnectionHandle>>,
    actions: ActionTable,
    stats: Arc<ServerStats>,
    shutdown: ShutdownSignal,
}

impl Server {
    /// Binds the listening socket and opens both log files.
    ///
    /// Every error here is fatal: the server cannot start.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = listen(&config).await?;
        let logs = ServerLogs::open(&config.connection_log, &config.process_log).await?;
        let queue = Arc::new(JobQueue::new(config.queue_capacity)?);

        Ok(Self {
            config,
            listener,
            logs,
            queue,
            actions: ActionTable::default(),
            stats: Arc::new(ServerStats::new()),
            shutdown: ShutdownSignal::new(),
        })
    }

    /// Replaces the default `ARDUINO`/`SERVER` actions.
    pub fn with_actions(mut self, actions: ActionTable) -> Self {
        self.actions = actions;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// A handle to the server's shutdown flag.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    /// Serves until a client sends `SHUTDOWN`.
    pub async fn run(self) -> ShutdownReport {
        self.run_until(std::future::pending()).await
    }

    /// Serves until a client sends `SHUTDOWN` or `interrupt` completes.
    pub async fn run_until<F>(self, interrupt: F) -> ShutdownReport
    where
        F: Future<Output = ()>,
    {
        let Server {
            config,
            listener,
            logs,
            queue,
            actions,
            stats,
            shutdown,
        } = self;

        let acceptor = tokio::spawn(
            Acceptor::new(
                listener,
                Arc::clone(&queue),
                logs.connections.clone(),
                Arc::clone(&stats),
                shutdown.clone(),
            )
            .run(),
        );

        let reader = FrameReader::new(FRAME_LEN, config.read_timeout);
        let workers: Vec<_> = (1..=config.workers)
            .map(|n| {
                tokio::spawn(
                    Processor::new(
                        format!("Processor-{n}"),
                        Arc::clone(&queue),
                        reader,
                        actions.clone(),
                        logs.processing.clone(),
                        Arc::clone(&stats),
                        shutdown.clone(),
                    )
                    .run(),
                )
            })
            .collect();

        info!(
            workers = config.workers,
            queue_capacity = queue.capacity(),
            "Server running"
        );

        tokio::select! {
            _ = shutdown.wait() => info!("Shutdown requested by client"),
            _ = interrupt => {
                info!("Interrupt received, shutting down");
                shutdown.signal();
            }
        }

        if let Err(e) = acceptor.await {
            error!(error = %e, "Acceptor task failed");
        }

        let mut processors = Vec::with_capacity(workers.len());
        for worker in workers {
            match worker.await {
                Ok(summary) => processors.push(summary),
                Err(e) => error!(error = %e, "Processor task failed"),
            }
        }

        queue.close();
        let leftovers = queue.drain();
        if !leftovers.is_empty() {
            warn!(
                count = leftovers.len(),
                "Closing queued connections that were never dispatched"
            );
            stats.discarded(leftovers.len());
        }
        drop(leftovers);

        if let Err(e) = logs.connections.append(Actor::Driver, shutdown_message()).await {
            error!(error = %e, "Failed to write shutdown marker");
            stats.log_failed();
        }

        let snapshot = stats.snapshot();
        info!(
            connections = snapshot.connections_accepted,
            commands = snapshot.commands_dispatched(),
            discarded = snapshot.discarded_at_shutdown,
            "Server shutdown complete"
        );

        ShutdownReport {
            stats: snapshot,
            processors,
        }
    }
}

/// Resolves the configured host and opens the listening socket.
async fn listen(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let address = config.bind_address();
    let addr = lookup_host(&address)
        .await
        .map_err(|source| ServerError::Resolve {
            address: address.clone(),
            source,
        })?
        .next()
        .ok_or_else(|| ServerError::NoAddress(address.clone()))?;

    let bind_err = |source| ServerError::Bind {
        address: addr.to_string(),
        source,
    };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_err)?;
    socket.set_reuseaddr(true).map_err(bind_err)?;
    socket.bind(addr).map_err(bind_err)?;
    let listener = socket.listen(config.backlog).map_err(bind_err)?;

    info!(address = %addr, backlog = config.backlog, "Listening");
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{ActionError, ActionHandler};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    /// Reads the non-zero tag byte a client sends after its command frame.
    /// Frame padding the reader did not consume is skipped.
    #[derive(Default)]
    struct TagRecorder(Mutex<Vec<u8>>);

    #[async_trait]
    impl ActionHandler for TagRecorder {
        async fn handle(&self, stream: &mut TcpStream, _: SocketAddr) -> Result<(), ActionError> {
            let mut tag = 0;
            while tag == 0 {
                tag = stream.read_u8().await?;
            }
            self.0.lock().unwrap().push(tag);
            Ok(())
        }
    }

    struct TestServer {
        addr: SocketAddr,
        stats: Arc<ServerStats>,
        connection_log: PathBuf,
        process_log: PathBuf,
        task: tokio::task::JoinHandle<ShutdownReport>,
        _dir: TempDir,
    }

    impl TestServer {
        async fn start(config: ServerConfig, actions: ActionTable) -> Self {
            let dir = TempDir::new().unwrap();
            let config = ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
                connection_log: dir.path().join("ServerLog.txt"),
                process_log: dir.path().join("ProcessLog.txt"),
                ..config
            };
            let connection_log = config.connection_log.clone();
            let process_log = config.process_log.clone();

            let server = Server::bind(config).await.unwrap().with_actions(actions);
            let addr = server.local_addr().unwrap();
            let stats = server.stats();
            let task = tokio::spawn(server.run());

            Self {
                addr,
                stats,
                connection_log,
                process_log,
                task,
                _dir: dir,
            }
        }

        async fn send(&self, payload: &[u8]) -> TcpStream {
            let mut client = TcpStream::connect(self.addr).await.unwrap();
            client.write_all(payload).await.unwrap();
            client
        }

        async fn finish(self) -> (ShutdownReport, Vec<String>, Vec<String>) {
            let report = tokio::time::timeout(Duration::from_secs(5), self.task)
                .await
                .expect("server did not shut down")
                .unwrap();
            let read = |path: &PathBuf| -> Vec<String> {
                std::fs::read_to_string(path)
                    .unwrap()
                    .lines()
                    .map(str::to_string)
                    .collect()
            };
            (report, read(&self.connection_log), read(&self.process_log))
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition never became true");
    }

    #[tokio::test]
    async fn test_arduino_then_shutdown() {
        let server = TestServer::start(ServerConfig::default(), ActionTable::default()).await;

        let arduino = server.send(b"ARDUINO\0\0\0").await;
        let shutdown = server.send(b"SHUTDOWN\0\0").await;
        let (report, connections, processing) = server.finish().await;
        drop((arduino, shutdown));

        assert_eq!(report.stats.arduino_commands, 1);
        assert_eq!(report.stats.shutdown_commands, 1);
        assert_eq!(report.processors.len(), 1);
        assert_eq!(report.processors[0].processed, 2);

        assert_eq!(connections.len(), 3);
        assert!(connections[0].contains("Connection established to 127.0.0.1, port "));
        assert!(connections[1].ends_with("Placed in process queue."));
        assert!(connections[2].contains("-- ==========SERVER SHUTDOWN: "));
        assert!(connections[2].ends_with("========="));

        assert_eq!(processing.len(), 2);
        assert!(processing[0].ends_with("Processor-1 received command ARDUINO, sent to arduino."));
        assert_eq!(
            processing.iter().filter(|l| l.contains("sent to arduino")).count(),
            1
        );
        assert!(processing[1].ends_with("Processor-1 received command SHUTDOWN, began system shutdown."));
    }

    #[tokio::test]
    async fn test_unknown_command_keeps_serving() {
        let server = TestServer::start(ServerConfig::default(), ActionTable::default()).await;

        let _foobar = server.send(b"FOOBAR\0\0\0\0").await;
        let _server_cmd = server.send(b"server\n").await;
        let _shutdown = server.send(b"shutdown").await;
        let (report, _, processing) = server.finish().await;

        assert_eq!(report.stats.unknown_commands, 1);
        assert_eq!(report.stats.server_commands, 1);
        assert!(processing[0].ends_with("received command FOOBAR, unrecognized command."));
        assert!(processing[1].ends_with("received command server, ran server config."));
        assert!(processing[2].ends_with("received command shutdown, began system shutdown."));
    }

    #[tokio::test]
    async fn test_fifo_across_connections() {
        let recorder = Arc::new(TagRecorder::default());
        let server = TestServer::start(
            ServerConfig::default(),
            ActionTable::default().with_arduino(recorder.clone()),
        )
        .await;

        // Hold the single processor on a connection that has not sent yet,
        // so everything after it piles up in the queue.
        let mut blocker = TcpStream::connect(server.addr).await.unwrap();
        let mut clients = Vec::new();
        for tag in 1..=6u8 {
            let mut payload = b"ARDUINO\0\0\0".to_vec();
            payload.push(tag);
            clients.push(server.send(&payload).await);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        blocker.write_all(b"ARDUINO\0\0\0\x64").await.unwrap();

        wait_until(|| recorder.0.lock().unwrap().len() == 7).await;
        let _stop = server.send(b"SHUTDOWN\0\0").await;
        let (report, connections, _) = server.finish().await;

        assert_eq!(*recorder.0.lock().unwrap(), vec![100, 1, 2, 3, 4, 5, 6]);
        assert_eq!(report.stats.connections_accepted, 8);
        assert_eq!(connections.len(), 9);
    }

    #[tokio::test]
    async fn test_full_queue_never_drops_connections() {
        let config = ServerConfig {
            queue_capacity: 2,
            ..ServerConfig::default()
        };
        let server = TestServer::start(config, ActionTable::default()).await;

        let mut blocker = TcpStream::connect(server.addr).await.unwrap();
        let mut clients = Vec::new();
        for _ in 0..5 {
            clients.push(server.send(b"SERVER\0\0\0\0").await);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        blocker.write_all(b"SERVER\0\0\0\0").await.unwrap();

        let _stop = server.send(b"SHUTDOWN\0\0").await;
        let (report, _, processing) = server.finish().await;

        assert_eq!(report.stats.server_commands, 6);
        assert_eq!(report.stats.discarded_at_shutdown, 0);
        assert_eq!(processing.len(), 7);
    }

    /// True once the peer has closed the connection. Unread bytes on the
    /// server side may turn the close into a reset.
    async fn closed_by_server(client: &mut TcpStream) -> bool {
        let mut buf = [0u8; 16];
        match tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf)).await {
            Ok(Ok(n)) => n == 0,
            Ok(Err(_)) => true,
            Err(_) => false,
        }
    }

    #[tokio::test]
    async fn test_queued_connections_discarded_at_shutdown() {
        let server = TestServer::start(ServerConfig::default(), ActionTable::default()).await;

        let mut blocker = TcpStream::connect(server.addr).await.unwrap();
        let mut queued = Vec::new();
        for _ in 0..3 {
            queued.push(server.send(b"ARDUINO\0\0\0").await);
        }
        let stats = Arc::clone(&server.stats);
        wait_until(|| stats.snapshot().connections_accepted == 4).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        blocker.write_all(b"SHUTDOWN\0\0").await.unwrap();
        let (report, connections, processing) = server.finish().await;

        assert_eq!(report.stats.discarded_at_shutdown, 3);
        assert_eq!(report.stats.arduino_commands, 0);
        assert_eq!(report.processors[0].processed, 1);
        assert_eq!(processing.len(), 1);
        assert!(processing[0].ends_with("received command SHUTDOWN, began system shutdown."));
        assert!(!processing.iter().any(|l| l.contains("ARDUINO")));
        assert_eq!(connections.len(), 5);

        for client in &mut queued {
            assert!(closed_by_server(client).await);
        }
    }

    #[tokio::test]
    async fn test_shutdown_abandons_connection_still_reading() {
        let config = ServerConfig {
            workers: 2,
            ..ServerConfig::default()
        };
        let read_timeout = config.read_timeout.unwrap();
        let server = TestServer::start(config, ActionTable::default()).await;

        let mut silent = TcpStream::connect(server.addr).await.unwrap();
        let stats = Arc::clone(&server.stats);
        wait_until(|| stats.snapshot().connections_accepted == 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = std::time::Instant::now();
        let _stop = server.send(b"SHUTDOWN\0\0").await;
        let (report, _, processing) = server.finish().await;
        assert!(started.elapsed() < read_timeout / 2);

        assert_eq!(report.stats.discarded_at_shutdown, 1);
        assert_eq!(report.stats.unknown_commands, 0);
        let processed: u64 = report.processors.iter().map(|p| p.processed).sum();
        assert_eq!(processed, 1);
        assert_eq!(processing.len(), 1);
        assert!(processing[0].ends_with("received command SHUTDOWN, began system shutdown."));

        assert!(closed_by_server(&mut silent).await);
    }

    #[tokio::test]
    async fn test_concurrent_clients_produce_intact_lines() {
        let config = ServerConfig {
            workers: 4,
            backlog: 32,
            ..ServerConfig::default()
        };
        let server = TestServer::start(config, ActionTable::default()).await;

        let mut clients = Vec::new();
        for i in 0..20 {
            let payload: &[u8] = if i % 2 == 0 { b"SERVER\0\0\0\0" } else { b"ARDUINO\0\0\0" };
            clients.push(tokio::spawn({
                let addr = server.addr;
                async move {
                    let mut client = TcpStream::connect(addr).await.unwrap();
                    client.write_all(payload).await.unwrap();
                    client
                }
            }));
        }
        let mut streams = Vec::new();
        for client in clients {
            streams.push(client.await.unwrap());
        }

        let all_logged = {
            let process_log = server.process_log.clone();
            move || {
                std::fs::read_to_string(&process_log)
                    .map(|s| s.lines().count() == 20)
                    .unwrap_or(false)
            }
        };
        wait_until(all_logged).await;

        let _stop = server.send(b"SHUTDOWN\0\0").await;
        let (report, connections, processing) = server.finish().await;

        assert_eq!(report.processors.len(), 4);
        assert_eq!(report.stats.arduino_commands, 10);
        assert_eq!(report.stats.server_commands, 10);

        assert_eq!(connections.len(), 22);
        for line in &connections[..21] {
            assert!(line.ends_with("Placed in process queue."), "garbled: {line}");
        }
        assert_eq!(processing.len(), 21);
        for line in &processing[..20] {
            assert!(
                line.ends_with(", sent to arduino.") || line.ends_with(", ran server config."),
                "garbled: {line}"
            );
            assert_eq!(line.matches(" -- ").count(), 1);
        }
    }

    #[tokio::test]
    async fn test_interrupt_stops_server() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            connection_log: dir.path().join("ServerLog.txt"),
            process_log: dir.path().join("ProcessLog.txt"),
            ..ServerConfig::default()
        };
        let server = Server::bind(config).await.unwrap();
        assert_eq!(server.config().workers, 1);
        let signal = server.shutdown_signal();

        let report = server
            .run_until(tokio::time::sleep(Duration::from_millis(30)))
            .await;

        assert!(signal.is_signaled());
        assert_eq!(report.stats.commands_dispatched(), 0);
        let log = std::fs::read_to_string(dir.path().join("ServerLog.txt")).unwrap();
        assert!(log.contains("SERVER SHUTDOWN"));
    }

    #[tokio::test]
    async fn test_second_shutdown_is_harmless() {
        let config = ServerConfig {
            workers: 2,
            ..ServerConfig::default()
        };
        let server = TestServer::start(config, ActionTable::default()).await;

        let _a = server.send(b"SHUTDOWN\0\0").await;
        let _b = server.send(b"SHUTDOWN\0\0").await;
        let (report, connections, _) = server.finish().await;

        assert!(report.stats.shutdown_commands >= 1);
        assert_eq!(
            connections
                .iter()
                .filter(|l| l.contains("SERVER SHUTDOWN"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_bind_failures_are_fatal() {
        let dir = TempDir::new().unwrap();
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let busy = ServerConfig {
            host: "127.0.0.1".into(),
            port,
            connection_log: dir.path().join("c.txt"),
            process_log: dir.path().join("p.txt"),
            ..ServerConfig::default()
        };
        assert!(matches!(
            Server::bind(busy.clone()).await,
            Err(ServerError::Bind { .. })
        ));

        let bad_log = ServerConfig {
            port: 0,
            connection_log: dir.path().join("no-such-dir").join("c.txt"),
            ..busy.clone()
        };
        assert!(matches!(
            Server::bind(bad_log).await,
            Err(ServerError::Journal(_))
        ));

        let no_workers = ServerConfig {
            port: 0,
            workers: 0,
            ..busy
        };
        assert!(matches!(
            Server::bind(no_workers).await,
            Err(ServerError::Config(ConfigError::ZeroWorkers))
        ));
    }
}
