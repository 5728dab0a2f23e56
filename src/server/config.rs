//! Server configuration and command-line parsing.

use crate::{
    DEFAULT_BACKLOG, DEFAULT_CONNECTION_LOG, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_PROCESS_LOG,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_READ_TIMEOUT_MS, DEFAULT_WORKERS,
};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors found while parsing or validating the configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid value for {flag}: {value:?}")]
    InvalidValue { flag: String, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),

    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("at least one processor worker is required")]
    ZeroWorkers,
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    Run(ServerConfig),
    Help,
    Version,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Host name or address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Listen backlog for pending connections
    pub backlog: u32,
    /// Capacity of the hand-off queue
    pub queue_capacity: usize,
    /// Number of processors competing on the queue
    pub workers: usize,
    /// Limit for reading one command frame; `None` waits forever
    pub read_timeout: Option<Duration>,
    /// Connection log path
    pub connection_log: PathBuf,
    /// Processing log path
    pub process_log: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            workers: DEFAULT_WORKERS,
            read_timeout: Some(Duration::from_millis(DEFAULT_READ_TIMEOUT_MS)),
            connection_log: PathBuf::from(DEFAULT_CONNECTION_LOG),
            process_log: PathBuf::from(DEFAULT_PROCESS_LOG),
        }
    }
}

impl ServerConfig {
    /// Parses command-line arguments (without the program name).
    pub fn from_args<I>(args: I) -> Result<CliAction, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = ServerConfig::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let mut value = || args.next().ok_or_else(|| ConfigError::MissingValue(arg.clone()));

            match arg.as_str() {
                "--host" | "-h" => config.host = value()?,
                "--port" | "-p" => config.port = parse_value(&arg, value()?)?,
                "--backlog" => config.backlog = parse_value(&arg, value()?)?,
                "--queue-capacity" | "-q" => config.queue_capacity = parse_value(&arg, value()?)?,
                "--workers" | "-w" => config.workers = parse_value(&arg, value()?)?,
                "--read-timeout-ms" | "-t" => {
                    let millis: u64 = parse_value(&arg, value()?)?;
                    config.read_timeout = (millis > 0).then(|| Duration::from_millis(millis));
                }
                "--connection-log" => config.connection_log = PathBuf::from(value()?),
                "--process-log" => config.process_log = PathBuf::from(value()?),
                "--help" => return Ok(CliAction::Help),
                "--version" | "-v" => return Ok(CliAction::Version),
                _ => return Err(ConfigError::UnknownArgument(arg.clone())),
            }
        }

        config.validate()?;
        Ok(CliAction::Run(config))
    }

    /// Checks the values that would make the server unable to run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value,
    })
}

/// Usage text for `--help`.
pub const HELP: &str = r#"
cmdrelay - TCP command relay for embedded control

USAGE:
    cmdrelay [OPTIONS]

OPTIONS:
    -h, --host <HOST>              Host to bind to (default: 0.0.0.0)
    -p, --port <PORT>              Port to listen on (default: 44444)
        --backlog <N>              Listen backlog (default: 5)
    -q, --queue-capacity <N>       Pending connection queue size (default: 10)
    -w, --workers <N>              Command processors (default: 1)
    -t, --read-timeout-ms <MS>     Command read timeout, 0 disables (default: 5000)
        --connection-log <PATH>    Connection log (default: ServerLog.txt)
        --process-log <PATH>       Processing log (default: ProcessLog.txt)
    -v, --version                  Print version information
        --help                     Print this help message

COMMANDS:
    Send one token right after connecting (case-insensitive):
    ARDUINO     forward to the attached microcontroller
    SERVER      run the server configuration action
    SHUTDOWN    stop the server

    $ printf 'ARDUINO\0\0\0' | nc 127.0.0.1 44444
"#;
