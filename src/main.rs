//! cmdrelay - TCP Command Relay
//!
//! This is the main entry point for the cmdrelay server.
//! It parses the command line, sets up logging and runs the server until a
//! client sends `SHUTDOWN` or the process receives Ctrl+C.

use anyhow::Context;
use cmdrelay::journal;
use cmdrelay::server::{config::HELP, CliAction, Server, ServerConfig};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &ServerConfig) {
    println!(
        r#"
cmdrelay v{} - TCP Command Relay
──────────────────────────────────────────────────────────────
Listening on {} (queue {}, {} processor(s))
Connection log: {}
Processing log: {}

Send SHUTDOWN (or press Ctrl+C) to stop.
"#,
        cmdrelay::VERSION,
        config.bind_address(),
        config.queue_capacity,
        config.workers,
        config.connection_log.display(),
        config.process_log.display(),
    );
}

fn main() -> anyhow::Result<()> {
    let config = match ServerConfig::from_args(std::env::args().skip(1)) {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            println!("{HELP}");
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("cmdrelay version {}", cmdrelay::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("{HELP}");
            return Err(e).context("invalid command line");
        }
    };

    // Must happen while the process is still single-threaded
    journal::init_local_offset();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    runtime.block_on(serve(config))
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    print_banner(&config);

    let server = Server::bind(config)
        .await
        .context("server failed to start")?;
    info!(address = %server.local_addr()?, "Ready to accept connections");

    let interrupt = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received"),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    let report = server.run_until(interrupt).await;
    info!(
        connections = report.stats.connections_accepted,
        commands = report.stats.commands_dispatched(),
        "Server stopped"
    );
    Ok(())
}
