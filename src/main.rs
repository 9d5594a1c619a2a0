//! taskmanager - the compute-farm dispatcher coordinator binary.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use taskfarm::Config;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compute-farm task dispatcher coordinator.
#[derive(Parser, Debug)]
#[command(name = "taskmanager", version, about, long_about = None)]
struct Cli {
    /// Path to a YAML config file. If omitted, `./taskManager.yaml` is used
    /// when present, otherwise built-in defaults apply.
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the resolved configuration as YAML and exit.
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;

    if cli.print_config {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let handle = taskfarm::serve(config).await?;
    info!(addr = %handle.local_addr, "taskmanager started");

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping");
    handle.shutdown().await;

    Ok(())
}

/// Initialize the local `tracing` subscriber; `-v` raises the default
/// filter, `RUST_LOG` always takes precedence when set.
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(verbosity >= 2))
        .with(env_filter)
        .init();
}

/// Block until SIGINT, or on unix SIGTERM/SIGHUP, arrives -- all three are
/// treated as an identical graceful-stop request.
#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
        _ = sighup.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
