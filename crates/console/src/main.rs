use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use repo_console::{ConsoleConfig, ConsoleServer, boot};

#[derive(Debug, Parser)]
#[command(name = "repo-console", version, about = "Package repository web console")]
struct Cli {
    /// YAML configuration file; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to serve on, overriding the configuration and CONSOLE_PORT
    #[arg(long)]
    port: Option<u16>,

    /// Increase log detail (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli).await {
        tracing::error!(error = ?err, "console failed");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ConsoleConfig::load_from_path(path)
            .with_context(|| format!("failed to load console config {:?}", path))?,
        None => ConsoleConfig::default(),
    };
    let mut config = config
        .apply_env()
        .context("invalid CONSOLE_* environment override")?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    tracing::info!(
        port = config.port,
        templates_dir = ?config.templates_dir,
        seed = ?config.seed,
        "loaded console configuration"
    );

    let state = boot::init(&config)?;
    let server = ConsoleServer::new(config.port, state);

    tokio::select! {
        result = server.serve() => {
            result?;
        }
        _ = signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    Ok(())
}
