#![deny(unsafe_code)]

// Use mimalloc for reduced allocation latency (enabled by default).
#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;
mod config;
mod seed;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
#[cfg(feature = "tokio-console")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{check_config, serve};
use crate::config::AppConfig;

/// Stand-alone WebDAV server for Lyra document spaces
#[derive(Parser)]
#[command(name = "lyra-dav")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Serve with the default config file
    lyra-dav serve

    # Serve on all interfaces, keeping content on disk
    lyra-dav --config ./lyra.toml serve --bind 0.0.0.0 --port 8080 --data-dir ./blobs

    # Validate a config file
    lyra-dav check-config ./lyra.toml
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, env = "LYRA_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the WebDAV server until interrupted
    Serve(serve::Args),

    /// Validate a configuration file and print a summary
    CheckConfig(check_config::Args),
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let args: Vec<String> = std::env::args().collect();
            let is_quiet = args.iter().any(|a| a == "-q" || a == "--quiet");

            if !is_quiet {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    match &cli.command {
        Commands::Serve(args) => {
            let config = AppConfig::load(cli.config.as_deref())?;
            serve::execute(args, config)
        }
        Commands::CheckConfig(args) => check_config::execute(args, cli.config.as_deref()),
    }
}

fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    #[cfg(feature = "tokio-console")]
    {
        use std::net::SocketAddr;
        use tracing_subscriber::Layer;

        let console_port: u16 = std::env::var("TOKIO_CONSOLE_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(6669);

        let console_addr: SocketAddr = ([127, 0, 0, 1], console_port).into();
        let port_available = std::net::TcpListener::bind(console_addr).is_ok();

        let fmt_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

        if port_available {
            let console_layer = console_subscriber::ConsoleLayer::builder()
                .server_addr(console_addr)
                .spawn();
            tracing_subscriber::registry()
                .with(console_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(io::stderr)
                        .with_filter(fmt_filter),
                )
                .init();
            tracing::info!(
                "tokio-console enabled, connect with: tokio-console http://127.0.0.1:{}",
                console_port
            );
        } else {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(io::stderr)
                        .with_filter(fmt_filter),
                )
                .init();
            tracing::warn!(
                "tokio-console port {} already in use, running without console instrumentation.",
                console_port
            );
        }
    }

    #[cfg(not(feature = "tokio-console"))]
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}
