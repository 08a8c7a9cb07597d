//! `lyra-dav serve`: run the WebDAV server until Ctrl-C.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use lyra_store::{ByteStore, Catalog, FsByteStore, MembershipPolicy, MemoryByteStore};
use lyra_webdav::{DavHandler, DavServer};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::seed::seed;

#[derive(ClapArgs)]
pub struct Args {
    /// Port to listen on (0 picks a free port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<IpAddr>,

    /// Keep file content under this directory instead of in memory
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

pub fn execute(args: &Args, mut config: AppConfig) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = Some(dir.clone());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(serve(config))
}

async fn serve(config: AppConfig) -> Result<()> {
    let seeded = seed(&config)?;
    if seeded.directory.is_empty() {
        warn!("No users configured, every request except OPTIONS will be rejected");
    }

    let bytes: Arc<dyn ByteStore> = match &config.storage.data_dir {
        Some(dir) => Arc::new(
            FsByteStore::open(dir)
                .await
                .with_context(|| format!("Failed to open data directory: {}", dir.display()))?,
        ),
        None => {
            info!("No data directory configured, content is kept in memory");
            Arc::new(MemoryByteStore::new())
        }
    };

    let catalog: Arc<dyn Catalog> = seeded.catalog;
    let handler = DavHandler::builder(
        catalog.clone(),
        bytes,
        seeded.directory,
        Arc::new(MembershipPolicy::new(catalog)),
    )
    .config(config.dav.clone())
    .build_handler();

    let server = DavServer::start(handler.clone(), config.server_config())
        .await
        .context("Failed to start WebDAV server")?;
    println!("Serving WebDAV at {}{}", server.url(), handler.config().prefix);
    println!("Press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");
    server.stop().await;

    let stats = handler.stats().snapshot();
    let locks = handler.locks().statistics();
    info!(
        requests = stats.requests,
        errors = stats.errors,
        bytes_read = stats.bytes_read,
        bytes_written = stats.bytes_written,
        lock_conflicts = stats.lock_conflicts,
        dropped_locks = locks.total,
        "Server statistics"
    );
    Ok(())
}
