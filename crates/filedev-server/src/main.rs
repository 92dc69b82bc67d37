//! filedev file server entry point.
//!
//! Loads the TOML config, applies command-line overrides, binds the listener
//! and serves until Ctrl-C.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use filedev_core::DiskDevice;
use filedev_server::infrastructure::storage::{load_config, save_config};
use filedev_server::FileServer;

#[derive(Debug, Parser)]
#[command(name = "filedev-server", version, about = "Serve a directory over the filedev protocol")]
struct Args {
    /// Config file; defaults to the platform config location.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Directory to serve (overrides `server.root`).
    #[arg(long)]
    root: Option<PathBuf>,

    /// Address to bind (overrides `server.bind_address`).
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides `server.port`).
    #[arg(long, short)]
    port: Option<u16>,

    /// Write the effective config to this path and exit.
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("loading config")?;
    if let Some(root) = args.root {
        config.server.root = root;
    }
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if let Some(path) = &args.write_config {
        save_config(path, &config).with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    // Initialise structured logging.
    let level = config.server.log_level.clone();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    info!("filedev server starting");

    let root = &config.server.root;
    anyhow::ensure!(root.is_dir(), "root {} is not a directory", root.display());
    let device = DiskDevice::new(root);

    let addr = config.server.listen_addr()?;
    let server = FileServer::bind(addr, device).await?;

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    server
        .run(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => {
                    warn!("cannot listen for Ctrl-C: {e}");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;

    Ok(())
}
