//! `filedev-fetch`: copy one file out of a filedev server.
//!
//! # Flow
//!
//! ```text
//! main()
//!  └─ RemoteDevice::from_config()  -- one TCP session
//!  └─ DeviceChain [tcp, disk?]     -- remote first, optional local fallback
//!  └─ chain.open(PATH, read)
//!  └─ copy_to(stdout | --output)   -- 64 KiB chunks
//!  └─ RemoteDevice::disconnect()
//! ```
//!
//! If the server cannot be reached and `--fallback-dir` is given, the file is
//! served from disk alone.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use filedev_core::{DeviceChain, DiskDevice, FileDevice, Mode};
use filedev_remote::{copy_to, RemoteConfig, RemoteDevice, DEFAULT_CHUNK, DEFAULT_PORT};

#[derive(Debug, Parser)]
#[command(name = "filedev-fetch", version, about = "Copy a file out of a filedev server")]
struct Args {
    /// Server host name or address.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Write to this file instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Local directory tried when the server does not have the file.
    #[arg(long)]
    fallback_dir: Option<PathBuf>,

    /// Path of the file on the server.
    path: String,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never mix with file contents on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = RemoteConfig {
        host: args.host.clone(),
        port: args.port,
    };

    // ── Devices ───────────────────────────────────────────────────────────────
    let mut chain = DeviceChain::new();
    let remote = match RemoteDevice::from_config(&config) {
        Ok(device) => {
            let device = Arc::new(device);
            chain.push(Arc::clone(&device) as Arc<dyn FileDevice>);
            Some(device)
        }
        Err(e) if args.fallback_dir.is_some() => {
            warn!("{e}; using local fallback only");
            None
        }
        Err(e) => return Err(e.into()),
    };
    if let Some(dir) = &args.fallback_dir {
        chain.push(Arc::new(DiskDevice::new(dir)));
    }

    // ── Copy ──────────────────────────────────────────────────────────────────
    let Some((device, mut file)) = chain.open(&args.path, Mode::read()) else {
        bail!("{}: not found on any device {:?}", args.path, chain);
    };
    info!(device, path = %args.path, "copying");

    let copied = match &args.output {
        Some(out) => {
            let sink = File::create(out).with_context(|| format!("creating {}", out.display()))?;
            copy_to(file.as_mut(), &mut BufWriter::new(sink), DEFAULT_CHUNK)?
        }
        None => copy_to(file.as_mut(), &mut io::stdout().lock(), DEFAULT_CHUNK)?,
    };
    file.close();
    info!(bytes = copied, "done");

    // ── Shutdown ──────────────────────────────────────────────────────────────
    if let Some(remote) = remote {
        remote.disconnect()?;
    }
    Ok(())
}
