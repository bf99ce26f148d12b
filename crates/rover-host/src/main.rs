//! Rover host: entry point.
//!
//! Listens for the device bridge, accepts a single connection, and runs
//! three threads until a shutdown signal arrives or the device disconnects:
//!
//! ```text
//! socket ─► rover-inbound ─► inbound queue ─► rover-controller
//!                                                   │
//! socket ◄─ rover-outbound ◄─ outbound queue ◄──────┘
//! ```
//!
//! # Usage
//!
//! ```text
//! rover-host [OPTIONS]
//!
//! Options:
//!   --config    <PATH>   Config file [default: platform config dir]
//!   --bind      <ADDR>   Listen address, overrides link.bind_address
//!   --port      <PORT>   Listen port, overrides link.port
//!   --log-level <LEVEL>  Log filter, overrides logging.level
//! ```
//!
//! `RUST_LOG` takes precedence over both `--log-level` and the config file.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rover_core::PoolQueue;
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rover_host::application::session::HostSession;
use rover_host::infrastructure::storage::config::{
    load_config, load_config_from, ConfigError, HostConfig,
};
use rover_host::infrastructure::transport::DeviceListener;

/// How often the main thread checks for shutdown.
const SUPERVISE_INTERVAL: Duration = Duration::from_millis(100);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Host side of the rover sensor/command link.
#[derive(Debug, Parser)]
#[command(
    name = "rover-host",
    about = "Parses rover sensor frames and sends back actuator commands",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    ///
    /// When omitted, the platform config directory is used; a missing file
    /// means built-in defaults.
    #[arg(long, env = "ROVER_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to listen on.
    #[arg(long, env = "ROVER_BIND")]
    bind: Option<String>,

    /// TCP port the device bridge connects to.
    #[arg(long, env = "ROVER_PORT")]
    port: Option<u16>,

    /// `tracing` filter used when `RUST_LOG` is unset.
    #[arg(long, env = "ROVER_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// merged config fails validation.
    fn into_host_config(self) -> anyhow::Result<HostConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => match load_config() {
                Ok(config) => config,
                Err(ConfigError::NoPlatformConfigDir) => HostConfig::default(),
                Err(e) => return Err(e).context("failed to load config"),
            },
        };

        if let Some(bind) = self.bind {
            config.link.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.link.port = port;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_host_config()?;

    // `RUST_LOG` wins; otherwise use the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    run(&config)
}

fn run(config: &HostConfig) -> anyhow::Result<()> {
    // ── Signal handling ───────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .with_context(|| format!("failed to register handler for signal {signal}"))?;
    }

    // ── Device link ───────────────────────────────────────────────────────────
    let listener = DeviceListener::bind(config.link.socket_addr()?)?;
    info!(
        "rover host listening on {} (checksum: {:?})",
        listener.local_addr()?,
        config.checksum()
    );

    let Some(link) = listener.accept_until(&shutdown, SUPERVISE_INTERVAL)? else {
        info!("shutdown requested before a device connected");
        return Ok(());
    };
    let halves = link.into_halves()?;

    // ── Queues and workers ────────────────────────────────────────────────────
    let inbound = Arc::new(PoolQueue::with_policy(
        "inbound",
        config.queues.inbound_max,
        config.queues.inbound_policy(),
    ));
    let outbound = Arc::new(PoolQueue::with_policy(
        "outbound",
        config.queues.outbound_max,
        config.queues.outbound_policy(),
    ));
    let session = HostSession::start(
        halves.reader,
        halves.writer,
        &config.protocol,
        inbound,
        outbound,
    )
    .context("failed to spawn workers")?;

    info!("rover host ready.  Press Ctrl-C to exit.");

    // ── Supervise ─────────────────────────────────────────────────────────────
    while !shutdown.load(Ordering::Relaxed) && !session.is_device_closed() {
        thread::sleep(SUPERVISE_INTERVAL);
    }
    if shutdown.load(Ordering::Relaxed) {
        info!("shutdown signal received");
    } else {
        warn!("device link closed");
    }

    let summary = session.stop(|| halves.shutdown.shutdown())?;
    info!(
        received = summary.inbound.delivered,
        sent = summary.outbound.sent,
        "rover host stopped"
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
