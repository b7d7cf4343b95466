//! Event relay binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────┐
//!                       │                  EVENT RELAY                  │
//!   GET /events         │  ┌──────────┐   ┌───────────┐   ┌──────────┐  │
//!   Authorization ──────┼─▶│ request  │──▶│ connector │──▶│ upstream │──┼──▶ Event
//!                       │  │validator │   │           │   │ session  │  │    service
//!                       │  └──────────┘   └───────────┘   └────┬─────┘  │
//!                       │                                      │        │
//!   text/event-stream   │  ┌──────────┐   ┌───────────┐        │        │
//!   ◀───────────────────┼──│ response │◀──│   pump    │◀───────┘        │
//!                       │  │ builder  │   │(1 chunk)  │                 │
//!                       │  └──────────┘   └───────────┘                 │
//!                       │                                               │
//!                       │  config · observability · lifecycle           │
//!                       └───────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use event_relay::config::{load_config, ConfigOverrides};
use event_relay::lifecycle::{signals, startup, Shutdown};
use event_relay::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "event-relay", version)]
#[command(about = "Authenticated live-event relay", long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Base address of the upstream event service.
    #[arg(long, env = "RELAY_UPSTREAM_URL")]
    upstream_url: Option<String>,

    /// Address to listen on.
    #[arg(long, env = "RELAY_BIND_ADDRESS")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        upstream_url: cli.upstream_url,
        bind_address: cli.bind,
    };
    let config = load_config(cli.config.as_deref(), &overrides)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "event-relay starting");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::wait_for_signal(shutdown.clone()));

    startup::run(config, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
