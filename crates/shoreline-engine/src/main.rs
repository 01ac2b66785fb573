//! # Shoreline
//!
//! Headless host for the shoreline texture pipeline.
//!
//! Loads the configuration, bakes the height field, runs the particle
//! simulation and presentation for a fixed number of frames, and checks the
//! GPU results against the CPU reference along the way.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;
mod config;
mod snapshot;
mod timing;
mod verify;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::EngineConfig;

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("shoreline=info".parse()?))
        .init();

    info!("Shoreline starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args_os().skip(1);
    let config = match args.next() {
        // `--write-config [path]` writes the defaults for editing
        Some(flag) if flag == "--write-config" => {
            let path = args.next().unwrap_or_else(|| config::CONFIG_FILE.into());
            EngineConfig::default().save_to(path)?;
            return Ok(());
        },
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    };

    app::run(config)?;

    info!("Shoreline shutdown complete");
    Ok(())
}
