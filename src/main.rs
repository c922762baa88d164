//! cipherlog - encrypt/decrypt operation history
//!
//! Command-line entry point.

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cipherlog::cli::{Cli, CliHandler};
use cipherlog::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_config(cli.config.clone())?;

    // Initialize logging
    let log_level = if cli.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cipherlog={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("cipherlog v{}", cipherlog::VERSION);
    debug!(
        target_triple = env!("TARGET"),
        rustc = env!("RUSTC_VERSION"),
        built = env!("BUILD_DATE"),
        "Build info"
    );

    let mut handler = CliHandler::new(config);
    handler.handle_command(cli.command).await?;

    Ok(())
}
