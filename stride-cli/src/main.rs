//! Stride CLI Entry Point
//!
//! Configuration is loaded from environment variables (via .env file).
//!
//! Usage:
//!   stride phases      - Show the tier schedule
//!   stride quote       - Price a step count at a tier
//!   stride validate    - Run one sample through the activity validator
//!   stride simulate    - Replay a JSON scenario through an in-memory engine
//!   stride config      - Show or check the effective engine configuration

use clap::Parser;
use stride_cli::{handler, Cli};
use stride_engine::{init_logging, LogConfig, LogLevel};

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.verbose {
        let config = LogConfig::from_env().with_level(LogLevel::Debug);
        if let Err(e) = init_logging(&config) {
            eprintln!("Warning: logging unavailable: {}", e);
        }
    }

    if let Err(e) = handler::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
