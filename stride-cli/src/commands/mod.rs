//! CLI Commands Module
//!
//! Command definitions for the Stride CLI.

pub mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Stride reward engine CLI
#[derive(Parser, Debug)]
#[command(name = "stride")]
#[command(version)]
#[command(about = "Stride reward engine command line interface")]
#[command(long_about = "Operator tooling for the Stride reward engine.\n\n\
    Inspect the tier schedule, price accruals, check activity samples against \
    the plausibility limits and replay scenarios through an in-memory engine.")]
pub struct Cli {
    /// Output format (json, table)
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Table format (human-readable)
    #[default]
    Table,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the tier schedule and multipliers
    Phases,

    /// Price a step count at a tier
    Quote {
        /// Steps to convert
        #[arg(short, long)]
        steps: u64,

        /// Tier the steps are priced at (1-9)
        #[arg(short, long, default_value = "1")]
        tier: u8,
    },

    /// Run one activity sample through the validator
    Validate {
        /// Steps in the sample
        #[arg(short, long)]
        steps: u64,

        /// Sample window in seconds
        #[arg(short, long, default_value = "3600")]
        window_seconds: u64,

        /// Reported speed in km/h
        #[arg(long, default_value = "5.0")]
        speed: f64,

        /// GPS accuracy in meters, if known
        #[arg(long)]
        gps: Option<f64>,

        /// Steps already accrued today
        #[arg(long, default_value = "0")]
        steps_today: u64,
    },

    /// Replay a JSON scenario through an in-memory engine
    Simulate {
        /// Scenario file path
        #[arg(short = 'F', long)]
        file: PathBuf,
    },

    /// Show or check the effective engine configuration
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_help() {
        // --help surfaces as an error from try_parse
        let result = Cli::try_parse_from(["stride", "--help"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
    }

    #[test]
    fn test_parse_quote() {
        let cli =
            Cli::try_parse_from(["stride", "quote", "--steps", "1000", "--tier", "3"]).unwrap();
        match cli.command {
            Commands::Quote { steps, tier } => {
                assert_eq!(steps, 1000);
                assert_eq!(tier, 3);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_validate_defaults() {
        let cli =
            Cli::try_parse_from(["stride", "-f", "json", "validate", "--steps", "500"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Validate {
                window_seconds,
                gps,
                steps_today,
                ..
            } => {
                assert_eq!(window_seconds, 3600);
                assert!(gps.is_none());
                assert_eq!(steps_today, 0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
