//! Config Commands

use clap::Subcommand;

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the configuration built from the environment
    Show,

    /// Validate the configuration built from the environment
    Check,
}
