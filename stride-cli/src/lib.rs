//! Stride CLI - Command Line Interface
//!
//! Operator tooling for the Stride reward engine. Every command runs
//! locally: there is no server to talk to.
//!
//! # Usage
//!
//! ```text
//! stride [OPTIONS] <COMMAND>
//!
//! Commands:
//!   phases    Show the tier schedule and multipliers
//!   quote     Price a step count at a tier
//!   validate  Run one activity sample through the validator
//!   simulate  Replay a JSON scenario through an in-memory engine
//!   config    Show or check the effective engine configuration
//!
//! Options:
//!   -f, --format <FORMAT>  Output format (json, table) [default: table]
//!   -v, --verbose          Enable verbose output
//! ```
//!
//! # Examples
//!
//! ```text
//! stride quote --steps 1000 --tier 3
//! stride validate --steps 9000 --speed 5.5 --gps 12
//! stride --format json simulate --file demos/scenario.json
//! ```

pub mod commands;
pub mod error;
pub mod handler;
pub mod output;
pub mod scenario;

pub use commands::{Cli, Commands, OutputFormat};
pub use error::{CliError, CliResult};
pub use scenario::{run_scenario, Scenario, ScenarioReport, ScenarioStep};

/// Stride CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
