//! Caos CLI library
//!
//! Command-line front end for the caos chaos engine: argument parsing,
//! progress output and the session runner behind the `caos` binary.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod commands;
mod config;
mod error;
mod output;
mod runner;

pub use commands::{BatchArgs, Cli, ColorArg, Commands, ModeArg, PayloadsArgs, RunArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{summary_line, ProgressReporter};
pub use runner::{render_payloads, ChaosRunner};
