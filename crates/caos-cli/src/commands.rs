//! CLI command definitions using clap

use caos::{Mode, MonkeyAction, PayloadCategory, RunOverrides, WeightedDemonAction};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Caos: seeded chaos monkey and adversarial fuzzer for live web UIs
#[derive(Parser, Debug)]
#[command(name = "caos")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one chaos session against a URL
    Run(RunArgs),

    /// Run every session of a YAML plan and print a batch summary
    Batch(BatchArgs),

    /// List the adversarial payload corpus
    Payloads(PayloadsArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Page to open before the first action
    #[arg(long)]
    pub url: String,

    /// Benign roaming or adversarial fuzzing
    #[arg(short, long, default_value = "monkey")]
    pub mode: ModeArg,

    /// Seed for every random choice of the run
    #[arg(short, long, default_value = "0")]
    pub seed: u32,

    /// Stop after this many actions (default 100)
    #[arg(short = 'n', long, conflicts_with = "duration_ms")]
    pub actions: Option<u32>,

    /// Stop after this many milliseconds
    #[arg(long)]
    pub duration_ms: Option<u64>,

    /// Extra CSS selectors or label substrings to never touch
    #[arg(short = 'x', long = "exclude")]
    pub exclude: Vec<String>,

    /// Restrict the benign catalog (repeatable)
    #[arg(long = "monkey-action")]
    pub monkey_actions: Vec<MonkeyAction>,

    /// Restrict the adversarial catalog, as kind or kind:weight (repeatable)
    #[arg(long = "demon-action")]
    pub demon_actions: Vec<WeightedDemonAction>,

    /// Page-error patterns (regex) to ignore
    #[arg(long = "ignore-error")]
    pub ignore_errors: Vec<String>,

    /// Keep going after a failed action (recover by reload)
    #[arg(long, overrides_with = "stop_on_error")]
    pub continue_on_error: bool,

    /// Stop at the first failed action
    #[arg(long)]
    pub stop_on_error: bool,

    /// Consecutive failed reloads before the run aborts
    #[arg(long)]
    pub max_recovery: Option<u32>,

    /// Minimum pause between actions in milliseconds
    #[arg(long)]
    pub min_delay_ms: Option<u64>,

    /// Maximum pause between actions in milliseconds
    #[arg(long)]
    pub max_delay_ms: Option<u64>,

    /// Per-action timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Timeout of the reload that recovers from a failed action, in milliseconds
    #[arg(long)]
    pub reload_timeout_ms: Option<u64>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers, CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Print the run result as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Write the defect report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write the failure screenshot (PNG) to this file
    #[arg(long)]
    pub screenshot: Option<PathBuf>,
}

impl RunArgs {
    /// Settings this invocation applies over the mode's defaults
    #[must_use]
    pub fn overrides(&self) -> RunOverrides {
        let continue_on_error = if self.stop_on_error {
            Some(false)
        } else if self.continue_on_error {
            Some(true)
        } else {
            None
        };
        RunOverrides {
            seed: Some(self.seed),
            actions: self.actions,
            duration_ms: self.duration_ms,
            exclusions: self.exclude.clone(),
            min_delay_ms: self.min_delay_ms,
            max_delay_ms: self.max_delay_ms,
            action_timeout_ms: self.timeout_ms,
            reload_timeout_ms: self.reload_timeout_ms,
            continue_on_error,
            max_recovery_attempts: self.max_recovery,
            monkey_actions: (!self.monkey_actions.is_empty()).then(|| self.monkey_actions.clone()),
            demon_actions: (!self.demon_actions.is_empty()).then(|| self.demon_actions.clone()),
            url: Some(self.url.clone()),
            ignore_errors: self.ignore_errors.clone(),
        }
    }
}

/// Arguments for the batch command
#[derive(Parser, Debug)]
pub struct BatchArgs {
    /// YAML run plan
    #[arg(short, long)]
    pub plan: PathBuf,

    /// Target for runs that name none (overrides the plan's url)
    #[arg(long)]
    pub url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers, CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Directory for one defect report per failed run
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Only load and check the plan
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the payloads command
#[derive(Parser, Debug)]
pub struct PayloadsArgs {
    /// Only list this category
    #[arg(short, long)]
    pub category: Option<PayloadCategory>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run mode argument
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModeArg {
    /// Benign roaming
    #[default]
    Monkey,
    /// Adversarial fuzzing
    Demon,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Monkey => Self::Monkey,
            ModeArg::Demon => Self::Demon,
        }
    }
}

/// Color argument
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
