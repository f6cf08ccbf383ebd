//! Caos CLI: chaos and fuzz runs against a live web page
//!
//! ## Usage
//!
//! ```bash
//! caos run --url http://localhost:3000/ --seed 12345 --actions 50
//! caos run --url http://localhost:3000/ --mode demon --duration-ms 60000
//! caos batch --plan chaos.yaml
//! caos payloads --category xss
//! ```

use caos_cli::{ChaosRunner, Cli, CliConfig, CliResult, ColorChoice, Commands, Verbosity};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(config.verbosity);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: CliConfig) -> CliResult<()> {
    let runner = ChaosRunner::new(config);
    match cli.command {
        Commands::Run(args) => runner.run(&args).await,
        Commands::Batch(args) => runner.batch(&args).await,
        Commands::Payloads(args) => runner.payloads(&args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.into();
    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

/// `RUST_LOG` wins over the `-v` count
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
