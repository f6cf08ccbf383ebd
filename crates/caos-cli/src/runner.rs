//! Command execution: single runs, batch plans and corpus listing

use crate::commands::{BatchArgs, PayloadsArgs, RunArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use caos::{
    format_batch_summary, format_defect_report, Budget, BrowserConfig, Mode, PayloadCategory,
    RunConfig, RunPlan, RunResult, DEFAULT_TRAILING_ACTIONS,
};
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

/// Executes CLI commands against a Chromium page
#[derive(Debug)]
pub struct ChaosRunner {
    config: CliConfig,
}

impl ChaosRunner {
    /// Create a runner for the given CLI configuration
    #[must_use]
    pub const fn new(config: CliConfig) -> Self {
        Self { config }
    }

    fn reporter(&self, quiet: bool) -> ProgressReporter {
        ProgressReporter::new(
            self.config.color.should_color(),
            quiet || self.config.verbosity.is_quiet(),
        )
    }

    /// `caos run`: one session, defect report on findings
    pub async fn run(&self, args: &RunArgs) -> CliResult<()> {
        let mode = Mode::from(args.mode);
        let mut run_config = args.overrides().apply(RunConfig::preset(mode))?;
        run_config.validate()?;

        let mut reporter = self.reporter(args.json);
        if let Budget::Actions(n) = run_config.budget {
            reporter.start_progress(u64::from(n), mode.as_str());
            if let Some(callback) = reporter.action_callback() {
                run_config = run_config.with_on_action(callback);
            }
        }

        let browser = browser_config(args.headed, args.no_sandbox);
        let outcome = drive_session(browser, mode, run_config).await;
        reporter.finish();
        let result = outcome?;

        if args.json {
            println!("{}", result.to_json()?);
        } else {
            reporter.run_summary(mode.as_str(), &result);
            if !result.passed() {
                println!("{}", format_defect_report(&result, DEFAULT_TRAILING_ACTIONS));
            }
        }
        if let Some(ref path) = args.report {
            std::fs::write(path, format_defect_report(&result, DEFAULT_TRAILING_ACTIONS))?;
            reporter.info(&format!("defect report written to {}", path.display()));
        }
        if let Some(ref path) = args.screenshot {
            save_screenshot(&reporter, &result, path)?;
        }

        if result.passed() {
            Ok(())
        } else {
            Err(CliError::Findings {
                failed: 1,
                total: 1,
            })
        }
    }

    /// `caos batch`: every run of a plan, in order, then a summary
    pub async fn batch(&self, args: &BatchArgs) -> CliResult<()> {
        let plan = RunPlan::from_path(&args.plan)?;
        let default_url = args.url.as_deref().or(plan.url.as_deref());

        // Resolve everything up front so a bad entry fails before any browser work.
        let mut resolved = Vec::with_capacity(plan.runs.len());
        for planned in &plan.runs {
            let config = planned.resolve(default_url).map_err(|e| {
                CliError::config(format!("run '{}': {e}", planned.name))
            })?;
            resolved.push((planned.name.clone(), planned.mode, config));
        }

        let reporter = self.reporter(false);
        if args.dry_run {
            for (name, mode, config) in &resolved {
                reporter.info(&format!(
                    "{name}: {mode} seed {} for {} at {}",
                    config.seed,
                    config.budget,
                    config.target_url.as_deref().unwrap_or("<current page>")
                ));
            }
            reporter.success(&format!("plan ok: {} run(s)", resolved.len()));
            return Ok(());
        }

        let browser = browser_config(args.headed, args.no_sandbox);
        let mut results: Vec<(String, RunResult)> = Vec::with_capacity(resolved.len());
        for (name, mode, config) in resolved {
            info!(run = %name, %mode, seed = %config.seed, "starting planned run");
            let result = drive_session(browser.clone(), mode, config).await?;
            reporter.run_summary(&name, &result);
            results.push((name, result));
        }

        println!("{}", format_batch_summary(&results));

        if let Some(ref dir) = args.report_dir {
            std::fs::create_dir_all(dir)?;
            for (name, result) in results.iter().filter(|(_, r)| !r.passed()) {
                let path = dir.join(format!("{name}.txt"));
                std::fs::write(&path, format_defect_report(result, DEFAULT_TRAILING_ACTIONS))?;
            }
        }

        let failed = results.iter().filter(|(_, r)| !r.passed()).count();
        if failed == 0 {
            Ok(())
        } else {
            Err(CliError::Findings {
                failed,
                total: results.len(),
            })
        }
    }

    /// `caos payloads`: print the corpus
    pub fn payloads(&self, args: &PayloadsArgs) -> CliResult<()> {
        let categories: Vec<PayloadCategory> = match args.category {
            Some(category) => vec![category],
            None => PayloadCategory::ALL.to_vec(),
        };
        if args.json {
            let listing: serde_json::Map<String, serde_json::Value> = categories
                .iter()
                .map(|c| (c.as_str().to_string(), serde_json::json!(c.payloads())))
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        } else {
            print!("{}", render_payloads(&categories));
        }
        Ok(())
    }
}

fn browser_config(headed: bool, no_sandbox: bool) -> BrowserConfig {
    let config = BrowserConfig::default().with_headless(!headed);
    if no_sandbox {
        config.with_no_sandbox()
    } else {
        config
    }
}

/// Text listing, one escaped payload per line under its category
#[must_use]
pub fn render_payloads(categories: &[PayloadCategory]) -> String {
    let mut out = String::new();
    let mut total = 0;
    for category in categories {
        let payloads = category.payloads();
        total += payloads.len();
        let _ = writeln!(out, "{category} ({})", payloads.len());
        for payload in payloads {
            let _ = writeln!(out, "  {}", caos::truncate(&format!("{payload:?}"), 80));
        }
    }
    let _ = writeln!(
        out,
        "{total} payloads in {} categor{}",
        categories.len(),
        if categories.len() == 1 { "y" } else { "ies" }
    );
    out
}

fn save_screenshot(reporter: &ProgressReporter, result: &RunResult, path: &Path) -> CliResult<()> {
    match result.failure_screenshot {
        Some(ref shot) => {
            std::fs::write(path, &shot.data)?;
            reporter.info(&format!("failure screenshot written to {}", path.display()));
        }
        None => reporter.warning("no failure screenshot was captured"),
    }
    Ok(())
}

#[cfg(feature = "browser")]
async fn drive_session(
    browser_config: BrowserConfig,
    mode: Mode,
    config: RunConfig,
) -> CliResult<RunResult> {
    let browser = caos::ChromiumBrowser::launch(browser_config).await?;
    let outcome = match browser.new_page().await {
        Ok(mut page) => caos::run(&mut page, mode, config).await,
        Err(e) => Err(e),
    };
    if let Err(e) = browser.close().await {
        warn!(error = %e, "browser did not close cleanly");
    }
    outcome.map_err(CliError::from)
}

#[cfg(not(feature = "browser"))]
async fn drive_session(
    _browser_config: BrowserConfig,
    _mode: Mode,
    _config: RunConfig,
) -> CliResult<RunResult> {
    warn!("built without a browser backend");
    Err(CliError::BrowserUnavailable)
}
