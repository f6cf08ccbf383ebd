//! Output formatting and progress reporting

use caos::{ActionRecord, RunResult};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};

/// Progress reporter for chaos runs
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar for a count-bounded run
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Per-action callback advancing the bar, if one is running
    #[must_use]
    pub fn action_callback(&self) -> Option<impl Fn(&ActionRecord) + Send + Sync + 'static> {
        let pb = self.progress_bar.clone()?;
        Some(move |record: &ActionRecord| {
            pb.set_message(record.kind.to_string());
            pb.inc(1);
        })
    }

    /// Finish progress bar
    pub fn finish(&mut self) {
        if let Some(pb) = self.progress_bar.take() {
            pb.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Failures print even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print the one-line verdict for a finished run
    pub fn run_summary(&self, name: &str, result: &RunResult) {
        let line = summary_line(name, result);
        if result.passed() {
            self.success(&line);
        } else {
            self.failure(&line);
        }
    }
}

/// `name: N actions, E errors, R recoveries in 1.23s (state)`
#[must_use]
pub fn summary_line(name: &str, result: &RunResult) -> String {
    let state = match result.status {
        caos::RunStatus::Completed => "completed".to_string(),
        caos::RunStatus::Aborted { ref reason } => format!("aborted: {reason}"),
    };
    format!(
        "{name}: {} actions, {} errors, {} recoveries in {:.2}s ({state})",
        result.actions_performed,
        result.errors.len(),
        result.recoveries,
        result.duration.as_secs_f64(),
    )
}
