//! Run results and their human-readable renderings.
//!
//! A [`RunResult`] is built by the engine and handed back once; nothing
//! mutates it afterwards. The formatters here turn one failing result into a
//! defect report for an issue tracker, or many named results into a single
//! batch summary for the console.

use crate::action::{ActionKind, Mode};
use crate::config::{Budget, RunOverrides};
use crate::driver::Screenshot;
use crate::rng::Seed;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::time::Duration;

/// Trailing actions shown in a defect report
pub const DEFAULT_TRAILING_ACTIONS: usize = 10;

/// Unique errors listed per failing run in a batch summary
pub const BATCH_ERRORS_PER_RUN: usize = 3;

/// What happened to one attempted action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum ActionOutcome {
    /// Performed; human-readable description
    Performed(String),
    /// Failed; failure reason
    Failed(String),
}

/// One logged entry per attempted action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Ordinal, starting at 0
    pub index: u32,
    /// Action kind chosen
    pub kind: ActionKind,
    /// Description or failure reason
    pub outcome: ActionOutcome,
}

impl ActionRecord {
    /// Successful action
    #[must_use]
    pub fn performed(index: u32, kind: impl Into<ActionKind>, description: impl Into<String>) -> Self {
        Self {
            index,
            kind: kind.into(),
            outcome: ActionOutcome::Performed(description.into()),
        }
    }

    /// Failed action
    #[must_use]
    pub fn failed(index: u32, kind: impl Into<ActionKind>, reason: impl Into<String>) -> Self {
        Self {
            index,
            kind: kind.into(),
            outcome: ActionOutcome::Failed(reason.into()),
        }
    }

    /// Whether the action was performed
    #[must_use]
    pub const fn is_performed(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Performed(_))
    }

    /// Description or failure reason
    #[must_use]
    pub fn detail(&self) -> &str {
        match self.outcome {
            ActionOutcome::Performed(ref d) | ActionOutcome::Failed(ref d) => d,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum RunStatus {
    /// Budget used up
    Completed,
    /// Stopped early
    Aborted {
        /// Why the run stopped
        reason: String,
    },
}

impl RunStatus {
    /// Whether the run was aborted
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// Outcome of one chaos run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique id of this run
    pub run_id: uuid::Uuid,
    /// Seed the run used
    pub seed: Seed,
    /// Mode
    pub mode: Mode,
    /// Budget the run was given
    pub budget: Budget,
    /// Target navigated to at start, if any
    pub url: Option<String>,
    /// Actions successfully performed
    pub actions_performed: u32,
    /// Every attempted action, in order
    pub actions: Vec<ActionRecord>,
    /// Action failures and page errors, in order observed
    pub errors: Vec<String>,
    /// Successful recoveries
    pub recoveries: u32,
    /// Wall-clock duration
    #[serde(with = "crate::config::duration_ms")]
    pub duration: Duration,
    /// Terminal state
    pub status: RunStatus,
    /// Settings the run applied over its mode's defaults
    #[serde(default)]
    pub settings: RunOverrides,
    /// Screenshot taken at the first failure
    #[serde(skip)]
    pub failure_screenshot: Option<Screenshot>,
}

impl RunResult {
    /// Empty result for a run about to start
    #[must_use]
    pub fn new(seed: Seed, mode: Mode, budget: Budget) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4(),
            seed,
            mode,
            budget,
            url: None,
            actions_performed: 0,
            actions: Vec::new(),
            errors: Vec::new(),
            recoveries: 0,
            duration: Duration::ZERO,
            status: RunStatus::Completed,
            settings: RunOverrides::default(),
            failure_screenshot: None,
        }
    }

    /// No errors observed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    /// Ordered action kinds
    #[must_use]
    pub fn action_kinds(&self) -> Vec<ActionKind> {
        self.actions.iter().map(|a| a.kind).collect()
    }

    /// SHA-256 over every record's kind and detail, in order, hex encoded
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for record in &self.actions {
            hasher.update(record.kind.as_str().as_bytes());
            hasher.update(b"\t");
            hasher.update(record.detail().as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    /// Errors deduplicated, first-seen order, with occurrence counts
    #[must_use]
    pub fn unique_errors(&self) -> Vec<(&str, usize)> {
        let mut out: Vec<(&str, usize)> = Vec::new();
        for error in &self.errors {
            match out.iter_mut().find(|(e, _)| *e == error.as_str()) {
                Some(entry) => entry.1 += 1,
                None => out.push((error.as_str(), 1)),
            }
        }
        out
    }

    /// Pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Copy-pasteable, shell-quoted `caos run` command that repeats this run
    #[must_use]
    pub fn repro_command(&self) -> String {
        let mut args: Vec<String> = vec!["caos".into(), "run".into()];
        let url = self.url.as_deref().unwrap_or("<url>");
        push_flag(&mut args, "--url", url);
        push_flag(&mut args, "--mode", self.mode);
        push_flag(&mut args, "--seed", self.seed);
        match self.budget {
            Budget::Actions(n) => push_flag(&mut args, "--actions", n),
            Budget::Duration(d) => push_flag(&mut args, "--duration-ms", d.as_millis()),
        }

        let settings = &self.settings;
        for entry in &settings.exclusions {
            push_flag(&mut args, "--exclude", entry);
        }
        for action in settings.monkey_actions.iter().flatten() {
            push_flag(&mut args, "--monkey-action", action);
        }
        for action in settings.demon_actions.iter().flatten() {
            push_flag(&mut args, "--demon-action", action);
        }
        match settings.continue_on_error {
            Some(true) => args.push("--continue-on-error".into()),
            Some(false) => args.push("--stop-on-error".into()),
            None => {}
        }
        if let Some(attempts) = settings.max_recovery_attempts {
            push_flag(&mut args, "--max-recovery", attempts);
        }
        if let Some(ms) = settings.min_delay_ms {
            push_flag(&mut args, "--min-delay-ms", ms);
        }
        if let Some(ms) = settings.max_delay_ms {
            push_flag(&mut args, "--max-delay-ms", ms);
        }
        if let Some(ms) = settings.action_timeout_ms {
            push_flag(&mut args, "--timeout-ms", ms);
        }
        if let Some(ms) = settings.reload_timeout_ms {
            push_flag(&mut args, "--reload-timeout-ms", ms);
        }
        for pattern in &settings.ignore_errors {
            push_flag(&mut args, "--ignore-error", pattern);
        }
        shell_words::join(args)
    }
}

fn push_flag(args: &mut Vec<String>, flag: &str, value: impl std::fmt::Display) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

/// Render a run as a defect report showing the last `trailing` actions
#[must_use]
pub fn format_defect_report(result: &RunResult, trailing: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## Chaos defect report ({} mode)", result.mode);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Generated: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Run: {}", result.run_id);
    if let Some(ref url) = result.url {
        let _ = writeln!(out, "URL: {url}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "### Summary");
    let _ = writeln!(out, "- Seed: {}", result.seed);
    let _ = writeln!(out, "- Budget: {}", result.budget);
    let _ = writeln!(
        out,
        "- Actions: {} performed / {} attempted",
        result.actions_performed,
        result.actions.len()
    );
    let _ = writeln!(out, "- Errors: {}", result.errors.len());
    let _ = writeln!(out, "- Recoveries: {}", result.recoveries);
    let _ = writeln!(out, "- Duration: {}ms", result.duration.as_millis());
    match result.status {
        RunStatus::Completed => {
            let _ = writeln!(out, "- Status: completed");
        }
        RunStatus::Aborted { ref reason } => {
            let _ = writeln!(out, "- Status: aborted ({reason})");
        }
    }
    let _ = writeln!(out, "- Sequence: {}", &result.fingerprint()[..16]);

    let _ = writeln!(out);
    let _ = writeln!(out, "### Errors");
    let unique = result.unique_errors();
    if unique.is_empty() {
        let _ = writeln!(out, "None");
    }
    for (error, count) in unique {
        if count > 1 {
            let _ = writeln!(out, "- ({count}x) {error}");
        } else {
            let _ = writeln!(out, "- {error}");
        }
    }

    let _ = writeln!(out);
    let skip = result.actions.len().saturating_sub(trailing);
    let _ = writeln!(
        out,
        "### Last {} actions",
        result.actions.len() - skip
    );
    for record in &result.actions[skip..] {
        let mark = if record.is_performed() { "ok" } else { "FAILED" };
        let _ = writeln!(
            out,
            "{:>4}. [{mark}] {}: {}",
            record.index,
            record.kind,
            record.detail()
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "### Reproduce");
    let _ = writeln!(out, "```");
    let _ = writeln!(out, "{}", result.repro_command());
    let _ = writeln!(out, "```");
    out
}

/// Render many named runs as one console summary
#[must_use]
pub fn format_batch_summary(runs: &[(String, RunResult)]) -> String {
    let mut out = String::new();
    let failed = runs.iter().filter(|(_, r)| !r.passed()).count();
    let _ = writeln!(
        out,
        "Chaos batch: {} runs, {} passed, {} failed",
        runs.len(),
        runs.len() - failed,
        failed
    );
    for (name, result) in runs {
        let verdict = if result.passed() { "PASS" } else { "FAIL" };
        let _ = writeln!(
            out,
            "  [{verdict}] {name} ({} seed {}, {} actions, {} errors, {} recoveries)",
            result.mode,
            result.seed,
            result.actions_performed,
            result.errors.len(),
            result.recoveries
        );
        if result.passed() {
            continue;
        }
        let unique = result.unique_errors();
        for (error, _) in unique.iter().take(BATCH_ERRORS_PER_RUN) {
            let _ = writeln!(out, "      - {error}");
        }
        if unique.len() > BATCH_ERRORS_PER_RUN {
            let _ = writeln!(
                out,
                "      ... and {} more",
                unique.len() - BATCH_ERRORS_PER_RUN
            );
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::action::{DemonAction, MonkeyAction};

    fn failing_result() -> RunResult {
        let mut result = RunResult::new(Seed::from_u32(66666), Mode::Demon, Budget::Actions(40));
        result.url = Some("http://localhost:3000/".to_string());
        for i in 0..15 {
            result
                .actions
                .push(ActionRecord::performed(i, DemonAction::FocusSpam, "tabbed 7 times"));
        }
        result.actions.push(ActionRecord::failed(
            15,
            DemonAction::FuzzInput,
            "Interaction failed: boom",
        ));
        result.actions_performed = 15;
        result.errors = vec![
            "page error: TypeError: x is undefined".to_string(),
            "fuzz-input: Interaction failed: boom".to_string(),
            "page error: TypeError: x is undefined".to_string(),
        ];
        result.status = RunStatus::Aborted {
            reason: "recovery exhausted".to_string(),
        };
        result
    }

    mod result_tests {
        use super::*;

        #[test]
        fn test_unique_errors_counted_in_order() {
            let result = failing_result();
            assert_eq!(
                result.unique_errors(),
                vec![
                    ("page error: TypeError: x is undefined", 2),
                    ("fuzz-input: Interaction failed: boom", 1),
                ]
            );
        }

        #[test]
        fn test_fingerprint_tracks_sequence() {
            let a = failing_result();
            let mut b = failing_result();
            assert_eq!(a.fingerprint(), b.fingerprint());
            assert_eq!(a.fingerprint().len(), 64);
            b.actions[0].kind = MonkeyAction::Scroll.into();
            assert_ne!(a.fingerprint(), b.fingerprint());
        }

        #[test]
        fn test_fingerprint_tracks_targets() {
            let mut a = RunResult::new(Seed::from_u32(5), Mode::Monkey, Budget::Actions(1));
            let mut b = a.clone();
            a.actions
                .push(ActionRecord::performed(0, MonkeyAction::ClickButton, "clicked button#save"));
            b.actions
                .push(ActionRecord::performed(0, MonkeyAction::ClickButton, "clicked button#cancel"));
            assert_eq!(a.action_kinds(), b.action_kinds());
            assert_ne!(a.fingerprint(), b.fingerprint());
        }

        #[test]
        fn test_repro_command() {
            let result = failing_result();
            assert_eq!(
                result.repro_command(),
                "caos run --url http://localhost:3000/ --mode demon --seed 66666 --actions 40"
            );
            let mut timed = RunResult::new(
                Seed::from_u32(1),
                Mode::Monkey,
                Budget::Duration(Duration::from_secs(60)),
            );
            timed.url = None;
            assert!(timed.repro_command().ends_with("--mode monkey --seed 1 --duration-ms 60000"));
        }

        #[test]
        fn test_repro_command_carries_settings() {
            let mut result = failing_result();
            result.settings = RunOverrides {
                exclusions: vec!["text=Delete account".to_string(), "#nav".to_string()],
                demon_actions: Some(vec![
                    DemonAction::FuzzInput.into(),
                    (DemonAction::RapidClick, 3).into(),
                ]),
                continue_on_error: Some(false),
                max_recovery_attempts: Some(5),
                min_delay_ms: Some(0),
                max_delay_ms: Some(0),
                reload_timeout_ms: Some(800),
                ignore_errors: vec!["ResizeObserver loop".to_string()],
                ..RunOverrides::default()
            };
            let argv = shell_words::split(&result.repro_command()).unwrap();
            let pairs: Vec<(&str, &str)> = argv
                .windows(2)
                .map(|w| (w[0].as_str(), w[1].as_str()))
                .collect();
            for expected in [
                ("--seed", "66666"),
                ("--exclude", "text=Delete account"),
                ("--exclude", "#nav"),
                ("--demon-action", "fuzz-input"),
                ("--demon-action", "rapid-click:3"),
                ("--max-recovery", "5"),
                ("--min-delay-ms", "0"),
                ("--reload-timeout-ms", "800"),
                ("--ignore-error", "ResizeObserver loop"),
            ] {
                assert!(pairs.contains(&expected), "missing {expected:?} in {argv:?}");
            }
            assert!(argv.iter().any(|a| a == "--stop-on-error"));
            assert!(!argv.iter().any(|a| a == "--monkey-action"));
        }

        #[test]
        fn test_json_skips_screenshot() {
            let mut result = failing_result();
            result.failure_screenshot = Some(Screenshot::new(vec![1, 2, 3], 1, 1));
            let json = result.to_json().unwrap();
            assert!(json.contains("\"seed\": 66666"));
            assert!(json.contains("\"state\": \"aborted\""));
            assert!(!json.contains("failure_screenshot"));
            let back: RunResult = serde_json::from_str(&json).unwrap();
            assert_eq!(back.actions.len(), 16);
            assert!(back.failure_screenshot.is_none());
        }
    }

    mod format_tests {
        use super::*;

        #[test]
        fn test_defect_report_sections() {
            let report = format_defect_report(&failing_result(), DEFAULT_TRAILING_ACTIONS);
            assert!(report.contains("- Seed: 66666"));
            assert!(report.contains("- Actions: 15 performed / 16 attempted"));
            assert!(report.contains("- (2x) page error: TypeError: x is undefined"));
            assert!(report.contains("- Status: aborted (recovery exhausted)"));
            assert!(report.contains("### Last 10 actions"));
            assert!(report.contains("[FAILED] fuzz-input: Interaction failed: boom"));
            assert!(!report.contains("   5. [ok]"));
            assert!(report.contains("caos run --url http://localhost:3000/ --mode demon --seed 66666"));
        }

        #[test]
        fn test_defect_report_prints_full_command() {
            let mut result = failing_result();
            result.settings.max_recovery_attempts = Some(7);
            result.settings.continue_on_error = Some(true);
            let report = format_defect_report(&result, DEFAULT_TRAILING_ACTIONS);
            assert!(report.contains(&result.repro_command()));
            assert!(report.contains("--continue-on-error --max-recovery 7"));
        }

        #[test]
        fn test_defect_report_short_log() {
            let mut result = RunResult::new(Seed::from_u32(3), Mode::Monkey, Budget::Actions(2));
            result.actions.push(ActionRecord::performed(0, MonkeyAction::Scroll, "scrolled 120px"));
            let report = format_defect_report(&result, DEFAULT_TRAILING_ACTIONS);
            assert!(report.contains("### Last 1 actions"));
            assert!(report.contains("None"));
        }

        #[test]
        fn test_batch_summary() {
            let clean = RunResult::new(Seed::from_u32(1), Mode::Monkey, Budget::Actions(5));
            let mut noisy = failing_result();
            noisy.errors.extend((0..4).map(|i| format!("page error: E{i}")));
            let summary = format_batch_summary(&[
                ("smoke".to_string(), clean),
                ("fuzz".to_string(), noisy),
            ]);
            assert!(summary.starts_with("Chaos batch: 2 runs, 1 passed, 1 failed"));
            assert!(summary.contains("[PASS] smoke"));
            assert!(summary.contains("[FAIL] fuzz (demon seed 66666"));
            assert!(summary.contains("- page error: E0"));
            assert!(!summary.contains("- page error: E1"));
            assert!(summary.contains("... and 3 more"));
        }
    }
}
