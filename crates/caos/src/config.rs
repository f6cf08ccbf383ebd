//! Run configuration.
//!
//! [`RunConfig`] holds every knob of a run with documented defaults. Callers
//! build one with the `with_*` methods or apply a partial [`RunOverrides`]
//! (deserialised from YAML or JSON) on top of a base. The engine validates the
//! result once at run start and never mutates it afterwards.

use crate::action::{DemonAction, Mode, MonkeyAction, WeightedDemonAction};
use crate::report::ActionRecord;
use crate::result::{CaosError, CaosResult};
use crate::rng::Seed;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Per-action callback, invoked after every successful action
pub type ActionCallback = Arc<dyn Fn(&ActionRecord) + Send + Sync>;

/// How long a run lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Budget {
    /// Fixed number of loop iterations
    Actions(u32),
    /// Fixed wall-clock duration
    Duration(#[serde(with = "duration_ms")] Duration),
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actions(n) => write!(f, "{n} actions"),
            Self::Duration(d) => write!(f, "{}ms", d.as_millis()),
        }
    }
}

/// Configuration for one chaos run
#[derive(Clone)]
pub struct RunConfig {
    /// Seed for every random decision. Default `0`.
    pub seed: Seed,
    /// Action count or duration. Default 100 actions.
    pub budget: Budget,
    /// Caller exclusions merged with the built-in set. Default none.
    pub exclusions: Vec<String>,
    /// Lower bound of the random inter-action delay. Default 50ms.
    pub min_delay: Duration,
    /// Upper bound of the random inter-action delay. Default 200ms.
    pub max_delay: Duration,
    /// Bound on each single interaction. Default 5s.
    pub action_timeout: Duration,
    /// Bound on the reload performed by a recovery. Default 5s.
    pub reload_timeout: Duration,
    /// Recover and keep going after a failed action. Default `false` for
    /// monkey runs ([`RunConfig::monkey`]), `true` for demon runs
    /// ([`RunConfig::demon`]).
    pub continue_on_error: bool,
    /// Consecutive failed recoveries that abort the run. Default 3.
    pub max_recovery_attempts: u32,
    /// Benign catalog. Default [`MonkeyAction::ALL`].
    pub monkey_actions: Vec<MonkeyAction>,
    /// Adversarial catalog with weights. Default [`DemonAction::DEFAULT_WEIGHTS`].
    pub demon_actions: Vec<(DemonAction, u32)>,
    /// Navigated to before the first action when set. Default none.
    pub target_url: Option<String>,
    /// Extra regular expressions for page errors to ignore. Default none.
    pub ignore_errors: Vec<String>,
    /// Capture one screenshot at the first failure. Default `true`.
    pub capture_failure_screenshot: bool,
    /// Called after each successful action. Default none.
    pub on_action: Option<ActionCallback>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: Seed::default(),
            budget: Budget::Actions(100),
            exclusions: Vec::new(),
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(200),
            action_timeout: Duration::from_secs(5),
            reload_timeout: Duration::from_secs(5),
            continue_on_error: false,
            max_recovery_attempts: 3,
            monkey_actions: MonkeyAction::ALL.to_vec(),
            demon_actions: DemonAction::DEFAULT_WEIGHTS.to_vec(),
            target_url: None,
            ignore_errors: Vec::new(),
            capture_failure_screenshot: true,
            on_action: None,
        }
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("seed", &self.seed)
            .field("budget", &self.budget)
            .field("exclusions", &self.exclusions)
            .field("min_delay", &self.min_delay)
            .field("max_delay", &self.max_delay)
            .field("action_timeout", &self.action_timeout)
            .field("reload_timeout", &self.reload_timeout)
            .field("continue_on_error", &self.continue_on_error)
            .field("max_recovery_attempts", &self.max_recovery_attempts)
            .field("monkey_actions", &self.monkey_actions)
            .field("demon_actions", &self.demon_actions)
            .field("target_url", &self.target_url)
            .field("ignore_errors", &self.ignore_errors)
            .field("capture_failure_screenshot", &self.capture_failure_screenshot)
            .field("on_action", &self.on_action.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl RunConfig {
    /// Defaults for a benign run: stop at the first failure
    #[must_use]
    pub fn monkey() -> Self {
        Self::default()
    }

    /// Defaults for an adversarial run: recover and keep probing
    #[must_use]
    pub fn demon() -> Self {
        Self {
            continue_on_error: true,
            ..Self::default()
        }
    }

    /// Defaults for `mode`
    #[must_use]
    pub fn preset(mode: Mode) -> Self {
        match mode {
            Mode::Monkey => Self::monkey(),
            Mode::Demon => Self::demon(),
        }
    }

    /// Set seed
    #[must_use]
    pub fn with_seed(mut self, seed: impl Into<Seed>) -> Self {
        self.seed = seed.into();
        self
    }

    /// Count-bounded budget
    #[must_use]
    pub const fn with_actions(mut self, count: u32) -> Self {
        self.budget = Budget::Actions(count);
        self
    }

    /// Duration-bounded budget
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.budget = Budget::Duration(duration);
        self
    }

    /// Add caller exclusions
    #[must_use]
    pub fn with_exclusions<I, S>(mut self, exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions.extend(exclusions.into_iter().map(Into::into));
        self
    }

    /// Set inter-action delay bounds
    #[must_use]
    pub const fn with_delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max;
        self
    }

    /// No delay between actions
    #[must_use]
    pub const fn without_delay(self) -> Self {
        self.with_delay(Duration::ZERO, Duration::ZERO)
    }

    /// Set per-action timeout
    #[must_use]
    pub const fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Set recovery reload timeout
    #[must_use]
    pub const fn with_reload_timeout(mut self, timeout: Duration) -> Self {
        self.reload_timeout = timeout;
        self
    }

    /// Set continue-on-error
    #[must_use]
    pub const fn with_continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    /// Set the consecutive recovery ceiling
    #[must_use]
    pub const fn with_max_recovery_attempts(mut self, attempts: u32) -> Self {
        self.max_recovery_attempts = attempts;
        self
    }

    /// Restrict the benign catalog
    #[must_use]
    pub fn with_monkey_actions(mut self, actions: impl Into<Vec<MonkeyAction>>) -> Self {
        self.monkey_actions = actions.into();
        self
    }

    /// Restrict the adversarial catalog; bare actions get weight 1
    #[must_use]
    pub fn with_demon_actions<I>(mut self, actions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<WeightedDemonAction>,
    {
        self.demon_actions = actions
            .into_iter()
            .map(|a| {
                let a = a.into();
                (a.action, a.weight)
            })
            .collect();
        self
    }

    /// Set the URL navigated to at run start
    #[must_use]
    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }

    /// Add page-error patterns to ignore
    #[must_use]
    pub fn with_ignore_errors<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_errors.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Enable or disable the failure screenshot
    #[must_use]
    pub const fn with_failure_screenshot(mut self, enabled: bool) -> Self {
        self.capture_failure_screenshot = enabled;
        self
    }

    /// Set the per-action callback
    #[must_use]
    pub fn with_on_action(mut self, callback: impl Fn(&ActionRecord) + Send + Sync + 'static) -> Self {
        self.on_action = Some(Arc::new(callback));
        self
    }

    /// Reject configurations no run can honour
    pub fn validate(&self) -> CaosResult<()> {
        match self.budget {
            Budget::Actions(0) => {
                return Err(CaosError::invalid_config("action budget must be positive"))
            }
            Budget::Duration(d) if d.is_zero() => {
                return Err(CaosError::invalid_config("duration budget must be positive"))
            }
            _ => {}
        }
        if self.min_delay > self.max_delay {
            return Err(CaosError::invalid_config(format!(
                "min_delay {}ms exceeds max_delay {}ms",
                self.min_delay.as_millis(),
                self.max_delay.as_millis()
            )));
        }
        if self.action_timeout.is_zero() {
            return Err(CaosError::invalid_config("action_timeout must be positive"));
        }
        if self.max_recovery_attempts == 0 {
            return Err(CaosError::invalid_config(
                "max_recovery_attempts must be at least 1",
            ));
        }
        if self.monkey_actions.is_empty() {
            return Err(CaosError::invalid_config("monkey action catalog is empty"));
        }
        if self.monkey_actions.contains(&MonkeyAction::DismissModal) {
            return Err(CaosError::invalid_config(
                "modal-dismiss is recorded by the executor and cannot be drawn",
            ));
        }
        if self.demon_actions.iter().all(|(_, w)| *w == 0) {
            return Err(CaosError::invalid_config(
                "demon action catalog has no positive weight",
            ));
        }
        Ok(())
    }
}

/// Partial configuration applied over a base [`RunConfig`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunOverrides {
    /// Seed
    pub seed: Option<u32>,
    /// Count budget
    pub actions: Option<u32>,
    /// Duration budget in milliseconds
    pub duration_ms: Option<u64>,
    /// Extra exclusions
    pub exclusions: Vec<String>,
    /// Minimum delay in milliseconds
    pub min_delay_ms: Option<u64>,
    /// Maximum delay in milliseconds
    pub max_delay_ms: Option<u64>,
    /// Per-action timeout in milliseconds
    pub action_timeout_ms: Option<u64>,
    /// Recovery reload timeout in milliseconds
    pub reload_timeout_ms: Option<u64>,
    /// Continue on error
    pub continue_on_error: Option<bool>,
    /// Recovery ceiling
    pub max_recovery_attempts: Option<u32>,
    /// Benign catalog
    pub monkey_actions: Option<Vec<MonkeyAction>>,
    /// Adversarial catalog, `kind` or `kind:weight`
    pub demon_actions: Option<Vec<WeightedDemonAction>>,
    /// Start URL
    pub url: Option<String>,
    /// Page-error patterns to ignore
    pub ignore_errors: Vec<String>,
}

impl RunOverrides {
    /// Settings that turn the `mode` preset into `config`.
    ///
    /// Seed, budget and URL are always set. Other fields are set only where
    /// `config` differs from the preset, so applying the result to
    /// [`RunConfig::preset`] yields an equivalent configuration.
    #[must_use]
    pub fn from_config(config: &RunConfig, mode: Mode) -> Self {
        let base = RunConfig::preset(mode);
        let changed = |value: u64, default: u64| (value != default).then_some(value);
        let millis = |d: Duration| d.as_millis() as u64;
        let (actions, duration_ms) = match config.budget {
            Budget::Actions(n) => (Some(n), None),
            Budget::Duration(d) => (None, Some(millis(d))),
        };
        Self {
            seed: Some(config.seed.value()),
            actions,
            duration_ms,
            exclusions: config
                .exclusions
                .iter()
                .skip(base.exclusions.len())
                .cloned()
                .collect(),
            min_delay_ms: changed(millis(config.min_delay), millis(base.min_delay)),
            max_delay_ms: changed(millis(config.max_delay), millis(base.max_delay)),
            action_timeout_ms: changed(millis(config.action_timeout), millis(base.action_timeout)),
            reload_timeout_ms: changed(millis(config.reload_timeout), millis(base.reload_timeout)),
            continue_on_error: (config.continue_on_error != base.continue_on_error)
                .then_some(config.continue_on_error),
            max_recovery_attempts: (config.max_recovery_attempts != base.max_recovery_attempts)
                .then_some(config.max_recovery_attempts),
            monkey_actions: (config.monkey_actions != base.monkey_actions)
                .then(|| config.monkey_actions.clone()),
            demon_actions: (config.demon_actions != base.demon_actions).then(|| {
                config
                    .demon_actions
                    .iter()
                    .copied()
                    .map(WeightedDemonAction::from)
                    .collect()
            }),
            url: config.target_url.clone(),
            ignore_errors: config
                .ignore_errors
                .iter()
                .skip(base.ignore_errors.len())
                .cloned()
                .collect(),
        }
    }

    /// Merge onto `base`; set fields win, unset fields keep the base value
    pub fn apply(&self, base: RunConfig) -> CaosResult<RunConfig> {
        if self.actions.is_some() && self.duration_ms.is_some() {
            return Err(CaosError::invalid_config(
                "set either actions or duration_ms, not both",
            ));
        }
        let mut config = base;
        if let Some(seed) = self.seed {
            config.seed = Seed::from_u32(seed);
        }
        if let Some(actions) = self.actions {
            config.budget = Budget::Actions(actions);
        }
        if let Some(ms) = self.duration_ms {
            config.budget = Budget::Duration(Duration::from_millis(ms));
        }
        config.exclusions.extend(self.exclusions.iter().cloned());
        if let Some(ms) = self.min_delay_ms {
            config.min_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.max_delay_ms {
            config.max_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.action_timeout_ms {
            config.action_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.reload_timeout_ms {
            config = config.with_reload_timeout(Duration::from_millis(ms));
        }
        if let Some(enabled) = self.continue_on_error {
            config.continue_on_error = enabled;
        }
        if let Some(attempts) = self.max_recovery_attempts {
            config.max_recovery_attempts = attempts;
        }
        if let Some(ref actions) = self.monkey_actions {
            config.monkey_actions.clone_from(actions);
        }
        if let Some(ref actions) = self.demon_actions {
            config = config.with_demon_actions(actions.iter().copied());
        }
        if let Some(ref url) = self.url {
            config.target_url = Some(url.clone());
        }
        config.ignore_errors.extend(self.ignore_errors.iter().cloned());
        Ok(config)
    }
}

/// One named run of a [`RunPlan`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedRun {
    /// Name shown in the batch summary
    pub name: String,
    /// Run mode
    pub mode: Mode,
    /// Settings applied over the mode's defaults
    #[serde(default)]
    pub config: RunOverrides,
}

impl PlannedRun {
    /// Resolve against the mode preset and the plan-level URL
    pub fn resolve(&self, default_url: Option<&str>) -> CaosResult<RunConfig> {
        let mut config = self.config.apply(RunConfig::preset(self.mode))?;
        if config.target_url.is_none() {
            config.target_url = default_url.map(str::to_string);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Sequence of named runs loaded from YAML
///
/// ```yaml
/// url: http://localhost:3000/
/// runs:
///   - name: smoke
///     mode: monkey
///     config: { seed: 12345, actions: 50 }
///   - name: fuzz-forms
///     mode: demon
///     config: { seed: 66666, duration_ms: 60000, demon_actions: [fuzz-input] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunPlan {
    /// Default target for runs that set no `url`
    #[serde(default)]
    pub url: Option<String>,
    /// Runs, executed in order
    pub runs: Vec<PlannedRun>,
}

impl RunPlan {
    /// Parse and check a plan
    pub fn from_yaml(yaml: &str) -> CaosResult<Self> {
        let plan: Self = serde_yaml_ng::from_str(yaml).map_err(|e| CaosError::PlanError {
            message: e.to_string(),
        })?;
        plan.check()?;
        Ok(plan)
    }

    /// Load a plan file
    pub fn from_path(path: &Path) -> CaosResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    fn check(&self) -> CaosResult<()> {
        if self.runs.is_empty() {
            return Err(CaosError::PlanError {
                message: "plan has no runs".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for run in &self.runs {
            if !seen.insert(run.name.as_str()) {
                return Err(CaosError::PlanError {
                    message: format!("duplicate run name: {}", run.name),
                });
            }
        }
        Ok(())
    }
}

/// Millisecond (de)serialisation for `Duration` fields
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
