//! Orchestration loops.
//!
//! One loop drives every run. Mode picks the executor (benign element
//! actions or adversarial coordinate actions) and the budget picks the
//! termination check (iteration counter or wall-clock deadline); the four
//! public entry points only fix those two axes.
//!
//! ```text
//! Running ──► perform ──► Performed ──┐
//!    ▲          │                     │
//!    │          ├──► Idle ────────────┤
//!    │          │                     ▼
//!    │          └──► Failed ──► recover? ──► Aborted
//!    │                                │
//!    └──────────── delay ◄────────────┘
//!                   │
//!                   └──► Completed (budget used up)
//! ```
//!
//! The page is touched by exactly one operation at a time. There is no
//! preemption of an in-flight operation: each one is bounded by the driver's
//! own action timeout.

use crate::action::Mode;
use crate::capture::{ErrorSubscription, NoiseFilter};
use crate::config::{Budget, RunConfig, RunOverrides};
use crate::driver::PageDriver;
use crate::exclusion::ExclusionSet;
use crate::executor::{demon_step, monkey_step, Step};
use crate::recovery::{Recovery, RecoveryOutcome};
use crate::report::{ActionRecord, RunResult, RunStatus};
use crate::result::CaosResult;
use crate::rng::Rng;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Benign run bounded by action count
pub async fn run_chaos_monkey<D: PageDriver + ?Sized>(
    driver: &mut D,
    config: RunConfig,
    actions: u32,
) -> CaosResult<RunResult> {
    run(driver, Mode::Monkey, config.with_actions(actions)).await
}

/// Benign run bounded by wall-clock duration
pub async fn run_chaos_monkey_for_duration<D: PageDriver + ?Sized>(
    driver: &mut D,
    config: RunConfig,
    duration: Duration,
) -> CaosResult<RunResult> {
    run(driver, Mode::Monkey, config.with_duration(duration)).await
}

/// Adversarial run bounded by action count
pub async fn run_demon<D: PageDriver + ?Sized>(
    driver: &mut D,
    config: RunConfig,
    actions: u32,
) -> CaosResult<RunResult> {
    run(driver, Mode::Demon, config.with_actions(actions)).await
}

/// Adversarial run bounded by wall-clock duration
pub async fn run_demon_for_duration<D: PageDriver + ?Sized>(
    driver: &mut D,
    config: RunConfig,
    duration: Duration,
) -> CaosResult<RunResult> {
    run(driver, Mode::Demon, config.with_duration(duration)).await
}

/// Run with the budget already set on `config`.
///
/// Fails only for an invalid configuration. Everything that goes wrong once
/// the run has started ends up in the returned [`RunResult`].
pub async fn run<D: PageDriver + ?Sized>(
    driver: &mut D,
    mode: Mode,
    config: RunConfig,
) -> CaosResult<RunResult> {
    config.validate()?;
    let exclusions = ExclusionSet::with_caller_entries(&config.exclusions)?;
    let noise = NoiseFilter::new(&config.ignore_errors)?;

    let mut result = RunResult::new(config.seed, mode, config.budget);
    result.url.clone_from(&config.target_url);
    result.settings = RunOverrides::from_config(&config, mode);

    info!(
        run_id = %result.run_id,
        seed = %config.seed,
        mode = %mode,
        budget = %config.budget,
        "chaos run starting"
    );
    let started = Instant::now();
    let runner = Runner {
        driver,
        mode,
        rng: Rng::new(config.seed),
        recovery: Recovery::new(config.max_recovery_attempts, config.reload_timeout),
        config: &config,
        exclusions: &exclusions,
        noise: &noise,
        result,
        started,
    };
    let result = runner.drive().await;

    match result.status {
        RunStatus::Completed => info!(
            seed = %result.seed,
            actions = result.actions_performed,
            errors = result.errors.len(),
            recoveries = result.recoveries,
            elapsed_ms = result.duration.as_millis() as u64,
            "chaos run completed"
        ),
        RunStatus::Aborted { ref reason } => warn!(
            seed = %result.seed,
            actions = result.actions_performed,
            errors = result.errors.len(),
            %reason,
            "chaos run aborted"
        ),
    }
    Ok(result)
}

struct Runner<'a, D: PageDriver + ?Sized> {
    driver: &'a mut D,
    mode: Mode,
    rng: Rng,
    recovery: Recovery,
    config: &'a RunConfig,
    exclusions: &'a ExclusionSet,
    noise: &'a NoiseFilter,
    result: RunResult,
    started: Instant,
}

impl<D: PageDriver + ?Sized> Runner<'_, D> {
    async fn drive(mut self) -> RunResult {
        self.driver.set_action_timeout(self.config.action_timeout);

        // Held until this function returns; dropping it detaches the listener.
        let mut subscription = match self.driver.subscribe_errors().await {
            Ok(subscription) => Some(subscription),
            Err(e) if e.is_fatal() => {
                return self.finish(None, Some(format!("page unusable: {e}")));
            }
            Err(e) => {
                warn!(error = %e, "page error capture unavailable");
                None
            }
        };

        if let Some(url) = self.config.target_url.as_deref() {
            if let Err(e) = self.driver.navigate(url).await {
                self.result.errors.push(format!("navigation: {e}"));
                return self.finish(subscription.as_mut(), Some(format!("navigation failed: {e}")));
            }
        }

        let deadline = match self.config.budget {
            Budget::Duration(d) => Some(self.started + d),
            Budget::Actions(_) => None,
        };
        let mut remaining = match self.config.budget {
            Budget::Actions(n) => n,
            Budget::Duration(_) => 0,
        };
        let mut index: u32 = 0;

        let abort = loop {
            let budget_left = match deadline {
                Some(deadline) => Instant::now() < deadline,
                None => remaining > 0,
            };
            if !budget_left {
                break None;
            }

            let step = match self.mode {
                Mode::Monkey => {
                    monkey_step(
                        &mut *self.driver,
                        &mut self.rng,
                        self.exclusions,
                        &self.config.monkey_actions,
                    )
                    .await
                }
                Mode::Demon => {
                    demon_step(&mut *self.driver, &mut self.rng, &self.config.demon_actions).await
                }
            };

            let abort = match step {
                Step::Performed { kind, description } => {
                    debug!(index, kind = %kind, %description, "action performed");
                    let record = ActionRecord::performed(index, kind, description);
                    if let Some(ref callback) = self.config.on_action {
                        callback(&record);
                    }
                    self.result.actions.push(record);
                    self.result.actions_performed += 1;
                    index += 1;
                    None
                }
                Step::Idle => {
                    debug!(index, "nothing to do");
                    None
                }
                Step::Failed { kind, error } => {
                    warn!(index, kind = %kind, error = %error, "action failed");
                    self.result
                        .actions
                        .push(ActionRecord::failed(index, kind, error.to_string()));
                    self.result.errors.push(format!("{kind}: {error}"));
                    index += 1;

                    if error.is_fatal() || self.driver.is_closed() {
                        Some(format!("page unusable: {error}"))
                    } else {
                        self.capture_failure_screenshot().await;
                        if self.config.continue_on_error {
                            self.recover().await
                        } else {
                            Some(format!("{kind} failed"))
                        }
                    }
                }
            };

            if let Some(ref mut subscription) = subscription {
                self.collect_page_errors(subscription);
            }
            if abort.is_some() {
                break abort;
            }

            remaining = remaining.saturating_sub(1);
            self.pause(deadline, remaining).await;
        };

        self.finish(subscription.as_mut(), abort)
    }

    async fn recover(&mut self) -> Option<String> {
        match self.recovery.recover(&mut *self.driver).await {
            RecoveryOutcome::Recovered | RecoveryOutcome::Failed { .. } => None,
            RecoveryOutcome::Exhausted { attempts, last_error } => Some(format!(
                "recovery exhausted after {attempts} consecutive attempts: {last_error}"
            )),
            RecoveryOutcome::PageUnusable => Some("page unusable, recovery impossible".to_string()),
        }
    }

    async fn capture_failure_screenshot(&mut self) {
        if !self.config.capture_failure_screenshot || self.result.failure_screenshot.is_some() {
            return;
        }
        match self.driver.screenshot().await {
            Ok(shot) => self.result.failure_screenshot = Some(shot),
            Err(e) => debug!(error = %e, "failure screenshot unavailable"),
        }
    }

    fn collect_page_errors(&mut self, subscription: &mut ErrorSubscription) {
        for message in self.noise.findings(subscription.drain()) {
            warn!(error = %message, "page error");
            self.result.errors.push(format!("page error: {message}"));
        }
    }

    /// Random inter-action delay, skipped once the budget is spent
    async fn pause(&mut self, deadline: Option<Instant>, remaining: u32) {
        let min = self.config.min_delay.as_millis() as i64;
        let max = self.config.max_delay.as_millis() as i64;
        let mut delay = Duration::from_millis(self.rng.int(min, max) as u64);
        match deadline {
            Some(deadline) => {
                delay = delay.min(deadline.saturating_duration_since(Instant::now()));
            }
            None if remaining == 0 => return,
            None => {}
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn finish(
        mut self,
        subscription: Option<&mut ErrorSubscription>,
        abort: Option<String>,
    ) -> RunResult {
        if let Some(subscription) = subscription {
            self.collect_page_errors(subscription);
        }
        self.result.recoveries = self.recovery.successes();
        self.result.duration = self.started.elapsed();
        self.result.status = match abort {
            Some(reason) => RunStatus::Aborted { reason },
            None => RunStatus::Completed,
        };
        self.result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, DemonAction, MonkeyAction};
    use crate::driver::truncate;
    use crate::mock::MockPage;
    use crate::payloads::ADVERSARIAL_PAYLOADS;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn form_page() -> MockPage {
        let mut page = MockPage::new();
        page.add_button("submit", "Submit");
        page.add_input("name", "text");
        page
    }

    fn quick(config: RunConfig) -> RunConfig {
        config.without_delay()
    }

    mod determinism_tests {
        use super::*;

        #[tokio::test]
        async fn test_same_seed_same_sequence() {
            for seed in [1_u32, 12345, 66666, u32::MAX] {
                let mut a = form_page();
                let mut b = form_page();
                let config = quick(RunConfig::monkey().with_seed(seed));
                let ra = run_chaos_monkey(&mut a, config.clone(), 25).await.unwrap();
                let rb = run_chaos_monkey(&mut b, config, 25).await.unwrap();
                assert_eq!(ra.action_kinds(), rb.action_kinds());
                assert_eq!(ra.fingerprint(), rb.fingerprint());
                assert_eq!(a.call_history, b.call_history);
            }
        }

        #[tokio::test]
        async fn test_demon_same_seed_same_sequence() {
            let mut a = MockPage::new();
            let mut b = MockPage::new();
            let config = quick(RunConfig::demon().with_seed(66666_u32));
            let ra = run_demon(&mut a, config.clone(), 20).await.unwrap();
            let rb = run_demon(&mut b, config, 20).await.unwrap();
            assert_eq!(ra.fingerprint(), rb.fingerprint());
            assert_eq!(a.typed, b.typed);
            assert_eq!(a.inserted, b.inserted);
        }

        #[tokio::test]
        async fn test_different_seeds_diverge() {
            let mut a = form_page();
            let mut b = form_page();
            let ra = run_chaos_monkey(&mut a, quick(RunConfig::monkey().with_seed(1_u32)), 30)
                .await
                .unwrap();
            let rb = run_chaos_monkey(&mut b, quick(RunConfig::monkey().with_seed(2_u32)), 30)
                .await
                .unwrap();
            assert_ne!(ra.fingerprint(), rb.fingerprint());
        }
    }

    mod budget_tests {
        use super::*;

        #[tokio::test]
        async fn test_count_bounded_scenario() {
            let mut page = form_page();
            let config = quick(RunConfig::monkey().with_seed(12345_u32));
            let result = run_chaos_monkey(&mut page, config, 13).await.unwrap();
            assert_eq!(result.actions_performed, 13);
            assert_eq!(result.actions.len(), 13);
            assert!(result.errors.is_empty());
            assert_eq!(result.status, RunStatus::Completed);
            assert_eq!(result.seed.value(), 12345);
            let indexes: Vec<u32> = result.actions.iter().map(|a| a.index).collect();
            assert_eq!(indexes, (0..13).collect::<Vec<_>>());
        }

        #[tokio::test]
        async fn test_duration_bounded_stops_on_time() {
            let mut page = form_page();
            let config = RunConfig::monkey()
                .with_seed(7_u32)
                .with_delay(Duration::from_millis(5), Duration::from_millis(10));
            let budget = Duration::from_millis(200);
            let result = run_chaos_monkey_for_duration(&mut page, config, budget)
                .await
                .unwrap();
            assert!(result.actions_performed > 0);
            assert!(result.duration >= budget);
            assert!(result.duration < budget + Duration::from_secs(2));
            assert_eq!(result.status, RunStatus::Completed);
        }

        #[tokio::test]
        async fn test_duration_bounded_demon() {
            let mut page = MockPage::new();
            let config = RunConfig::demon()
                .with_delay(Duration::from_millis(1), Duration::from_millis(3));
            let result = run_demon_for_duration(&mut page, config, Duration::from_millis(100))
                .await
                .unwrap();
            assert!(result.actions_performed > 0);
            assert!(result.duration >= Duration::from_millis(100));
        }

        #[tokio::test]
        async fn test_idle_iterations_use_budget() {
            let mut page = MockPage::new();
            let config = quick(RunConfig::monkey().with_monkey_actions(vec![MonkeyAction::ClickButton]));
            let result = run_chaos_monkey(&mut page, config, 5).await.unwrap();
            assert_eq!(result.actions_performed, 0);
            assert!(result.actions.is_empty());
            assert_eq!(result.status, RunStatus::Completed);
            assert_eq!(page.count_calls("query_all"), 5);
        }

        #[tokio::test]
        async fn test_invalid_config_rejected() {
            let mut page = MockPage::new();
            assert!(run_chaos_monkey(&mut page, RunConfig::monkey(), 0).await.is_err());
            let bad = RunConfig::monkey().with_ignore_errors(["(unclosed"]);
            assert!(run_chaos_monkey(&mut page, bad, 1).await.is_err());
            assert!(!page.was_called("subscribe_errors"));
        }
    }

    mod demon_run_tests {
        use super::*;

        #[tokio::test]
        async fn test_fuzz_input_scenario() {
            let mut page = MockPage::new();
            let config = quick(
                RunConfig::demon()
                    .with_seed(66666_u32)
                    .with_demon_actions([DemonAction::FuzzInput]),
            );
            let result = run_demon(&mut page, config, 1).await.unwrap();
            assert_eq!(result.actions_performed, 1);
            let payload = &page.typed[0];
            assert!(ADVERSARIAL_PAYLOADS
                .iter()
                .any(|(_, payloads)| payloads.contains(&payload.as_str())));
            let record = &result.actions[0];
            assert_eq!(record.kind, ActionKind::Demon(DemonAction::FuzzInput));
            assert!(record.detail().contains(&truncate(payload, 30)));
        }

        #[tokio::test]
        async fn test_page_error_does_not_stop_demon() {
            let mut page = MockPage::new();
            page.raise_page_error("TypeError: Cannot read properties of undefined");
            let config = quick(RunConfig::demon());
            let result = run_demon(&mut page, config, 5).await.unwrap();
            assert_eq!(result.actions_performed, 5);
            assert_eq!(result.status, RunStatus::Completed);
            assert_eq!(
                result.errors,
                vec!["page error: TypeError: Cannot read properties of undefined"]
            );
        }

        #[tokio::test]
        async fn test_weighted_catalog_respected() {
            let mut page = MockPage::new();
            let mut config = quick(RunConfig::demon());
            config.demon_actions = vec![(DemonAction::FocusSpam, 1), (DemonAction::PasteBomb, 0)];
            let result = run_demon(&mut page, config, 10).await.unwrap();
            assert!(result
                .action_kinds()
                .iter()
                .all(|k| *k == ActionKind::Demon(DemonAction::FocusSpam)));
            assert!(page.inserted.is_empty());
        }
    }

    mod failure_tests {
        use super::*;

        #[tokio::test]
        async fn test_recovery_exhaustion_scenario() {
            let mut page = form_page();
            page.fail_everything();
            let config = quick(
                RunConfig::monkey()
                    .with_continue_on_error(true)
                    .with_max_recovery_attempts(3),
            );
            let result = run_chaos_monkey(&mut page, config, 50).await.unwrap();
            assert!(result.status.is_aborted());
            assert_eq!(page.count_calls("reload"), 3);
            assert_eq!(result.recoveries, 0);
            assert_eq!(result.actions.len(), 3);
            assert_eq!(result.actions_performed, 0);
            assert_eq!(result.errors.len(), 3);
        }

        #[tokio::test]
        async fn test_transient_failure_recovers() {
            let mut page = form_page();
            page.fail_op("fill");
            page.fail_reloads(1);
            let config = quick(
                RunConfig::monkey()
                    .with_seed(3_u32)
                    .with_monkey_actions(vec![MonkeyAction::FillInput])
                    .with_continue_on_error(true),
            );
            let result = run_chaos_monkey(&mut page, config, 4).await.unwrap();
            // reload 1 fails, 2..4 succeed and keep resetting the counter
            assert_eq!(result.status, RunStatus::Completed);
            assert_eq!(page.count_calls("reload"), 4);
            assert_eq!(result.recoveries, 3);
            assert!(result.errors.iter().all(|e| e.starts_with("fill-input: ")));
        }

        #[tokio::test]
        async fn test_stop_at_first_failure_without_continue() {
            let mut page = form_page();
            page.fail_op("fill");
            let config = quick(
                RunConfig::monkey().with_monkey_actions(vec![MonkeyAction::FillInput]),
            );
            let result = run_chaos_monkey(&mut page, config, 10).await.unwrap();
            assert_eq!(
                result.status,
                RunStatus::Aborted {
                    reason: "fill-input failed".to_string()
                }
            );
            assert_eq!(result.actions.len(), 1);
            assert!(!page.was_called("reload"));
            assert!(result.failure_screenshot.is_some());
        }

        #[tokio::test]
        async fn test_partial_results_preserved_on_close() {
            let mut page = form_page();
            // subscribe, then (query, click) per action; the third click dies
            page.close_after(6);
            let config = quick(
                RunConfig::monkey()
                    .with_monkey_actions(vec![MonkeyAction::ClickButton])
                    .with_continue_on_error(true),
            );
            let result = run_chaos_monkey(&mut page, config, 10).await.unwrap();
            assert_eq!(result.actions_performed, 2);
            assert_eq!(result.actions.len(), 3);
            assert!(!result.actions[2].is_performed());
            assert!(result.status.is_aborted());
            assert!(!page.was_called("reload"));
        }

        #[tokio::test]
        async fn test_navigation_failure_aborts() {
            let mut page = form_page();
            page.fail_op("navigate");
            let config = quick(RunConfig::monkey().with_target_url("http://localhost:9/"));
            let result = run_chaos_monkey(&mut page, config, 5).await.unwrap();
            assert!(result.status.is_aborted());
            assert!(result.actions.is_empty());
            assert!(result.errors[0].starts_with("navigation: "));
        }
    }

    mod capture_tests {
        use super::*;

        #[tokio::test]
        async fn test_subscription_released_on_every_exit() {
            let mut page = form_page();
            run_chaos_monkey(&mut page, quick(RunConfig::monkey()), 3)
                .await
                .unwrap();
            assert!(page.was_called("subscribe_errors"));
            assert!(!page.is_subscribed());

            let mut failing = form_page();
            failing.fail_op("fill");
            failing.fail_op("click");
            failing.fail_op("hover");
            failing.fail_op("mouse_wheel");
            failing.fail_op("press_key");
            let result = run_chaos_monkey(&mut failing, quick(RunConfig::monkey()), 3)
                .await
                .unwrap();
            assert!(result.status.is_aborted());
            assert!(!failing.is_subscribed());
        }

        #[tokio::test]
        async fn test_click_errors_captured_in_benign_run() {
            let mut page = MockPage::new();
            page.add_button("go", "Go");
            page.error_on_click("ReferenceError: handler is not defined");
            let config = quick(
                RunConfig::monkey().with_monkey_actions(vec![MonkeyAction::ClickButton]),
            );
            let result = run_chaos_monkey(&mut page, config, 3).await.unwrap();
            assert_eq!(result.actions_performed, 3);
            assert_eq!(result.errors.len(), 3);
            assert!(result.errors.iter().all(|e| e.contains("ReferenceError")));
        }

        #[tokio::test]
        async fn test_noise_filtered() {
            let mut page = MockPage::new();
            page.raise_page_error("ResizeObserver loop limit exceeded");
            page.raise_page_error("Warning: legacy widget");
            let config = quick(RunConfig::demon().with_ignore_errors(["^Warning: legacy"]));
            let result = run_demon(&mut page, config, 2).await.unwrap();
            assert!(result.errors.is_empty());
        }
    }

    mod config_flow_tests {
        use super::*;

        #[tokio::test]
        async fn test_callback_and_timeout_and_navigation() {
            let mut page = form_page();
            let seen = Arc::new(AtomicU32::new(0));
            let counter = Arc::clone(&seen);
            let config = quick(
                RunConfig::monkey()
                    .with_target_url("http://localhost:3000/")
                    .with_action_timeout(Duration::from_millis(750))
                    .with_on_action(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
            );
            let result = run_chaos_monkey(&mut page, config, 8).await.unwrap();
            assert_eq!(seen.load(Ordering::SeqCst), result.actions_performed);
            assert_eq!(page.current_url, "http://localhost:3000/");
            assert_eq!(page.action_timeout(), Some(Duration::from_millis(750)));
            assert_eq!(result.url.as_deref(), Some("http://localhost:3000/"));
        }

        #[tokio::test]
        async fn test_exclusion_invariant_over_run() {
            let mut page = MockPage::new();
            page.add_button("ok", "Save");
            page.add_button("del", "Delete everything");
            page.add_button("reset", "Reset form");
            page.add_link("out", "Leave");
            page.mark_matching("out", "a[target=\"_blank\"]");
            let config = quick(
                RunConfig::monkey()
                    .with_seed(99_u32)
                    .with_exclusions(["text=reset"]),
            );
            let result = run_chaos_monkey(&mut page, config, 60).await.unwrap();
            for record in &result.actions {
                assert!(!record.detail().contains("Delete"));
                assert!(!record.detail().contains("Reset"));
                assert!(!record.detail().contains("Leave"));
            }
            assert!(!page
                .call_history
                .iter()
                .any(|c| ["click:del", "click:reset", "click:out", "hover:del", "hover:reset", "hover:out"]
                    .contains(&c.as_str())));
        }
    }
}
