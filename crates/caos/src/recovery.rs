//! Recovery after a failed action.
//!
//! A recovery is one full page reload followed by a bounded wait for the
//! document to become interactive. Consecutive failed recoveries are counted;
//! a successful one resets the count. Once the count reaches the configured
//! ceiling the run must stop, which keeps a truly broken page from turning an
//! endurance run into an endless reload loop.

use crate::driver::PageDriver;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of one recovery request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Page reloaded and interactive again
    Recovered,
    /// Reload failed; the run may keep going
    Failed {
        /// Consecutive failures so far
        attempt: u32,
        /// Reload error
        error: String,
    },
    /// Consecutive failures reached the ceiling; the run must abort
    Exhausted {
        /// Consecutive failures
        attempts: u32,
        /// Last reload error
        last_error: String,
    },
    /// Page or browser is gone; nothing to reload
    PageUnusable,
}

impl RecoveryOutcome {
    /// Whether the run must stop
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted { .. } | Self::PageUnusable)
    }
}

/// Tracks consecutive recovery attempts for one run
#[derive(Debug, Clone)]
pub struct Recovery {
    max_attempts: u32,
    reload_timeout: Duration,
    consecutive_failures: u32,
    successes: u32,
}

impl Recovery {
    /// Tracker with a ceiling of `max_attempts` consecutive failed reloads
    #[must_use]
    pub const fn new(max_attempts: u32, reload_timeout: Duration) -> Self {
        Self {
            max_attempts,
            reload_timeout,
            consecutive_failures: 0,
            successes: 0,
        }
    }

    /// Successful recoveries so far
    #[must_use]
    pub const fn successes(&self) -> u32 {
        self.successes
    }

    /// Current run of failed recoveries
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Try to bring the page back
    pub async fn recover<D: PageDriver + ?Sized>(&mut self, driver: &mut D) -> RecoveryOutcome {
        if driver.is_closed() {
            warn!("page closed, recovery impossible");
            return RecoveryOutcome::PageUnusable;
        }
        if self.consecutive_failures >= self.max_attempts {
            return RecoveryOutcome::Exhausted {
                attempts: self.consecutive_failures,
                last_error: "recovery ceiling already reached".to_string(),
            };
        }

        match driver.reload_until_interactive(self.reload_timeout).await {
            Ok(()) => {
                self.consecutive_failures = 0;
                self.successes += 1;
                debug!(successes = self.successes, "page recovered");
                RecoveryOutcome::Recovered
            }
            Err(e) if e.is_fatal() || driver.is_closed() => {
                warn!(error = %e, "page lost during recovery");
                RecoveryOutcome::PageUnusable
            }
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    attempt = self.consecutive_failures,
                    max = self.max_attempts,
                    error = %e,
                    "recovery failed"
                );
                if self.consecutive_failures >= self.max_attempts {
                    RecoveryOutcome::Exhausted {
                        attempts: self.consecutive_failures,
                        last_error: e.to_string(),
                    }
                } else {
                    RecoveryOutcome::Failed {
                        attempt: self.consecutive_failures,
                        error: e.to_string(),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPage;

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_success_resets_counter() {
        let mut page = MockPage::new();
        page.fail_reloads(2);
        let mut recovery = Recovery::new(3, TIMEOUT);

        assert!(matches!(
            recovery.recover(&mut page).await,
            RecoveryOutcome::Failed { attempt: 1, .. }
        ));
        assert!(matches!(
            recovery.recover(&mut page).await,
            RecoveryOutcome::Failed { attempt: 2, .. }
        ));
        assert_eq!(recovery.recover(&mut page).await, RecoveryOutcome::Recovered);
        assert_eq!(recovery.consecutive_failures(), 0);
        assert_eq!(recovery.successes(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_at_ceiling() {
        let mut page = MockPage::new();
        page.fail_everything();
        let mut recovery = Recovery::new(3, TIMEOUT);

        assert!(!recovery.recover(&mut page).await.is_terminal());
        assert!(!recovery.recover(&mut page).await.is_terminal());
        let last = recovery.recover(&mut page).await;
        assert!(matches!(last, RecoveryOutcome::Exhausted { attempts: 3, .. }));
        assert_eq!(page.count_calls("reload"), 3);

        // Never reloads past the ceiling.
        assert!(recovery.recover(&mut page).await.is_terminal());
        assert_eq!(page.count_calls("reload"), 3);
        assert_eq!(recovery.successes(), 0);
    }

    #[tokio::test]
    async fn test_closed_page_unusable() {
        let mut page = MockPage::new();
        page.close();
        let mut recovery = Recovery::new(3, TIMEOUT);
        assert_eq!(recovery.recover(&mut page).await, RecoveryOutcome::PageUnusable);
        assert!(!page.was_called("reload"));
    }

    #[tokio::test]
    async fn test_ceiling_of_one() {
        let mut page = MockPage::new();
        page.fail_reloads(1);
        let mut recovery = Recovery::new(1, TIMEOUT);
        assert!(recovery.recover(&mut page).await.is_terminal());
    }
}
