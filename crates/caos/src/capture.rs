//! Page error capture.
//!
//! A run subscribes to the page's uncaught-error channel when it starts and
//! holds the [`ErrorSubscription`] for its whole lifetime. Dropping the
//! subscription detaches the listener, so every exit path of the run (normal
//! completion, abort, panic unwinding) releases it and nothing leaks into the
//! next run on the same page.

use crate::result::{CaosError, CaosResult};
use regex::RegexSet;
use std::fmt;
use std::sync::OnceLock;
use tokio::sync::mpsc;

/// Sending half held by a driver's error listener
pub type ErrorSink = mpsc::UnboundedSender<String>;

/// Scoped subscription to a page's uncaught runtime errors
pub struct ErrorSubscription {
    rx: mpsc::UnboundedReceiver<String>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ErrorSubscription {
    /// Create a subscription and the sink the driver feeds.
    ///
    /// `release` runs exactly once, when the subscription is dropped.
    pub fn channel(release: impl FnOnce() + Send + 'static) -> (ErrorSink, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                rx,
                release: Some(Box::new(release)),
            },
        )
    }

    /// Take every error reported since the last drain, oldest first
    pub fn drain(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            out.push(message);
        }
        out
    }
}

impl fmt::Debug for ErrorSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSubscription")
            .field("released", &self.release.is_none())
            .finish_non_exhaustive()
    }
}

impl Drop for ErrorSubscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Browser and framework chatter that is not a defect in the application
const BENIGN_PATTERNS: &[&str] = &[
    r"(?i)ResizeObserver loop (limit exceeded|completed with undelivered notifications)",
    r"(?i)^\s*Script error\.?\s*$",
    r"(?i)Non-Error promise rejection captured",
    r"(?i)favicon\.ico",
    r"(?i)Download the React DevTools",
    r"(?i)\[(HMR|vite|webpack-dev-server)\]",
    r"(?i)net::ERR_ABORTED",
    r"(?i)AbortError: The (user|operation) (aborted|was aborted)",
    r"(?i)The play\(\) request was interrupted",
];

fn builtin_noise() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| RegexSet::new(BENIGN_PATTERNS).expect("built-in noise patterns compile"))
}

/// Filters known non-defect error messages out of a run's findings
#[derive(Debug, Clone, Default)]
pub struct NoiseFilter {
    extra: Option<RegexSet>,
}

impl NoiseFilter {
    /// Built-in patterns plus caller-supplied regular expressions
    pub fn new(extra_patterns: &[String]) -> CaosResult<Self> {
        if extra_patterns.is_empty() {
            return Ok(Self::default());
        }
        let set = RegexSet::new(extra_patterns).map_err(|e| {
            CaosError::invalid_config(format!("invalid ignore_errors pattern: {e}"))
        })?;
        Ok(Self { extra: Some(set) })
    }

    /// Whether the message is known noise
    #[must_use]
    pub fn is_noise(&self, message: &str) -> bool {
        builtin_noise().is_match(message)
            || self.extra.as_ref().is_some_and(|set| set.is_match(message))
    }

    /// Keep only messages that are findings
    #[must_use]
    pub fn findings(&self, messages: Vec<String>) -> Vec<String> {
        messages
            .into_iter()
            .filter(|m| !self.is_noise(m))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    mod subscription_tests {
        use super::*;

        #[test]
        fn test_drain_in_order() {
            let (tx, mut sub) = ErrorSubscription::channel(|| {});
            tx.send("first".to_string()).unwrap();
            tx.send("second".to_string()).unwrap();
            assert_eq!(sub.drain(), vec!["first", "second"]);
            assert!(sub.drain().is_empty());
        }

        #[test]
        fn test_release_on_drop() {
            let released = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&released);
            let (_tx, sub) = ErrorSubscription::channel(move || flag.store(true, Ordering::SeqCst));
            assert!(!released.load(Ordering::SeqCst));
            drop(sub);
            assert!(released.load(Ordering::SeqCst));
        }

        #[test]
        fn test_sink_outlives_subscription() {
            let (tx, sub) = ErrorSubscription::channel(|| {});
            drop(sub);
            assert!(tx.send("late".to_string()).is_err());
        }
    }

    mod noise_tests {
        use super::*;

        #[test]
        fn test_builtin_noise() {
            let filter = NoiseFilter::default();
            assert!(filter.is_noise("ResizeObserver loop limit exceeded"));
            assert!(filter.is_noise("Script error."));
            assert!(filter.is_noise("GET /favicon.ico 404"));
            assert!(!filter.is_noise("TypeError: Cannot read properties of undefined"));
        }

        #[test]
        fn test_extra_patterns() {
            let filter = NoiseFilter::new(&["^Analytics blocked".to_string()]).unwrap();
            assert!(filter.is_noise("Analytics blocked by client"));
            assert!(!filter.is_noise("RangeError: Invalid array length"));
        }

        #[test]
        fn test_invalid_extra_pattern() {
            let err = NoiseFilter::new(&["(".to_string()]).unwrap_err();
            assert!(matches!(err, CaosError::InvalidConfig { .. }));
        }

        #[test]
        fn test_findings() {
            let filter = NoiseFilter::default();
            let kept = filter.findings(vec![
                "ResizeObserver loop completed with undelivered notifications".to_string(),
                "ReferenceError: balance is not defined".to_string(),
            ]);
            assert_eq!(kept, vec!["ReferenceError: balance is not defined"]);
        }
    }
}
