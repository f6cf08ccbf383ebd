//! Exclusion set: elements a chaos run must never touch.
//!
//! The effective set is the union of a built-in registry of destructive
//! controls and whatever the caller adds. Entries are CSS selectors, checked
//! against the element and its ancestors through [`PageDriver::matches`], or
//! `text=` entries, matched case-insensitively against the element's visible
//! text and accessible label.
//!
//! Label matching is locale-bound: the built-in label patterns are English
//! and will not catch a translated "Delete" button. Tag such controls with
//! `data-chaos-exclude` instead.

use crate::driver::{ElementHandle, PageDriver};
use crate::result::{CaosError, CaosResult};
use regex::Regex;
use std::sync::OnceLock;

/// Attribute that opts any subtree out of chaos interaction
pub const EXCLUDE_ATTRIBUTE: &str = "data-chaos-exclude";

/// Built-in structural selectors for destructive or escaping controls
pub const DEFAULT_EXCLUDED_SELECTORS: &[&str] = &[
    "[data-chaos-exclude]",
    "[data-testid*=\"delete\"]",
    "[data-testid*=\"purge\"]",
    "[data-testid*=\"remove\"]",
    "[data-action=\"delete\"]",
    "[data-confirm]",
    ".btn-danger",
    ".confirm-button",
    "input[type=\"file\"]",
    "a[target=\"_blank\"]",
    "a[rel~=\"external\"]",
    "a[href^=\"mailto:\"]",
    "a[href^=\"tel:\"]",
    "a[download]",
];

const DEFAULT_LABEL_PATTERN: &str =
    r"(?i)\b(delete|remove|purge|destroy|erase|wipe|reset all|clear all|confirm|log ?out|sign ?out)\b";

fn default_label_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DEFAULT_LABEL_PATTERN).expect("built-in label pattern compiles"))
}

/// Effective exclusion set for one run
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    selectors: Vec<String>,
    labels: Vec<String>,
    use_default_labels: bool,
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self {
            selectors: DEFAULT_EXCLUDED_SELECTORS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            labels: Vec::new(),
            use_default_labels: true,
        }
    }
}

impl ExclusionSet {
    /// Defaults merged with caller entries (`text=` prefix for label matches)
    pub fn with_caller_entries(entries: &[String]) -> CaosResult<Self> {
        let mut set = Self::default();
        for entry in entries {
            set.add(entry)?;
        }
        Ok(set)
    }

    /// Add one caller entry
    pub fn add(&mut self, entry: &str) -> CaosResult<()> {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(CaosError::invalid_config("empty exclusion entry"));
        }
        if let Some(label) = entry.strip_prefix("text=") {
            let label = label.trim().to_lowercase();
            if label.is_empty() {
                return Err(CaosError::invalid_config("empty text= exclusion"));
            }
            if !self.labels.contains(&label) {
                self.labels.push(label);
            }
        } else if !self.selectors.iter().any(|s| s == entry) {
            self.selectors.push(entry.to_string());
        }
        Ok(())
    }

    /// Structural selectors in the set
    #[must_use]
    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }

    /// Whether a query selector itself was excluded by the caller
    #[must_use]
    pub fn blocks_query(&self, selector: &str) -> bool {
        self.selectors.iter().any(|s| s == selector)
    }

    /// Whether free text (visible text or label) hits an excluded label
    #[must_use]
    pub fn matches_label(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        if self.use_default_labels && default_label_pattern().is_match(text) {
            return true;
        }
        let lower = text.to_lowercase();
        self.labels.iter().any(|l| lower.contains(l.as_str()))
    }

    /// Whether the element must never be chosen
    pub async fn is_excluded<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        element: &ElementHandle,
    ) -> CaosResult<bool> {
        let texts = [element.text_content.as_deref(), element.label.as_deref()];
        if texts.into_iter().flatten().any(|t| self.matches_label(t)) {
            return Ok(true);
        }
        for selector in &self.selectors {
            if driver.matches(element, selector).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
