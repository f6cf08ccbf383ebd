//! Action catalogs for both run modes.
//!
//! Each mode has a closed set of action kinds. Adding an action means adding
//! a variant here and its handler in [`crate::executor`]; dispatch is a single
//! exhaustive `match`, never a lookup by name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CSS selectors the benign executor queries
pub mod selectors {
    /// Elements tagged as deliberate chaos targets (fast path)
    pub const CHAOS_TARGETS: &str = "[data-chaos-target]";
    /// Button-like controls
    pub const BUTTONS: &str =
        "button, [role=\"button\"], input[type=\"submit\"], input[type=\"button\"]";
    /// Links with a destination
    pub const LINKS: &str = "a[href]";
    /// Text-entry fields
    pub const INPUTS: &str = "input:not([type=\"hidden\"]):not([type=\"file\"]):not([type=\"submit\"]):not([type=\"button\"]):not([type=\"checkbox\"]):not([type=\"radio\"]), textarea";
    /// Native select boxes
    pub const SELECTS: &str = "select";
    /// Anything worth hovering
    pub const HOVERABLE: &str =
        "button, a[href], input, select, textarea, [role=\"button\"], [data-chaos-target], [title]";
}

/// Benign "chaos monkey" action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MonkeyAction {
    /// Click an element tagged `data-chaos-target`
    ClickTarget,
    /// Click a visible button
    ClickButton,
    /// Click a visible link
    ClickLink,
    /// Fill a visible input with a type-appropriate value
    FillInput,
    /// Choose a `<select>` option
    SelectOption,
    /// Wheel-scroll the page
    Scroll,
    /// Hover a visible control
    Hover,
    /// Press a navigation or control key
    PressKey,
    /// Escape pressed after an overlay intercepted a click; recorded, never drawn
    #[serde(rename = "modal-dismiss")]
    DismissModal,
}

impl MonkeyAction {
    /// Drawable catalog, in draw order
    pub const ALL: [Self; 8] = [
        Self::ClickTarget,
        Self::ClickButton,
        Self::ClickLink,
        Self::FillInput,
        Self::SelectOption,
        Self::Scroll,
        Self::Hover,
        Self::PressKey,
    ];

    /// Kebab-case name used in logs and reports
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClickTarget => "click-target",
            Self::ClickButton => "click-button",
            Self::ClickLink => "click-link",
            Self::FillInput => "fill-input",
            Self::SelectOption => "select-option",
            Self::Scroll => "scroll",
            Self::Hover => "hover",
            Self::PressKey => "press-key",
            Self::DismissModal => "modal-dismiss",
        }
    }
}

/// Adversarial "demon" action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DemonAction {
    /// 3-10 clicks at one random viewport point
    RapidClick,
    /// A genuine double-click at a random point
    DoubleClick,
    /// Click, type one corpus payload, press Enter
    FuzzInput,
    /// Click, then insert 1,000-10,000 repeated characters in one edit
    PasteBomb,
    /// 5-15 Tab presses
    FocusSpam,
}

impl DemonAction {
    /// Full catalog
    pub const ALL: [Self; 5] = [
        Self::RapidClick,
        Self::DoubleClick,
        Self::FuzzInput,
        Self::PasteBomb,
        Self::FocusSpam,
    ];

    /// Default selection weights
    pub const DEFAULT_WEIGHTS: [(Self, u32); 5] = [
        (Self::RapidClick, 3),
        (Self::DoubleClick, 2),
        (Self::FuzzInput, 3),
        (Self::PasteBomb, 1),
        (Self::FocusSpam, 1),
    ];

    /// Kebab-case name used in logs and reports
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RapidClick => "rapid-click",
            Self::DoubleClick => "double-click",
            Self::FuzzInput => "fuzz-input",
            Self::PasteBomb => "paste-bomb",
            Self::FocusSpam => "focus-spam",
        }
    }
}

/// Demon action with its selection weight, written `kind` or `kind:weight`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WeightedDemonAction {
    /// Action drawn
    pub action: DemonAction,
    /// Relative selection weight
    pub weight: u32,
}

impl WeightedDemonAction {
    /// Action with an explicit weight
    #[must_use]
    pub const fn new(action: DemonAction, weight: u32) -> Self {
        Self { action, weight }
    }
}

impl From<DemonAction> for WeightedDemonAction {
    fn from(action: DemonAction) -> Self {
        Self::new(action, 1)
    }
}

impl From<(DemonAction, u32)> for WeightedDemonAction {
    fn from((action, weight): (DemonAction, u32)) -> Self {
        Self::new(action, weight)
    }
}

impl fmt::Display for WeightedDemonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weight == 1 {
            f.write_str(self.action.as_str())
        } else {
            write!(f, "{}:{}", self.action, self.weight)
        }
    }
}

impl FromStr for WeightedDemonAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((name, weight)) = s.split_once(':') else {
            return s.parse::<DemonAction>().map(Self::from);
        };
        let weight = weight
            .parse::<u32>()
            .map_err(|_| format!("Invalid weight in demon action: {s}"))?;
        Ok(Self::new(name.parse()?, weight))
    }
}

impl TryFrom<String> for WeightedDemonAction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WeightedDemonAction> for String {
    fn from(value: WeightedDemonAction) -> Self {
        value.to_string()
    }
}

/// Run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Benign roaming
    Monkey,
    /// Adversarial fuzzing
    Demon,
}

impl Mode {
    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monkey => "monkey",
            Self::Demon => "demon",
        }
    }
}

/// Any recorded action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionKind {
    /// Benign action
    Monkey(MonkeyAction),
    /// Adversarial action
    Demon(DemonAction),
}

impl ActionKind {
    /// Kebab-case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monkey(a) => a.as_str(),
            Self::Demon(a) => a.as_str(),
        }
    }
}

impl From<MonkeyAction> for ActionKind {
    fn from(action: MonkeyAction) -> Self {
        Self::Monkey(action)
    }
}

impl From<DemonAction> for ActionKind {
    fn from(action: DemonAction) -> Self {
        Self::Demon(action)
    }
}

macro_rules! display_via_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_via_as_str!(MonkeyAction, DemonAction, Mode, ActionKind);

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monkey" | "chaos" | "chaos-monkey" => Ok(Self::Monkey),
            "demon" | "adversarial" => Ok(Self::Demon),
            _ => Err(format!("Unknown mode: {s}")),
        }
    }
}

impl FromStr for MonkeyAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("Unknown monkey action: {s}"))
    }
}

impl FromStr for DemonAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("Unknown demon action: {s}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_modal_dismiss_not_drawable() {
        assert!(!MonkeyAction::ALL.contains(&MonkeyAction::DismissModal));
        assert_eq!(MonkeyAction::DismissModal.to_string(), "modal-dismiss");
    }

    #[test]
    fn test_names_parse_back() {
        for action in MonkeyAction::ALL {
            assert_eq!(action.as_str().parse::<MonkeyAction>().unwrap(), action);
        }
        for action in DemonAction::ALL {
            assert_eq!(action.as_str().parse::<DemonAction>().unwrap(), action);
        }
        assert!("teleport".parse::<DemonAction>().is_err());
    }

    #[test]
    fn test_mode_aliases() {
        assert_eq!("chaos-monkey".parse::<Mode>().unwrap(), Mode::Monkey);
        assert_eq!("ADVERSARIAL".parse::<Mode>().unwrap(), Mode::Demon);
        assert!("gremlin".parse::<Mode>().is_err());
    }

    #[test]
    fn test_action_kind_serde() {
        let kind: ActionKind = DemonAction::FuzzInput.into();
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"fuzz-input\"");
        let back: ActionKind = serde_json::from_str("\"click-button\"").unwrap();
        assert_eq!(back, ActionKind::Monkey(MonkeyAction::ClickButton));
    }

    #[test]
    fn test_weighted_demon_action_syntax() {
        let plain: WeightedDemonAction = "fuzz-input".parse().unwrap();
        assert_eq!(plain, WeightedDemonAction::new(DemonAction::FuzzInput, 1));
        assert_eq!(plain.to_string(), "fuzz-input");

        let heavy: WeightedDemonAction = "rapid-click:3".parse().unwrap();
        assert_eq!(heavy, WeightedDemonAction::new(DemonAction::RapidClick, 3));
        assert_eq!(heavy.to_string(), "rapid-click:3");

        assert!("rapid-click:many".parse::<WeightedDemonAction>().is_err());
        assert!("meteor:2".parse::<WeightedDemonAction>().is_err());
    }

    #[test]
    fn test_weighted_demon_action_serde() {
        let list: Vec<WeightedDemonAction> =
            serde_json::from_str(r#"["fuzz-input", "paste-bomb:4"]"#).unwrap();
        assert_eq!(list[1], WeightedDemonAction::new(DemonAction::PasteBomb, 4));
        assert_eq!(
            serde_json::to_string(&list).unwrap(),
            r#"["fuzz-input","paste-bomb:4"]"#
        );
    }

    #[test]
    fn test_default_weights_cover_catalog() {
        for action in DemonAction::ALL {
            assert!(DemonAction::DEFAULT_WEIGHTS.iter().any(|(a, w)| *a == action && *w > 0));
        }
    }
}
