//! PageDriver - the narrow page automation handle a chaos run consumes.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  PageDriver (trait)                                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────┐        ┌────────────────────────┐  │
//! │  │  ChromiumPage        │        │  MockPage              │  │
//! │  │  (feature "browser") │        │  (unit tests)          │  │
//! │  │  CDP via             │        │  scripted elements,    │  │
//! │  │  chromiumoxide       │        │  failures, page errors │  │
//! │  └──────────────────────┘        └────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A run owns its driver exclusively for its whole duration, so every
//! interaction takes `&mut self` and no two operations are ever in flight at
//! once.

use crate::capture::ErrorSubscription;
use crate::result::CaosResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Snapshot of one element returned by a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-assigned identifier, stable until the next reload
    pub id: String,
    /// Lowercase tag name
    pub tag_name: String,
    /// Visible text, trimmed
    pub text_content: Option<String>,
    /// Accessible label: aria-label, title or placeholder
    pub label: Option<String>,
    /// `type` attribute for inputs
    pub input_type: Option<String>,
    /// `name` attribute
    pub name: Option<String>,
    /// Rendered with a non-empty box and not hidden by style
    pub visible: bool,
    /// Not disabled and not aria-disabled
    pub enabled: bool,
    /// Number of `<option>` children for selects
    pub option_count: usize,
}

impl ElementHandle {
    /// Create a visible, enabled element handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into().to_lowercase(),
            text_content: None,
            label: None,
            input_type: None,
            name: None,
            visible: true,
            enabled: true,
            option_count: 0,
        }
    }

    /// Set the visible text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    /// Set the accessible label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the input type
    #[must_use]
    pub fn with_input_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into().to_lowercase());
        self
    }

    /// Set the name attribute
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the option count
    #[must_use]
    pub const fn with_options(mut self, count: usize) -> Self {
        self.option_count = count;
        self
    }

    /// Mark hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mark disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Eligible for interaction at all (visibility and disabled checks)
    #[must_use]
    pub const fn is_interactable(&self) -> bool {
        self.visible && self.enabled
    }

    /// Short human-readable description for action logs
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = self.tag_name.clone();
        if let Some(ref t) = self.input_type {
            out.push_str(&format!("[type={t}]"));
        }
        if let Some(ref name) = self.name {
            out.push_str(&format!("[name={name}]"));
        }
        let text = self
            .text_content
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.label.as_deref());
        if let Some(text) = text {
            out.push_str(&format!(" \"{}\"", truncate(text, 40)));
        }
        out
    }
}

/// Viewport size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Viewport {
    /// Create a viewport
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Center point
    #[must_use]
    pub fn center(self) -> (f64, f64) {
        (f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

/// Screenshot data with metadata
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// Raw PNG data
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Timestamp when screenshot was taken
    pub timestamp: SystemTime,
}

impl Screenshot {
    /// Create a new screenshot
    #[must_use]
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: SystemTime::now(),
        }
    }

    /// Check if screenshot has data
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty() && self.width > 0 && self.height > 0
    }
}

/// Page automation handle consumed by the chaos engine
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to URL
    async fn navigate(&mut self, url: &str) -> CaosResult<()>;

    /// All elements matching a CSS selector, with visibility and enabled state
    async fn query_all(&mut self, selector: &str) -> CaosResult<Vec<ElementHandle>>;

    /// Click the element's center; an overlapping overlay yields `ClickIntercepted`
    async fn click(&mut self, element: &ElementHandle) -> CaosResult<()>;

    /// Move the pointer over the element
    async fn hover(&mut self, element: &ElementHandle) -> CaosResult<()>;

    /// Replace the element's value with `value`
    async fn fill(&mut self, element: &ElementHandle, value: &str) -> CaosResult<()>;

    /// Choose the option at `index`; returns the chosen option's label
    async fn select_option(&mut self, element: &ElementHandle, index: usize)
        -> CaosResult<String>;

    /// Raw mouse click at viewport coordinates; `click_count` 2 is a double-click
    async fn mouse_click(&mut self, x: f64, y: f64, click_count: u32) -> CaosResult<()>;

    /// Wheel scroll by the given deltas
    async fn mouse_wheel(&mut self, delta_x: f64, delta_y: f64) -> CaosResult<()>;

    /// Press and release one named key (`Tab`, `Enter`, `Escape`, ...)
    async fn press_key(&mut self, key: &str) -> CaosResult<()>;

    /// Type text keystroke by keystroke into the focused element
    async fn type_text(&mut self, text: &str) -> CaosResult<()>;

    /// Insert text as one atomic edit, like a clipboard paste
    async fn insert_text(&mut self, text: &str) -> CaosResult<()>;

    /// Whether the element or one of its ancestors matches `selector`
    async fn matches(&mut self, element: &ElementHandle, selector: &str) -> CaosResult<bool>;

    /// Attach to the page's uncaught-error channel
    async fn subscribe_errors(&mut self) -> CaosResult<ErrorSubscription>;

    /// Capture a screenshot
    async fn screenshot(&mut self) -> CaosResult<Screenshot>;

    /// Reload and wait until the document is interactive, bounded by `timeout`
    async fn reload_until_interactive(&mut self, timeout: Duration) -> CaosResult<()>;

    /// Current viewport size
    fn viewport(&self) -> Viewport;

    /// Whether the page or browser is gone
    fn is_closed(&self) -> bool;

    /// Bound every subsequent single interaction by `timeout`
    fn set_action_timeout(&mut self, timeout: Duration);
}

/// Truncate to at most `max` characters on a char boundary, appending `…`
#[must_use]
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    mod element_handle_tests {
        use super::*;

        #[test]
        fn test_element_handle_creation() {
            let elem = ElementHandle::new("btn-1", "BUTTON");
            assert_eq!(elem.id, "btn-1");
            assert_eq!(elem.tag_name, "button");
            assert!(elem.is_interactable());
        }

        #[test]
        fn test_hidden_and_disabled() {
            assert!(!ElementHandle::new("a", "div").hidden().is_interactable());
            assert!(!ElementHandle::new("b", "button").disabled().is_interactable());
        }

        #[test]
        fn test_describe() {
            let input = ElementHandle::new("i", "input")
                .with_input_type("Email")
                .with_name("email")
                .with_label("Your email");
            assert_eq!(input.describe(), "input[type=email][name=email] \"Your email\"");

            let button = ElementHandle::new("b", "button").with_text("Save");
            assert_eq!(button.describe(), "button \"Save\"");
        }
    }

    mod helper_tests {
        use super::*;

        #[test]
        fn test_truncate_char_boundary() {
            assert_eq!(truncate("short", 10), "short");
            assert_eq!(truncate("😀😀😀😀", 2), "😀😀…");
        }

        #[test]
        fn test_viewport_center() {
            assert_eq!(Viewport::new(800, 600).center(), (400.0, 300.0));
        }

        #[test]
        fn test_screenshot_is_valid() {
            assert!(Screenshot::new(vec![1, 2, 3], 10, 10).is_valid());
            assert!(!Screenshot::new(vec![], 10, 10).is_valid());
            assert!(!Screenshot::new(vec![1], 0, 10).is_valid());
        }
    }
}
