//! Scriptable in-memory page for exercising the engine without a browser.
//!
//! Elements are registered under the exact selector strings the executor
//! queries (see [`crate::action::selectors`]); `matches` answers from the
//! selectors an element was marked with. Failures, overlays, page errors and
//! a dead page can all be scripted, and every call lands in a history.

use crate::action::selectors;
use crate::capture::{ErrorSink, ErrorSubscription};
use crate::driver::{ElementHandle, PageDriver, Screenshot, Viewport};
use crate::result::{CaosError, CaosResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct MockElement {
    handle: ElementHandle,
    selectors: HashSet<String>,
    option_labels: Vec<String>,
}

/// In-memory page driver
#[derive(Debug, Default)]
pub struct MockPage {
    elements: Vec<MockElement>,
    viewport: Viewport,
    /// Current URL
    pub current_url: String,
    /// Every call, in order, as `op` or `op:detail`
    pub call_history: Vec<String>,
    /// Text sent through `type_text`
    pub typed: Vec<String>,
    /// Text sent through `insert_text`
    pub inserted: Vec<String>,
    /// Values written by `fill`
    pub filled: Vec<(String, String)>,
    /// Successful reloads
    pub reload_count: u32,
    fail_all: bool,
    failing_ops: HashSet<String>,
    reload_failures: u32,
    intercepted_clicks: u32,
    closed: bool,
    close_after_calls: Option<usize>,
    latency: Duration,
    action_timeout: Option<Duration>,
    error_on_click: Option<String>,
    pending_errors: Vec<String>,
    sink: Option<ErrorSink>,
    subscribed: Arc<AtomicBool>,
}

impl MockPage {
    /// Empty page with the default viewport
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_url: "about:blank".to_string(),
            ..Self::default()
        }
    }

    /// Set viewport size
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Viewport::new(width, height);
        self
    }

    /// Delay every interaction by `latency`
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Register an element under a query selector
    pub fn add_element(&mut self, selector: &str, handle: ElementHandle) {
        if let Some(existing) = self.elements.iter_mut().find(|e| e.handle.id == handle.id) {
            existing.selectors.insert(selector.to_string());
            return;
        }
        let option_labels = (0..handle.option_count)
            .map(|i| format!("Option {}", i + 1))
            .collect();
        self.elements.push(MockElement {
            handle,
            selectors: HashSet::from([selector.to_string()]),
            option_labels,
        });
    }

    /// Make `matches(element, selector)` true for the element
    pub fn mark_matching(&mut self, id: &str, selector: &str) {
        if let Some(e) = self.elements.iter_mut().find(|e| e.handle.id == id) {
            e.selectors.insert(selector.to_string());
        }
    }

    /// Register a visible button
    pub fn add_button(&mut self, id: &str, text: &str) -> ElementHandle {
        let handle = ElementHandle::new(id, "button").with_text(text);
        self.add_element(selectors::BUTTONS, handle.clone());
        self.add_element(selectors::HOVERABLE, handle.clone());
        handle
    }

    /// Register a visible input of the given type
    pub fn add_input(&mut self, id: &str, input_type: &str) -> ElementHandle {
        let handle = ElementHandle::new(id, "input")
            .with_input_type(input_type)
            .with_name(id);
        self.add_element(selectors::INPUTS, handle.clone());
        self.add_element(selectors::HOVERABLE, handle.clone());
        handle
    }

    /// Register a visible link
    pub fn add_link(&mut self, id: &str, text: &str) -> ElementHandle {
        let handle = ElementHandle::new(id, "a").with_text(text);
        self.add_element(selectors::LINKS, handle.clone());
        self.add_element(selectors::HOVERABLE, handle.clone());
        handle
    }

    /// Register a select box with `options` options
    pub fn add_select(&mut self, id: &str, options: usize) -> ElementHandle {
        let handle = ElementHandle::new(id, "select").with_options(options);
        self.add_element(selectors::SELECTS, handle.clone());
        self.add_element(selectors::HOVERABLE, handle.clone());
        handle
    }

    /// Register a `data-chaos-target` element
    pub fn add_chaos_target(&mut self, id: &str, text: &str) -> ElementHandle {
        let handle = ElementHandle::new(id, "div").with_text(text);
        self.add_element(selectors::CHAOS_TARGETS, handle.clone());
        self.add_element(selectors::HOVERABLE, handle.clone());
        handle
    }

    /// Every interaction and reload fails
    pub fn fail_everything(&mut self) {
        self.fail_all = true;
    }

    /// One operation (`click`, `fill`, `mouse_click`, ...) always fails
    pub fn fail_op(&mut self, op: &str) {
        self.failing_ops.insert(op.to_string());
    }

    /// The next `count` reloads fail
    pub fn fail_reloads(&mut self, count: u32) {
        self.reload_failures = count;
    }

    /// The next `count` element clicks hit an overlay
    pub fn intercept_clicks(&mut self, count: u32) {
        self.intercepted_clicks = count;
    }

    /// Raise `message` on the page's error channel after every element click
    pub fn error_on_click(&mut self, message: &str) {
        self.error_on_click = Some(message.to_string());
    }

    /// Raise a page error now (queued until someone subscribes)
    pub fn raise_page_error(&mut self, message: &str) {
        match self.sink {
            Some(ref sink) if self.subscribed.load(Ordering::SeqCst) => {
                let _ = sink.send(message.to_string());
            }
            _ => self.pending_errors.push(message.to_string()),
        }
    }

    /// The page dies immediately
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// The page dies once `calls` driver calls have been made
    pub fn close_after(&mut self, calls: usize) {
        self.close_after_calls = Some(calls);
    }

    /// Whether an error subscription is currently attached
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    /// Timeout most recently set by the engine
    #[must_use]
    pub const fn action_timeout(&self) -> Option<Duration> {
        self.action_timeout
    }

    /// Number of calls whose history entry starts with `op`
    #[must_use]
    pub fn count_calls(&self, op: &str) -> usize {
        self.call_history
            .iter()
            .filter(|c| c.split(':').next() == Some(op))
            .count()
    }

    /// Check if a method was called
    #[must_use]
    pub fn was_called(&self, op: &str) -> bool {
        self.count_calls(op) > 0
    }

    async fn interact(&mut self, op: &str, detail: &str) -> CaosResult<()> {
        if detail.is_empty() {
            self.call_history.push(op.to_string());
        } else {
            self.call_history.push(format!("{op}:{detail}"));
        }
        if let Some(limit) = self.close_after_calls {
            if self.call_history.len() > limit {
                self.closed = true;
            }
        }
        if self.closed {
            return Err(CaosError::PageClosed {
                message: "mock page closed".to_string(),
            });
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_all || self.failing_ops.contains(op) {
            return Err(CaosError::interaction(format!("mock {op} failed")));
        }
        Ok(())
    }

    fn find(&self, element: &ElementHandle) -> CaosResult<&MockElement> {
        self.elements
            .iter()
            .find(|e| e.handle.id == element.id)
            .ok_or_else(|| CaosError::ElementDetached {
                id: element.id.clone(),
            })
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn navigate(&mut self, url: &str) -> CaosResult<()> {
        self.interact("navigate", url).await?;
        self.current_url = url.to_string();
        Ok(())
    }

    async fn query_all(&mut self, selector: &str) -> CaosResult<Vec<ElementHandle>> {
        self.interact("query_all", selector).await?;
        Ok(self
            .elements
            .iter()
            .filter(|e| e.selectors.contains(selector))
            .map(|e| e.handle.clone())
            .collect())
    }

    async fn click(&mut self, element: &ElementHandle) -> CaosResult<()> {
        self.interact("click", &element.id).await?;
        self.find(element)?;
        if self.intercepted_clicks > 0 {
            self.intercepted_clicks -= 1;
            return Err(CaosError::ClickIntercepted {
                target: element.describe(),
                blocker: "div.modal-backdrop".to_string(),
            });
        }
        if let Some(message) = self.error_on_click.clone() {
            self.raise_page_error(&message);
        }
        Ok(())
    }

    async fn hover(&mut self, element: &ElementHandle) -> CaosResult<()> {
        self.interact("hover", &element.id).await?;
        self.find(element).map(|_| ())
    }

    async fn fill(&mut self, element: &ElementHandle, value: &str) -> CaosResult<()> {
        self.interact("fill", &element.id).await?;
        self.find(element)?;
        self.filled.push((element.id.clone(), value.to_string()));
        Ok(())
    }

    async fn select_option(
        &mut self,
        element: &ElementHandle,
        index: usize,
    ) -> CaosResult<String> {
        self.interact("select_option", &element.id).await?;
        let found = self.find(element)?;
        found
            .option_labels
            .get(index)
            .cloned()
            .ok_or_else(|| CaosError::interaction(format!("option {index} out of range")))
    }

    async fn mouse_click(&mut self, x: f64, y: f64, click_count: u32) -> CaosResult<()> {
        self.interact("mouse_click", &format!("{x:.0},{y:.0}x{click_count}"))
            .await
    }

    async fn mouse_wheel(&mut self, delta_x: f64, delta_y: f64) -> CaosResult<()> {
        self.interact("mouse_wheel", &format!("{delta_x:.0},{delta_y:.0}"))
            .await
    }

    async fn press_key(&mut self, key: &str) -> CaosResult<()> {
        self.interact("press_key", key).await
    }

    async fn type_text(&mut self, text: &str) -> CaosResult<()> {
        self.interact("type_text", "").await?;
        self.typed.push(text.to_string());
        Ok(())
    }

    async fn insert_text(&mut self, text: &str) -> CaosResult<()> {
        self.interact("insert_text", "").await?;
        self.inserted.push(text.to_string());
        Ok(())
    }

    async fn matches(&mut self, element: &ElementHandle, selector: &str) -> CaosResult<bool> {
        if self.closed {
            return Err(CaosError::PageClosed {
                message: "mock page closed".to_string(),
            });
        }
        Ok(self
            .elements
            .iter()
            .find(|e| e.handle.id == element.id)
            .is_some_and(|e| e.selectors.contains(selector)))
    }

    async fn subscribe_errors(&mut self) -> CaosResult<ErrorSubscription> {
        self.interact("subscribe_errors", "").await?;
        let flag = Arc::clone(&self.subscribed);
        let (sink, subscription) =
            ErrorSubscription::channel(move || flag.store(false, Ordering::SeqCst));
        self.subscribed.store(true, Ordering::SeqCst);
        for message in self.pending_errors.drain(..) {
            let _ = sink.send(message);
        }
        self.sink = Some(sink);
        Ok(subscription)
    }

    async fn screenshot(&mut self) -> CaosResult<Screenshot> {
        self.call_history.push("screenshot".to_string());
        if self.closed {
            return Err(CaosError::ScreenshotError {
                message: "mock page closed".to_string(),
            });
        }
        Ok(Screenshot::new(
            vec![0x89, 0x50, 0x4E, 0x47],
            self.viewport.width,
            self.viewport.height,
        ))
    }

    async fn reload_until_interactive(&mut self, _timeout: Duration) -> CaosResult<()> {
        self.call_history.push("reload".to_string());
        if self.closed {
            return Err(CaosError::PageClosed {
                message: "mock page closed".to_string(),
            });
        }
        if self.fail_all || self.reload_failures > 0 {
            self.reload_failures = self.reload_failures.saturating_sub(1);
            return Err(CaosError::ReloadError {
                message: "mock reload failed".to_string(),
            });
        }
        self.reload_count += 1;
        Ok(())
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn set_action_timeout(&mut self, timeout: Duration) {
        self.action_timeout = Some(timeout);
    }
}
