//! Chromium page driver over the Chrome `DevTools` Protocol.
//!
//! With the `browser` feature, [`ChromiumBrowser`] launches a real Chromium
//! through `chromiumoxide` and hands out [`ChromiumPage`]s implementing
//! [`crate::PageDriver`]. Element handles are stamped into the DOM as a
//! `data-caos-id` attribute at query time, so a handle stays addressable until
//! the next reload.

use serde::{Deserialize, Serialize};

/// Attribute carrying driver-assigned element ids
pub const ELEMENT_ID_ATTRIBUTE: &str = "data-caos-id";

/// Browser launch configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run without a visible window
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// Named key: DOM `key`, DOM `code`, Windows virtual key code, produced text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDefinition {
    /// `KeyboardEvent.key`
    pub key: &'static str,
    /// `KeyboardEvent.code`
    pub code: &'static str,
    /// Windows virtual key code
    pub virtual_key: i64,
    /// Text the key inserts, if any
    pub text: Option<&'static str>,
}

const KEYS: &[KeyDefinition] = &[
    KeyDefinition { key: "Tab", code: "Tab", virtual_key: 9, text: None },
    KeyDefinition { key: "Enter", code: "Enter", virtual_key: 13, text: Some("\r") },
    KeyDefinition { key: "Escape", code: "Escape", virtual_key: 27, text: None },
    KeyDefinition { key: " ", code: "Space", virtual_key: 32, text: Some(" ") },
    KeyDefinition { key: "PageUp", code: "PageUp", virtual_key: 33, text: None },
    KeyDefinition { key: "PageDown", code: "PageDown", virtual_key: 34, text: None },
    KeyDefinition { key: "End", code: "End", virtual_key: 35, text: None },
    KeyDefinition { key: "Home", code: "Home", virtual_key: 36, text: None },
    KeyDefinition { key: "ArrowLeft", code: "ArrowLeft", virtual_key: 37, text: None },
    KeyDefinition { key: "ArrowUp", code: "ArrowUp", virtual_key: 38, text: None },
    KeyDefinition { key: "ArrowRight", code: "ArrowRight", virtual_key: 39, text: None },
    KeyDefinition { key: "ArrowDown", code: "ArrowDown", virtual_key: 40, text: None },
    KeyDefinition { key: "Backspace", code: "Backspace", virtual_key: 8, text: None },
];

/// Look up a named key (`Space` is accepted for `" "`)
#[must_use]
pub fn key_definition(name: &str) -> Option<KeyDefinition> {
    KEYS.iter()
        .find(|k| k.key == name || k.code == name)
        .copied()
}

/// Element snapshot as returned by the query script
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawElement {
    id: String,
    tag: String,
    text: Option<String>,
    label: Option<String>,
    input_type: Option<String>,
    name: Option<String>,
    visible: bool,
    enabled: bool,
    option_count: usize,
}

impl From<RawElement> for crate::driver::ElementHandle {
    fn from(raw: RawElement) -> Self {
        let mut handle = Self::new(raw.id, raw.tag).with_options(raw.option_count);
        handle.text_content = raw.text.filter(|t| !t.is_empty());
        handle.label = raw.label.filter(|t| !t.is_empty());
        handle.input_type = raw.input_type.map(|t| t.to_lowercase());
        handle.name = raw.name;
        handle.visible = raw.visible;
        handle.enabled = raw.enabled;
        handle
    }
}

/// Where a click would land, or what is in the way
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
enum ClickPoint {
    Ok { x: f64, y: f64 },
    Blocked { blocker: String },
    Detached,
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
mod scripts {
    use super::ELEMENT_ID_ATTRIBUTE;
    use crate::result::CaosResult;

    fn quoted(text: &str) -> CaosResult<String> {
        Ok(serde_json::to_string(text)?)
    }

    fn element(id: &str) -> CaosResult<String> {
        quoted(&format!("[{ELEMENT_ID_ATTRIBUTE}=\"{id}\"]"))
    }

    pub fn query_all(selector: &str) -> CaosResult<String> {
        Ok(format!(
            r##"(() => {{
  window.__caosSeq = window.__caosSeq || 0;
  return Array.from(document.querySelectorAll({sel})).map(el => {{
    let id = el.getAttribute("{attr}");
    if (!id) {{ id = "c" + (++window.__caosSeq); el.setAttribute("{attr}", id); }}
    const r = el.getBoundingClientRect();
    const s = getComputedStyle(el);
    const visible = r.width > 0 && r.height > 0 && s.visibility !== "hidden"
      && s.display !== "none" && parseFloat(s.opacity || "1") > 0;
    const isField = el instanceof HTMLInputElement || el instanceof HTMLTextAreaElement;
    const text = isField ? "" : (el.innerText || "").trim().slice(0, 200);
    return {{
      id, tag: el.tagName.toLowerCase(), text: text || null,
      label: el.getAttribute("aria-label") || el.getAttribute("title") || el.getAttribute("placeholder"),
      inputType: el.getAttribute("type"), name: el.getAttribute("name"), visible,
      enabled: !el.disabled && el.getAttribute("aria-disabled") !== "true",
      optionCount: el instanceof HTMLSelectElement ? el.options.length : 0
    }};
  }});
}})()"##,
            sel = quoted(selector)?,
            attr = ELEMENT_ID_ATTRIBUTE,
        ))
    }

    pub fn click_point(id: &str) -> CaosResult<String> {
        Ok(format!(
            r##"(() => {{
  const el = document.querySelector({el});
  if (!el || !el.isConnected) return {{ state: "detached" }};
  el.scrollIntoView({{ block: "center", inline: "center" }});
  const r = el.getBoundingClientRect();
  const x = r.left + r.width / 2, y = r.top + r.height / 2;
  const hit = document.elementFromPoint(x, y);
  if (hit && hit !== el && !el.contains(hit) && !hit.contains(el)) {{
    const cls = typeof hit.className === "string" && hit.className ? "." + hit.className.trim().split(/\s+/).join(".") : "";
    return {{ state: "blocked", blocker: hit.tagName.toLowerCase() + (hit.id ? "#" + hit.id : "") + cls }};
  }}
  return {{ state: "ok", x, y }};
}})()"##,
            el = element(id)?,
        ))
    }

    pub fn fill(id: &str, value: &str) -> CaosResult<String> {
        Ok(format!(
            r##"(() => {{
  const el = document.querySelector({el});
  if (!el) return false;
  el.focus();
  const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
  const setter = Object.getOwnPropertyDescriptor(proto, "value").set;
  setter.call(el, {value});
  el.dispatchEvent(new Event("input", {{ bubbles: true }}));
  el.dispatchEvent(new Event("change", {{ bubbles: true }}));
  return true;
}})()"##,
            el = element(id)?,
            value = quoted(value)?,
        ))
    }

    pub fn select_option(id: &str, index: usize) -> CaosResult<String> {
        Ok(format!(
            r##"(() => {{
  const el = document.querySelector({el});
  if (!el || !el.options || {index} >= el.options.length) return null;
  el.selectedIndex = {index};
  el.dispatchEvent(new Event("input", {{ bubbles: true }}));
  el.dispatchEvent(new Event("change", {{ bubbles: true }}));
  return el.options[{index}].label || el.options[{index}].value;
}})()"##,
            el = element(id)?,
        ))
    }

    pub fn matches(id: &str, selector: &str) -> CaosResult<String> {
        Ok(format!(
            "(() => {{ const el = document.querySelector({el}); return !!el && el.closest({sel}) !== null; }})()",
            el = element(id)?,
            sel = quoted(selector)?,
        ))
    }

    pub const READY_STATE: &str = "document.readyState";
}

#[cfg(feature = "browser")]
#[allow(
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::significant_drop_tightening
)]
mod cdp {
    use super::{key_definition, scripts, BrowserConfig, ClickPoint, RawElement};
    use crate::capture::ErrorSubscription;
    use crate::driver::{ElementHandle, PageDriver, Screenshot, Viewport};
    use crate::result::{CaosError, CaosResult};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
    use chromiumoxide::cdp::browser_protocol::input::{
        DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
        DispatchMouseEventType, InsertTextParams, MouseButton,
    };
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams,
    };
    use chromiumoxide::cdp::js_protocol::runtime::EventExceptionThrown;
    use chromiumoxide::error::CdpError;
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde::de::DeserializeOwned;
    use std::future::Future;
    use std::time::{Duration, Instant};
    use tokio::sync::oneshot;
    use tracing::debug;

    const READY_POLL: Duration = Duration::from_millis(50);

    /// Running Chromium with its CDP handler task
    #[derive(Debug)]
    pub struct ChromiumBrowser {
        config: BrowserConfig,
        inner: CdpBrowser,
        handle: tokio::task::JoinHandle<()>,
    }

    impl ChromiumBrowser {
        /// Launch a new browser instance
        pub async fn launch(config: BrowserConfig) -> CaosResult<Self> {
            let mut builder = CdpConfig::builder();

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            let cdp_config = builder
                .build()
                .map_err(|e| CaosError::BrowserLaunchError { message: e })?;

            let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(|e| {
                CaosError::BrowserLaunchError {
                    message: e.to_string(),
                }
            })?;

            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            debug!(headless = config.headless, "chromium launched");
            Ok(Self {
                config,
                inner: browser,
                handle,
            })
        }

        /// Open a blank page sized to the configured viewport
        pub async fn new_page(&self) -> CaosResult<ChromiumPage> {
            let page = self
                .inner
                .new_page("about:blank")
                .await
                .map_err(|e| CaosError::BrowserLaunchError {
                    message: e.to_string(),
                })?;
            let viewport = Viewport::new(self.config.viewport_width, self.config.viewport_height);
            page.execute(SetDeviceMetricsOverrideParams::new(
                i64::from(viewport.width),
                i64::from(viewport.height),
                1.0,
                false,
            ))
            .await
            .map_err(|e| CaosError::BrowserLaunchError {
                message: e.to_string(),
            })?;
            Ok(ChromiumPage {
                page,
                viewport,
                action_timeout: Duration::from_secs(5),
                closed: false,
            })
        }

        /// Get the browser configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }

        /// Close the browser
        pub async fn close(mut self) -> CaosResult<()> {
            let closed = self.inner.close().await;
            self.handle.abort();
            closed.map_err(|e| CaosError::BrowserLaunchError {
                message: e.to_string(),
            })?;
            Ok(())
        }
    }

    /// One Chromium tab driven over CDP
    #[derive(Debug)]
    pub struct ChromiumPage {
        page: CdpPage,
        viewport: Viewport,
        action_timeout: Duration,
        closed: bool,
    }

    fn classify(e: &CdpError) -> CaosError {
        let message = e.to_string();
        let lower = message.to_lowercase();
        if lower.contains("closed") || lower.contains("channel") || lower.contains("receiver") {
            CaosError::PageClosed { message }
        } else {
            CaosError::InteractionError { message }
        }
    }

    async fn bounded<T>(
        timeout: Duration,
        op: impl Future<Output = Result<T, CdpError>>,
    ) -> CaosResult<T> {
        match tokio::time::timeout(timeout, op).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify(&e)),
            Err(_) => Err(CaosError::Timeout {
                ms: timeout.as_millis() as u64,
            }),
        }
    }

    fn input_error(message: String) -> CaosError {
        CaosError::InteractionError { message }
    }

    impl ChromiumPage {
        fn track<T>(&mut self, result: CaosResult<T>) -> CaosResult<T> {
            if let Err(ref e) = result {
                if e.is_fatal() {
                    self.closed = true;
                }
            }
            result
        }

        async fn eval<T: DeserializeOwned>(&mut self, script: String) -> CaosResult<T> {
            let result = bounded(self.action_timeout, self.page.evaluate(script.as_str())).await;
            let value = self.track(result)?;
            value
                .into_value()
                .map_err(|e| CaosError::interaction(format!("unexpected script result: {e}")))
        }

        async fn mouse(&mut self, params: DispatchMouseEventParams) -> CaosResult<()> {
            let result = bounded(self.action_timeout, self.page.execute(params)).await;
            self.track(result).map(|_| ())
        }

        async fn key(&mut self, params: DispatchKeyEventParams) -> CaosResult<()> {
            let result = bounded(self.action_timeout, self.page.execute(params)).await;
            self.track(result).map(|_| ())
        }

        async fn press_at(&mut self, x: f64, y: f64, click_count: i64) -> CaosResult<()> {
            for kind in [
                DispatchMouseEventType::MousePressed,
                DispatchMouseEventType::MouseReleased,
            ] {
                let params = DispatchMouseEventParams::builder()
                    .r#type(kind)
                    .x(x)
                    .y(y)
                    .button(MouseButton::Left)
                    .click_count(click_count)
                    .build()
                    .map_err(input_error)?;
                self.mouse(params).await?;
            }
            Ok(())
        }

        fn ensure_open(&self) -> CaosResult<()> {
            if self.closed {
                return Err(CaosError::PageClosed {
                    message: "page closed".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PageDriver for ChromiumPage {
        async fn navigate(&mut self, url: &str) -> CaosResult<()> {
            self.ensure_open()?;
            let result = bounded(self.action_timeout, async {
                self.page.goto(url).await.map(|_| ())
            })
            .await;
            self.track(result).map_err(|e| match e {
                CaosError::PageClosed { .. } => e,
                other => CaosError::NavigationError {
                    url: url.to_string(),
                    message: other.to_string(),
                },
            })
        }

        async fn query_all(&mut self, selector: &str) -> CaosResult<Vec<ElementHandle>> {
            self.ensure_open()?;
            let raw: Vec<RawElement> = self.eval(scripts::query_all(selector)?).await?;
            Ok(raw.into_iter().map(ElementHandle::from).collect())
        }

        async fn click(&mut self, element: &ElementHandle) -> CaosResult<()> {
            self.ensure_open()?;
            match self.eval(scripts::click_point(&element.id)?).await? {
                ClickPoint::Ok { x, y } => self.press_at(x, y, 1).await,
                ClickPoint::Blocked { blocker } => Err(CaosError::ClickIntercepted {
                    target: element.describe(),
                    blocker,
                }),
                ClickPoint::Detached => Err(CaosError::ElementDetached {
                    id: element.id.clone(),
                }),
            }
        }

        async fn hover(&mut self, element: &ElementHandle) -> CaosResult<()> {
            self.ensure_open()?;
            let (x, y) = match self.eval(scripts::click_point(&element.id)?).await? {
                ClickPoint::Ok { x, y } => (x, y),
                ClickPoint::Blocked { .. } => self.viewport.center(),
                ClickPoint::Detached => {
                    return Err(CaosError::ElementDetached {
                        id: element.id.clone(),
                    })
                }
            };
            let params = DispatchMouseEventParams::builder()
                .r#type(DispatchMouseEventType::MouseMoved)
                .x(x)
                .y(y)
                .build()
                .map_err(input_error)?;
            self.mouse(params).await
        }

        async fn fill(&mut self, element: &ElementHandle, value: &str) -> CaosResult<()> {
            self.ensure_open()?;
            let filled: bool = self.eval(scripts::fill(&element.id, value)?).await?;
            if filled {
                Ok(())
            } else {
                Err(CaosError::ElementDetached {
                    id: element.id.clone(),
                })
            }
        }

        async fn select_option(
            &mut self,
            element: &ElementHandle,
            index: usize,
        ) -> CaosResult<String> {
            self.ensure_open()?;
            let label: Option<String> = self
                .eval(scripts::select_option(&element.id, index)?)
                .await?;
            label.ok_or_else(|| {
                CaosError::interaction(format!("option {index} unavailable on {}", element.id))
            })
        }

        async fn mouse_click(&mut self, x: f64, y: f64, click_count: u32) -> CaosResult<()> {
            self.ensure_open()?;
            for count in 1..=i64::from(click_count.max(1)) {
                self.press_at(x, y, count).await?;
            }
            Ok(())
        }

        async fn mouse_wheel(&mut self, delta_x: f64, delta_y: f64) -> CaosResult<()> {
            self.ensure_open()?;
            let (x, y) = self.viewport.center();
            let params = DispatchMouseEventParams::builder()
                .r#type(DispatchMouseEventType::MouseWheel)
                .x(x)
                .y(y)
                .delta_x(delta_x)
                .delta_y(delta_y)
                .build()
                .map_err(input_error)?;
            self.mouse(params).await
        }

        async fn press_key(&mut self, key: &str) -> CaosResult<()> {
            self.ensure_open()?;
            let def = key_definition(key)
                .ok_or_else(|| CaosError::interaction(format!("unknown key: {key}")))?;
            let mut down = DispatchKeyEventParams::builder()
                .r#type(DispatchKeyEventType::KeyDown)
                .key(def.key)
                .code(def.code)
                .windows_virtual_key_code(def.virtual_key);
            if let Some(text) = def.text {
                down = down.text(text);
            }
            self.key(down.build().map_err(input_error)?).await?;
            let up = DispatchKeyEventParams::builder()
                .r#type(DispatchKeyEventType::KeyUp)
                .key(def.key)
                .code(def.code)
                .windows_virtual_key_code(def.virtual_key)
                .build()
                .map_err(input_error)?;
            self.key(up).await
        }

        async fn type_text(&mut self, text: &str) -> CaosResult<()> {
            self.ensure_open()?;
            for ch in text.chars() {
                let params = DispatchKeyEventParams::builder()
                    .r#type(DispatchKeyEventType::Char)
                    .text(ch.to_string())
                    .build()
                    .map_err(input_error)?;
                self.key(params).await?;
            }
            Ok(())
        }

        async fn insert_text(&mut self, text: &str) -> CaosResult<()> {
            self.ensure_open()?;
            let result = bounded(
                self.action_timeout,
                self.page.execute(InsertTextParams::new(text)),
            )
            .await;
            self.track(result).map(|_| ())
        }

        async fn matches(&mut self, element: &ElementHandle, selector: &str) -> CaosResult<bool> {
            self.ensure_open()?;
            self.eval(scripts::matches(&element.id, selector)?).await
        }

        async fn subscribe_errors(&mut self) -> CaosResult<ErrorSubscription> {
            self.ensure_open()?;
            let mut events = self
                .page
                .event_listener::<EventExceptionThrown>()
                .await
                .map_err(|e| CaosError::CaptureError {
                    message: e.to_string(),
                })?;
            let (cancel, mut cancelled) = oneshot::channel::<()>();
            let (sink, subscription) = ErrorSubscription::channel(move || {
                let _ = cancel.send(());
            });
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = &mut cancelled => break,
                        event = events.next() => {
                            let Some(event) = event else { break };
                            let details = &event.exception_details;
                            let message = details
                                .exception
                                .as_ref()
                                .and_then(|e| e.description.clone())
                                .unwrap_or_else(|| details.text.clone());
                            if sink.send(message).is_err() {
                                break;
                            }
                        }
                    }
                }
            });
            Ok(subscription)
        }

        async fn screenshot(&mut self) -> CaosResult<Screenshot> {
            self.ensure_open()?;
            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();
            let screenshot = bounded(self.action_timeout, self.page.execute(params))
                .await
                .map_err(|e| CaosError::ScreenshotError {
                    message: e.to_string(),
                })?;

            use base64::Engine;
            let data = base64::engine::general_purpose::STANDARD
                .decode(&screenshot.data)
                .map_err(|e| CaosError::ScreenshotError {
                    message: e.to_string(),
                })?;
            Ok(Screenshot::new(data, self.viewport.width, self.viewport.height))
        }

        async fn reload_until_interactive(&mut self, timeout: Duration) -> CaosResult<()> {
            self.ensure_open()?;
            let deadline = Instant::now() + timeout;
            let result = bounded(timeout, async { self.page.reload().await.map(|_| ()) }).await;
            self.track(result).map_err(|e| match e {
                CaosError::PageClosed { .. } => e,
                other => CaosError::ReloadError {
                    message: other.to_string(),
                },
            })?;

            loop {
                let state: CaosResult<String> = self.eval(scripts::READY_STATE.to_string()).await;
                match state {
                    Ok(ref s) if s != "loading" => return Ok(()),
                    Err(e) if e.is_fatal() => return Err(e),
                    _ => {}
                }
                if Instant::now() >= deadline {
                    return Err(CaosError::ReloadError {
                        message: format!(
                            "document not interactive within {}ms",
                            timeout.as_millis()
                        ),
                    });
                }
                tokio::time::sleep(READY_POLL).await;
            }
        }

        fn viewport(&self) -> Viewport {
            self.viewport
        }

        fn is_closed(&self) -> bool {
            self.closed
        }

        fn set_action_timeout(&mut self, timeout: Duration) {
            self.action_timeout = timeout;
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::{ChromiumBrowser, ChromiumPage};
