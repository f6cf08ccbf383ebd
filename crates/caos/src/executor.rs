//! Action executor: turns a drawn action kind into page operations.
//!
//! Benign actions target real elements. Candidates come from a query, then
//! pass the visibility, enabled and exclusion checks before the RNG picks
//! one. A kind with no eligible candidate is a soft miss and the step moves
//! on to another kind.
//!
//! Adversarial actions ignore the DOM and hit raw viewport coordinates. Each
//! low-level call inside them is best-effort: a rejected call is recorded as
//! [`BestEffort::Ignored`] and the action carries on. Only a closed page, or
//! an action where every single call was rejected, surfaces as an action
//! failure.

use crate::action::{selectors, ActionKind, DemonAction, MonkeyAction};
use crate::driver::{truncate, ElementHandle, PageDriver, Viewport};
use crate::exclusion::ExclusionSet;
use crate::payloads::generate_adversarial_input;
use crate::result::{CaosError, CaosResult};
use crate::rng::Rng;
use crate::values::value_for;
use tracing::{debug, trace};

/// Keys the benign `press-key` action chooses from
pub const NAVIGATION_KEYS: &[&str] = &[
    "Tab", "Enter", "Escape", "ArrowDown", "ArrowUp", "ArrowLeft", "ArrowRight", "Space",
    "PageDown", "PageUp", "Home", "End",
];

/// Characters a paste bomb repeats
const PASTE_CHARS: &[char] = &['a', 'A', '0', '#', ' ', '€', '\u{200B}', '😀'];

/// Max payload characters echoed into action descriptions
const PAYLOAD_PREVIEW: usize = 30;

/// Outcome of one loop iteration's action
#[derive(Debug)]
pub enum Step {
    /// An action was performed
    Performed {
        /// Kind recorded (may differ from the drawn kind, e.g. modal-dismiss)
        kind: ActionKind,
        /// Human-readable description
        description: String,
    },
    /// An action failed
    Failed {
        /// Kind that failed
        kind: ActionKind,
        /// Underlying error
        error: CaosError,
    },
    /// No kind had an eligible target this iteration
    Idle,
}

/// Result of a single benign attempt
#[derive(Debug)]
enum Attempt {
    Done { kind: ActionKind, description: String },
    SoftMiss,
}

impl Attempt {
    fn done(kind: impl Into<ActionKind>, description: String) -> Self {
        Self::Done {
            kind: kind.into(),
            description,
        }
    }
}

/// Outcome of one best-effort low-level call
#[derive(Debug)]
pub enum BestEffort {
    /// Call went through
    Succeeded,
    /// Call was rejected and swallowed
    Ignored(CaosError),
}

impl BestEffort {
    /// Classify a low-level result; only fatal errors escape
    pub fn from_result(result: CaosResult<()>) -> CaosResult<Self> {
        match result {
            Ok(()) => Ok(Self::Succeeded),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Ok(Self::Ignored(e)),
        }
    }
}

/// Tally of best-effort calls inside one adversarial action
#[derive(Debug, Default)]
struct Pressure {
    succeeded: u32,
    ignored: u32,
    last_ignored: Option<CaosError>,
}

impl Pressure {
    fn record(&mut self, result: CaosResult<()>) -> CaosResult<()> {
        match BestEffort::from_result(result)? {
            BestEffort::Succeeded => self.succeeded += 1,
            BestEffort::Ignored(e) => {
                trace!(error = %e, "sub-operation ignored");
                self.ignored += 1;
                self.last_ignored = Some(e);
            }
        }
        Ok(())
    }

    fn finish(self, description: String) -> CaosResult<String> {
        if self.succeeded == 0 {
            if let Some(e) = self.last_ignored {
                return Err(CaosError::interaction(format!(
                    "all {} sub-operations rejected, last: {e}",
                    self.ignored
                )));
            }
        }
        if self.ignored > 0 {
            let total = self.succeeded + self.ignored;
            Ok(format!("{description} ({} of {total} calls ignored)", self.ignored))
        } else {
            Ok(description)
        }
    }
}

/// Draw a benign kind and perform it, trying every other kind on a soft miss
pub async fn monkey_step<D: PageDriver + ?Sized>(
    driver: &mut D,
    rng: &mut Rng,
    exclusions: &ExclusionSet,
    catalog: &[MonkeyAction],
) -> Step {
    let mut untried: Vec<MonkeyAction> = Vec::with_capacity(catalog.len());
    for action in catalog {
        if !untried.contains(action) {
            untried.push(*action);
        }
    }
    let Some(mut action) = rng.pick(catalog).copied() else {
        return Step::Idle;
    };
    loop {
        match perform_monkey(driver, rng, exclusions, action).await {
            Ok(Attempt::Done { kind, description }) => return Step::Performed { kind, description },
            Ok(Attempt::SoftMiss) => {
                debug!(action = %action, "no eligible target");
                untried.retain(|a| *a != action);
                match rng.pick(&untried) {
                    Some(next) => action = *next,
                    None => return Step::Idle,
                }
            }
            Err(error) => {
                return Step::Failed {
                    kind: action.into(),
                    error,
                }
            }
        }
    }
}

/// Draw an adversarial kind by weight and perform it
pub async fn demon_step<D: PageDriver + ?Sized>(
    driver: &mut D,
    rng: &mut Rng,
    catalog: &[(DemonAction, u32)],
) -> Step {
    let Some(action) = rng.weighted_pick(catalog).copied() else {
        return Step::Idle;
    };
    match perform_demon(driver, rng, action).await {
        Ok(description) => Step::Performed {
            kind: action.into(),
            description,
        },
        Err(error) => Step::Failed {
            kind: action.into(),
            error,
        },
    }
}

async fn perform_monkey<D: PageDriver + ?Sized>(
    driver: &mut D,
    rng: &mut Rng,
    exclusions: &ExclusionSet,
    action: MonkeyAction,
) -> CaosResult<Attempt> {
    match action {
        MonkeyAction::ClickTarget => {
            click_from(driver, rng, exclusions, action, selectors::CHAOS_TARGETS).await
        }
        MonkeyAction::ClickButton => {
            click_from(driver, rng, exclusions, action, selectors::BUTTONS).await
        }
        MonkeyAction::ClickLink => {
            click_from(driver, rng, exclusions, action, selectors::LINKS).await
        }
        MonkeyAction::FillInput => {
            let candidates = eligible(driver, exclusions, selectors::INPUTS).await?;
            let Some(element) = rng.pick(&candidates) else {
                return Ok(Attempt::SoftMiss);
            };
            let value = value_for(element, rng);
            driver.fill(element, &value).await?;
            Ok(Attempt::done(
                action,
                format!(
                    "filled {} with \"{}\"",
                    element.describe(),
                    truncate(&value, PAYLOAD_PREVIEW)
                ),
            ))
        }
        MonkeyAction::SelectOption => {
            let mut candidates = eligible(driver, exclusions, selectors::SELECTS).await?;
            candidates.retain(|e| e.option_count > 0);
            let Some(element) = rng.pick(&candidates) else {
                return Ok(Attempt::SoftMiss);
            };
            let index = rng.int(0, element.option_count as i64 - 1) as usize;
            let label = driver.select_option(element, index).await?;
            Ok(Attempt::done(
                action,
                format!("selected \"{label}\" in {}", element.describe()),
            ))
        }
        MonkeyAction::Scroll => {
            let distance = rng.int(100, 800);
            let delta = if rng.next() < 0.5 { -distance } else { distance };
            driver.mouse_wheel(0.0, delta as f64).await?;
            let direction = if delta < 0 { "up" } else { "down" };
            Ok(Attempt::done(action, format!("scrolled {direction} {distance}px")))
        }
        MonkeyAction::Hover => {
            let candidates = eligible(driver, exclusions, selectors::HOVERABLE).await?;
            let Some(element) = rng.pick(&candidates) else {
                return Ok(Attempt::SoftMiss);
            };
            driver.hover(element).await?;
            Ok(Attempt::done(action, format!("hovered {}", element.describe())))
        }
        MonkeyAction::PressKey => {
            let key = rng.pick(NAVIGATION_KEYS).copied().unwrap_or("Tab");
            driver.press_key(key).await?;
            Ok(Attempt::done(action, format!("pressed {key}")))
        }
        MonkeyAction::DismissModal => {
            driver.press_key("Escape").await?;
            Ok(Attempt::done(action, "pressed Escape".to_string()))
        }
    }
}

/// Interactable, non-excluded elements matching `selector`
async fn eligible<D: PageDriver + ?Sized>(
    driver: &mut D,
    exclusions: &ExclusionSet,
    selector: &str,
) -> CaosResult<Vec<ElementHandle>> {
    if exclusions.blocks_query(selector) {
        return Ok(Vec::new());
    }
    let found = driver.query_all(selector).await?;
    let mut out = Vec::with_capacity(found.len());
    for element in found {
        if !element.is_interactable() {
            continue;
        }
        if exclusions.is_excluded(driver, &element).await? {
            trace!(element = %element.describe(), "excluded");
            continue;
        }
        out.push(element);
    }
    Ok(out)
}

async fn click_from<D: PageDriver + ?Sized>(
    driver: &mut D,
    rng: &mut Rng,
    exclusions: &ExclusionSet,
    action: MonkeyAction,
    selector: &str,
) -> CaosResult<Attempt> {
    let candidates = eligible(driver, exclusions, selector).await?;
    let Some(element) = rng.pick(&candidates) else {
        return Ok(Attempt::SoftMiss);
    };
    match driver.click(element).await {
        Ok(()) => Ok(Attempt::done(action, format!("clicked {}", element.describe()))),
        Err(CaosError::ClickIntercepted { target, blocker }) => {
            debug!(%target, %blocker, "click intercepted, dismissing");
            driver.press_key("Escape").await?;
            Ok(Attempt::done(
                MonkeyAction::DismissModal,
                format!("pressed Escape to dismiss {blocker} covering {target}"),
            ))
        }
        Err(e) => Err(e),
    }
}

/// Random point in the inner 80% of the viewport
fn inner_point(rng: &mut Rng, viewport: Viewport) -> (f64, f64) {
    let width = f64::from(viewport.width);
    let height = f64::from(viewport.height);
    let x = width * 0.1 + rng.next() * width * 0.8;
    let y = height * 0.1 + rng.next() * height * 0.8;
    (x, y)
}

async fn perform_demon<D: PageDriver + ?Sized>(
    driver: &mut D,
    rng: &mut Rng,
    action: DemonAction,
) -> CaosResult<String> {
    let mut pressure = Pressure::default();
    let description = match action {
        DemonAction::RapidClick => {
            let (x, y) = inner_point(rng, driver.viewport());
            let clicks = rng.int(3, 10);
            for _ in 0..clicks {
                pressure.record(driver.mouse_click(x, y, 1).await)?;
            }
            format!("clicked {clicks}x at ({x:.0}, {y:.0})")
        }
        DemonAction::DoubleClick => {
            let (x, y) = inner_point(rng, driver.viewport());
            pressure.record(driver.mouse_click(x, y, 2).await)?;
            format!("double-clicked at ({x:.0}, {y:.0})")
        }
        DemonAction::FuzzInput => {
            let (x, y) = inner_point(rng, driver.viewport());
            let input = generate_adversarial_input(rng, None);
            pressure.record(driver.mouse_click(x, y, 1).await)?;
            pressure.record(driver.type_text(input.payload).await)?;
            pressure.record(driver.press_key("Enter").await)?;
            format!(
                "typed {} payload \"{}\" at ({x:.0}, {y:.0})",
                input.category,
                truncate(input.payload, PAYLOAD_PREVIEW)
            )
        }
        DemonAction::PasteBomb => {
            let (x, y) = inner_point(rng, driver.viewport());
            let length = rng.int(1_000, 10_000) as usize;
            let ch = rng.pick(PASTE_CHARS).copied().unwrap_or('a');
            let text = ch.to_string().repeat(length);
            pressure.record(driver.mouse_click(x, y, 1).await)?;
            pressure.record(driver.insert_text(&text).await)?;
            format!("pasted {length} x {ch:?} at ({x:.0}, {y:.0})")
        }
        DemonAction::FocusSpam => {
            let presses = rng.int(5, 15);
            for _ in 0..presses {
                pressure.record(driver.press_key("Tab").await)?;
            }
            format!("pressed Tab {presses}x")
        }
    };
    pressure.finish(description)
}
