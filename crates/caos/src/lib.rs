//! Caos: seeded chaos-monkey and adversarial fuzzing for live web UIs
//!
//! A chaos run drives one page with randomly chosen actions until its budget
//! (an action count or a wall-clock duration) is used up, recording every
//! action, every failure and every uncaught page error. All randomness comes
//! from one 32-bit seed, so a failing run can be repeated exactly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       CAOS Architecture                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ RunConfig  │    │ Engine     │    │ PageDriver │            │
//! │   │ + Seed     │───►│ loop +     │───►│ (chromium  │            │
//! │   │            │    │ executor   │    │  or mock)  │            │
//! │   └────────────┘    └─────┬──────┘    └────────────┘            │
//! │                           │ recovery, error capture             │
//! │                           ▼                                     │
//! │                     ┌────────────┐                              │
//! │                     │ RunResult  │──► defect report / summary   │
//! │                     └────────────┘                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use caos::{run_chaos_monkey, MockPage, RunConfig};
//!
//! # async fn example() -> caos::CaosResult<()> {
//! let mut page = MockPage::new();
//! page.add_button("save", "Save");
//! let result = run_chaos_monkey(&mut page, RunConfig::monkey().with_seed(12345_u32), 13).await?;
//! assert!(result.passed());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod action;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::doc_markdown
)]
mod browser;
mod capture;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod config;
#[allow(clippy::missing_errors_doc, clippy::cast_possible_truncation)]
mod driver;
#[allow(
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
mod engine;
mod exclusion;
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap
)]
mod executor;
/// Scriptable in-memory page for tests and examples
#[allow(clippy::missing_const_for_fn, clippy::must_use_candidate)]
pub mod mock;
mod payloads;
mod recovery;
mod report;
mod result;
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap
)]
mod rng;
mod values;

pub use action::{selectors, ActionKind, DemonAction, Mode, MonkeyAction, WeightedDemonAction};
#[cfg(feature = "browser")]
pub use browser::{ChromiumBrowser, ChromiumPage};
pub use browser::{key_definition, BrowserConfig, KeyDefinition, ELEMENT_ID_ATTRIBUTE};
pub use capture::{ErrorSink, ErrorSubscription, NoiseFilter};
pub use config::{ActionCallback, Budget, PlannedRun, RunConfig, RunOverrides, RunPlan};
pub use driver::{truncate, ElementHandle, PageDriver, Screenshot, Viewport};
pub use engine::{
    run, run_chaos_monkey, run_chaos_monkey_for_duration, run_demon, run_demon_for_duration,
};
pub use exclusion::{ExclusionSet, DEFAULT_EXCLUDED_SELECTORS, EXCLUDE_ATTRIBUTE};
pub use executor::{demon_step, monkey_step, BestEffort, Step, NAVIGATION_KEYS};
pub use mock::MockPage;
pub use payloads::{
    corpus_size, generate_adversarial_input, AdversarialInput, PayloadCategory,
    ADVERSARIAL_PAYLOADS,
};
pub use recovery::{Recovery, RecoveryOutcome};
pub use report::{
    format_batch_summary, format_defect_report, ActionOutcome, ActionRecord, RunResult, RunStatus,
    BATCH_ERRORS_PER_RUN, DEFAULT_TRAILING_ACTIONS,
};
pub use result::{CaosError, CaosResult};
pub use rng::{Rng, Seed};
pub use values::{value_for, FieldKind};
