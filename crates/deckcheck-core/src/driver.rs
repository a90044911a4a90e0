//! Slide driver trait definitions
//!
//! These traits define the renderer-agnostic browser abstraction:
//! - `SlideDriver`: opens a target and hands out a `DriverHandle`
//! - `DriverHandle`: navigation, inspection and capture for one loaded
//!   presentation, scoped to a single `load`/`close` pair
//!
//! Both are async and object-safe. A scripted in-memory implementation is
//! provided for testing via the `fakes` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::model::{Rect, SlideSnapshot, Viewport};

/// Default bounded wait for the renderer's ready signal.
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 10_000;

/// Default settle delay after navigating to a slide.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

/// Upper bound accepted for the settle delay.
pub const MAX_SETTLE_DELAY_MS: u64 = 10_000;

/// How a loaded presentation can be navigated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationMode {
    /// The renderer exposes a jump-to-index API.
    Direct,
    /// Only relative key stepping is available; the caller tracks the
    /// current index itself.
    Stepping,
}

/// Timing options shared by all driver implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverOptions {
    pub load_timeout_ms: u64,
    pub settle_delay_ms: u64,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl DriverOptions {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Settle delay, clamped to [`MAX_SETTLE_DELAY_MS`].
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms.min(MAX_SETTLE_DELAY_MS))
    }
}

/// Opens presentations.
///
/// Implementations hold no per-presentation state: every `load` creates an
/// independent browser context, so one driver can serve concurrent runs.
#[async_trait]
pub trait SlideDriver: Send + Sync {
    /// Open `target` at `viewport` and wait (bounded) for the renderer's
    /// ready signal.
    ///
    /// Fails with `LoadTimeout` if readiness never arrives and `Navigation`
    /// for network or file errors.
    async fn load(&self, target: &str, viewport: Viewport) -> Result<Box<dyn DriverHandle>>;
}

/// A loaded presentation.
///
/// Guarantees:
/// - `inspect` and `screenshot` never mutate page state.
/// - `close` is idempotent; after it, every other operation fails with
///   `RendererNotReady`.
#[async_trait]
pub trait DriverHandle: Send {
    /// Name of the renderer integration in use (e.g. `reveal`).
    fn renderer(&self) -> &str;

    /// Whether direct jumps are supported.
    fn navigation_mode(&self) -> NavigationMode;

    /// Delay the caller must wait after a relative step.
    fn settle_delay(&self) -> Duration;

    /// Total number of slides reported by the renderer.
    async fn total_slides(&mut self) -> Result<usize>;

    /// Jump directly to slide `index`, then wait the settle delay.
    ///
    /// Fails with `IndexOutOfRange` outside `[0, total_slides())`.
    async fn go_to(&mut self, index: usize) -> Result<()>;

    /// Inspect the current slide. Selectors matching nothing yield empty
    /// entries, never errors.
    async fn inspect(&mut self, selectors: &BTreeSet<String>) -> Result<SlideSnapshot>;

    /// Capture the viewport, or `clip`, to `path`.
    async fn screenshot(&mut self, path: &Path, clip: Option<Rect>) -> Result<()>;

    /// Dispatch one discrete keyboard event.
    async fn send_key(&mut self, key: &str) -> Result<()>;

    /// Release the browser context.
    async fn close(&mut self) -> Result<()>;
}
