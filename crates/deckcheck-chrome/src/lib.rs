//! Chrome-backed slide driver for deckcheck.
//!
//! Drives a local Chrome/Chromium over the DevTools Protocol
//! (`chromiumoxide`) and adapts to the presentation framework found on the
//! page:
//!
//! - **reveal.js**: direct navigation via `Reveal.slide`
//! - **Slidev**: direct navigation via `__slidev__.nav.go`
//! - **Marp**: no jump API, degraded key stepping
//!
//! Browser-backed tests need a local Chrome and are `#[ignore]`d; run them
//! with `cargo test -p deckcheck-chrome -- --ignored`.

mod driver;
mod renderer;
mod script;
mod target;

pub use driver::{ChromeConfig, ChromeDriver, ChromeHandle};
pub use renderer::{Renderer, PROBE_ORDER};
pub use script::inspect_script;
pub use target::resolve_target;
