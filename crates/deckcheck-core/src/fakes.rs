//! Scripted in-memory slide driver (testing and dry runs)
//!
//! `ScriptedDriver` serves pre-recorded [`SlideSnapshot`]s instead of a
//! browser. It honours the full `SlideDriver`/`DriverHandle` contract,
//! including index bounds, stepping mode and idempotent close, and can
//! inject load, navigation, inspection and capture failures.
//!
//! Decks deserialize from JSON, which is what `deckcheck run --dry-run`
//! replays.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::driver::{DriverHandle, NavigationMode, SlideDriver};
use crate::error::{DeckError, Result};
use crate::model::{Rect, SlideSnapshot, Viewport};

/// PNG signature, written as a stand-in screenshot.
const PLACEHOLDER_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// One scripted slide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptedSlide {
    #[serde(flatten)]
    pub snapshot: SlideSnapshot,
    /// Make `inspect` fail on this slide with this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspection_error: Option<String>,
    /// Make `screenshot` fail on this slide with this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_error: Option<String>,
    /// Make navigating onto this slide fail with this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_error: Option<String>,
}

impl ScriptedSlide {
    pub fn new(snapshot: SlideSnapshot) -> Self {
        Self {
            snapshot,
            ..Self::default()
        }
    }

    pub fn failing_inspection(mut self, message: &str) -> Self {
        self.inspection_error = Some(message.to_string());
        self
    }

    pub fn failing_capture(mut self, message: &str) -> Self {
        self.capture_error = Some(message.to_string());
        self
    }

    pub fn failing_navigation(mut self, message: &str) -> Self {
        self.navigation_error = Some(message.to_string());
        self
    }
}

/// A scripted presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedDeck {
    #[serde(default = "default_renderer")]
    pub renderer: String,
    #[serde(default = "default_navigation")]
    pub navigation: NavigationMode,
    /// Key that advances one slide in stepping mode.
    #[serde(default = "default_next_key")]
    pub next_key: String,
    /// Simulate a renderer that never signals readiness.
    #[serde(default)]
    pub never_ready: bool,
    pub slides: Vec<ScriptedSlide>,
}

fn default_renderer() -> String {
    "scripted".to_string()
}

fn default_navigation() -> NavigationMode {
    NavigationMode::Direct
}

fn default_next_key() -> String {
    crate::runner::DEFAULT_NEXT_KEY.to_string()
}

impl ScriptedDeck {
    pub fn new(slides: Vec<ScriptedSlide>) -> Self {
        Self {
            renderer: default_renderer(),
            navigation: default_navigation(),
            next_key: default_next_key(),
            never_ready: false,
            slides,
        }
    }

    /// Deck of plain snapshots.
    pub fn from_snapshots(snapshots: Vec<SlideSnapshot>) -> Self {
        Self::new(snapshots.into_iter().map(ScriptedSlide::new).collect())
    }

    /// Only relative key stepping, like a renderer without a jump API.
    pub fn stepping(mut self) -> Self {
        self.navigation = NavigationMode::Stepping;
        self
    }

    pub fn with_renderer(mut self, renderer: &str) -> Self {
        self.renderer = renderer.to_string();
        self
    }

    pub fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a `--dry-run` fixture.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let body = std::fs::read_to_string(path).map_err(|e| {
            DeckError::Config(format!("cannot read fixture {}: {}", path.display(), e))
        })?;
        Self::from_json(&body)
    }
}

// ---------------------------------------------------------------------------
// Call log
// ---------------------------------------------------------------------------

/// Driver calls as observed by the fake, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Load { target: String, viewport: Viewport },
    GoTo(usize),
    Inspect(usize),
    Screenshot(PathBuf),
    Key(String),
    Close,
}

type CallLog = Arc<Mutex<Vec<DriverCall>>>;

fn record(log: &CallLog, call: DriverCall) {
    log.lock().unwrap_or_else(|e| e.into_inner()).push(call);
}

// ---------------------------------------------------------------------------
// ScriptedDriver
// ---------------------------------------------------------------------------

/// Driver serving scripted decks by target, with an optional fallback deck
/// for targets not registered explicitly.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    decks: HashMap<String, ScriptedDeck>,
    fallback: Option<ScriptedDeck>,
    settle_delay: Duration,
    calls: CallLog,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `deck` for every target.
    pub fn single(deck: ScriptedDeck) -> Self {
        Self {
            fallback: Some(deck),
            ..Self::default()
        }
    }

    pub fn with_deck(mut self, target: &str, deck: ScriptedDeck) -> Self {
        self.decks.insert(target.to_string(), deck);
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Snapshot of every call made through this driver and its handles.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count_calls(&self, pred: impl Fn(&DriverCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }
}

#[async_trait]
impl SlideDriver for ScriptedDriver {
    async fn load(&self, target: &str, viewport: Viewport) -> Result<Box<dyn DriverHandle>> {
        record(
            &self.calls,
            DriverCall::Load {
                target: target.to_string(),
                viewport,
            },
        );
        let deck = self
            .decks
            .get(target)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| DeckError::Navigation(format!("no scripted deck for {}", target)))?;
        if deck.never_ready {
            return Err(DeckError::LoadTimeout {
                target: target.to_string(),
                timeout_ms: 0,
            });
        }
        Ok(Box::new(ScriptedHandle {
            deck,
            current: 0,
            closed: false,
            settle_delay: self.settle_delay,
            calls: Arc::clone(&self.calls),
        }))
    }
}

/// Handle over one scripted deck.
#[derive(Debug)]
pub struct ScriptedHandle {
    deck: ScriptedDeck,
    current: usize,
    closed: bool,
    settle_delay: Duration,
    calls: CallLog,
}

impl ScriptedHandle {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(DeckError::RendererNotReady("handle is closed".to_string()));
        }
        Ok(())
    }

    fn arrive(&mut self, index: usize) -> Result<()> {
        if let Some(message) = self
            .deck
            .slides
            .get(index)
            .and_then(|s| s.navigation_error.as_ref())
        {
            return Err(DeckError::Navigation(message.clone()));
        }
        self.current = index;
        Ok(())
    }

    fn slide(&self) -> Result<&ScriptedSlide> {
        self.deck
            .slides
            .get(self.current)
            .ok_or_else(|| DeckError::IndexOutOfRange {
                index: self.current,
                total: self.deck.slides.len(),
            })
    }
}

#[async_trait]
impl DriverHandle for ScriptedHandle {
    fn renderer(&self) -> &str {
        &self.deck.renderer
    }

    fn navigation_mode(&self) -> NavigationMode {
        self.deck.navigation
    }

    fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    async fn total_slides(&mut self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.deck.slides.len())
    }

    async fn go_to(&mut self, index: usize) -> Result<()> {
        self.ensure_open()?;
        record(&self.calls, DriverCall::GoTo(index));
        if self.deck.navigation == NavigationMode::Stepping {
            return Err(DeckError::Navigation(format!(
                "renderer '{}' has no jump API",
                self.deck.renderer
            )));
        }
        let total = self.deck.slides.len();
        if index >= total {
            return Err(DeckError::IndexOutOfRange { index, total });
        }
        self.arrive(index)?;
        tokio::time::sleep(self.settle_delay).await;
        Ok(())
    }

    async fn inspect(&mut self, selectors: &BTreeSet<String>) -> Result<SlideSnapshot> {
        self.ensure_open()?;
        record(&self.calls, DriverCall::Inspect(self.current));
        let slide = self.slide()?;
        if let Some(message) = &slide.inspection_error {
            return Err(DeckError::Inspection(message.clone()));
        }
        let elements = selectors
            .iter()
            .map(|sel| (sel.clone(), slide.snapshot.get(sel)))
            .collect();
        Ok(SlideSnapshot {
            root_classes: slide.snapshot.root_classes.clone(),
            elements,
        })
    }

    async fn screenshot(&mut self, path: &Path, _clip: Option<Rect>) -> Result<()> {
        self.ensure_open()?;
        record(&self.calls, DriverCall::Screenshot(path.to_path_buf()));
        if let Some(message) = &self.slide()?.capture_error {
            return Err(DeckError::Capture(message.clone()));
        }
        tokio::fs::write(path, PLACEHOLDER_PNG)
            .await
            .map_err(|e| DeckError::Capture(format!("{}: {}", path.display(), e)))
    }

    async fn send_key(&mut self, key: &str) -> Result<()> {
        self.ensure_open()?;
        record(&self.calls, DriverCall::Key(key.to_string()));
        if key == self.deck.next_key && self.current + 1 < self.deck.slides.len() {
            self.arrive(self.current + 1)?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            record(&self.calls, DriverCall::Close);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementInfo, ElementSnapshot};

    fn deck(n: usize) -> ScriptedDeck {
        ScriptedDeck::from_snapshots(
            (0..n)
                .map(|i| SlideSnapshot {
                    root_classes: vec![format!("slide-{}", i)],
                    ..SlideSnapshot::default()
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_go_to_bounds() {
        let driver = ScriptedDriver::single(deck(3));
        let mut h = driver.load("deck", Viewport::default()).await.unwrap();
        assert_eq!(h.total_slides().await.unwrap(), 3);
        h.go_to(2).await.unwrap();
        let err = h.go_to(5).await.unwrap_err();
        assert!(matches!(err, DeckError::IndexOutOfRange { index: 5, total: 3 }));
    }

    #[tokio::test]
    async fn test_inspect_reports_every_selector() {
        let mut snap = SlideSnapshot::default();
        snap.elements.insert(
            "h1".into(),
            ElementInfo::new(vec![ElementSnapshot::at(Rect::new(0.0, 0.0, 10.0, 10.0))]),
        );
        let driver = ScriptedDriver::single(ScriptedDeck::from_snapshots(vec![snap]));
        let mut h = driver.load("deck", Viewport::default()).await.unwrap();
        let selectors: BTreeSet<String> = ["h1".to_string(), ".missing".to_string()].into();
        let seen = h.inspect(&selectors).await.unwrap();
        assert_eq!(seen.elements.len(), 2);
        assert!(seen.is_present("h1"));
        assert!(!seen.is_present(".missing"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let driver = ScriptedDriver::single(deck(1));
        let mut h = driver.load("deck", Viewport::default()).await.unwrap();
        h.close().await.unwrap();
        h.close().await.unwrap();
        let err = h.total_slides().await.unwrap_err();
        assert!(matches!(err, DeckError::RendererNotReady(_)));
        assert_eq!(driver.count_calls(|c| *c == DriverCall::Close), 1);
    }

    #[tokio::test]
    async fn test_stepping_deck_rejects_jumps() {
        let driver = ScriptedDriver::single(deck(3).stepping());
        let mut h = driver.load("deck", Viewport::default()).await.unwrap();
        assert_eq!(h.navigation_mode(), NavigationMode::Stepping);
        assert!(matches!(h.go_to(1).await, Err(DeckError::Navigation(_))));
        h.send_key("ArrowRight").await.unwrap();
        let snap = h.inspect(&BTreeSet::new()).await.unwrap();
        assert_eq!(snap.root_classes, vec!["slide-1".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_target_and_never_ready() {
        let driver = ScriptedDriver::new().with_deck("slow", deck(1).never_ready());
        assert!(matches!(
            driver.load("other", Viewport::default()).await,
            Err(DeckError::Navigation(_))
        ));
        assert!(matches!(
            driver.load("slow", Viewport::default()).await,
            Err(DeckError::LoadTimeout { .. })
        ));
    }

    #[test]
    fn test_fixture_json() {
        let json = r#"{
            "renderer": "reveal",
            "slides": [
                { "root_classes": ["title-slide"],
                  "elements": { "h1": { "elements": [
                      { "rect": {"x": 0, "y": 0, "width": 100, "height": 40},
                        "style": {"text-align": "center"}, "has_text": true } ] } } },
                { "inspection_error": "script threw" }
            ]
        }"#;
        let deck = ScriptedDeck::from_json(json).unwrap();
        assert_eq!(deck.renderer, "reveal");
        assert_eq!(deck.navigation, NavigationMode::Direct);
        assert_eq!(deck.slides.len(), 2);
        assert!(deck.slides[0].snapshot.is_present("h1"));
        assert_eq!(deck.slides[1].inspection_error.as_deref(), Some("script threw"));
    }
}
