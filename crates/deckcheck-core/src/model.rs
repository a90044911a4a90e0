//! Presentation, slide and inspection data types.
//!
//! Everything a rule can look at lives in a [`SlideSnapshot`]: the slide
//! root's class list plus, per requested selector, the geometry and
//! whitelisted computed style of every matching element.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::DeckError;

/// Computed style properties the drivers read for every element.
pub const STYLE_WHITELIST: &[&str] = &[
    "text-align",
    "color",
    "background-color",
    "display",
    "position",
    "overflow",
    "font-size",
    "font-weight",
];

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Browser viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Viewport {
    type Err = DeckError;

    /// Parse `WIDTHxHEIGHT`, e.g. `1920x1080`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| DeckError::Config(format!("viewport '{}' is not WIDTHxHEIGHT", s)))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| DeckError::Config(format!("invalid viewport dimension in '{}'", s)))
        };
        Ok(Self::new(parse(w)?, parse(h)?))
    }
}

/// Bounding box as reported by `getBoundingClientRect`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Vertical midpoint.
    pub fn mid_y(&self) -> f64 {
        self.y + self.height / 2.0
    }
}

// ---------------------------------------------------------------------------
// Inspection results
// ---------------------------------------------------------------------------

/// One DOM element matched by a selector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub rect: Rect,
    /// Whitelisted computed style values, keyed by CSS property name.
    #[serde(default)]
    pub style: BTreeMap<String, String>,
    #[serde(default)]
    pub classes: Vec<String>,
    /// Whether the element has non-whitespace text content.
    #[serde(default)]
    pub has_text: bool,
    /// Rendered text, whitespace collapsed and trimmed.
    #[serde(default)]
    pub text: String,
    /// Parsed `data-fragment-index`, if the element carries one.
    #[serde(default)]
    pub fragment_index: Option<i64>,
}

impl ElementSnapshot {
    /// Element with geometry only.
    pub fn at(rect: Rect) -> Self {
        Self {
            rect,
            ..Self::default()
        }
    }

    pub fn with_style(mut self, property: &str, value: &str) -> Self {
        self.style.insert(property.to_string(), value.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn with_text(mut self) -> Self {
        self.has_text = true;
        self
    }

    pub fn with_text_content(mut self, text: &str) -> Self {
        self.text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        self.has_text = !self.text.is_empty();
        self
    }

    pub fn with_fragment_index(mut self, index: i64) -> Self {
        self.fragment_index = Some(index);
        self
    }

    pub fn style_value(&self, property: &str) -> Option<&str> {
        self.style.get(property).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// All elements a selector resolved to. Empty means "absent", which is
/// itself a testable fact rather than an error.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementInfo {
    #[serde(default)]
    pub elements: Vec<ElementSnapshot>,
}

impl ElementInfo {
    pub fn new(elements: Vec<ElementSnapshot>) -> Self {
        Self { elements }
    }

    pub fn present(&self) -> bool {
        !self.elements.is_empty()
    }

    pub fn count(&self) -> usize {
        self.elements.len()
    }

    pub fn first(&self) -> Option<&ElementSnapshot> {
        self.elements.first()
    }
}

/// Read-only inspection of the current slide.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SlideSnapshot {
    /// Class list of the renderer's current slide root element.
    #[serde(default)]
    pub root_classes: Vec<String>,
    /// Per-selector results; every requested selector has an entry.
    #[serde(default)]
    pub elements: BTreeMap<String, ElementInfo>,
}

impl SlideSnapshot {
    /// Lookup that treats unknown selectors as absent.
    pub fn get(&self, selector: &str) -> ElementInfo {
        self.elements.get(selector).cloned().unwrap_or_default()
    }

    pub fn is_present(&self, selector: &str) -> bool {
        self.elements
            .get(selector)
            .map(ElementInfo::present)
            .unwrap_or(false)
    }

    pub fn root_has_class(&self, class: &str) -> bool {
        self.root_classes.iter().any(|c| c == class)
    }
}

// ---------------------------------------------------------------------------
// Presentations and artifacts
// ---------------------------------------------------------------------------

/// One presentation to validate: a display name and a URL or file path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationSpec {
    pub name: String,
    pub target: String,
    #[serde(default = "default_viewports")]
    pub viewports: Vec<Viewport>,
}

fn default_viewports() -> Vec<Viewport> {
    vec![Viewport::default()]
}

impl PresentationSpec {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            viewports: default_viewports(),
        }
    }

    pub fn with_viewports(mut self, viewports: Vec<Viewport>) -> Self {
        self.viewports = viewports;
        self
    }

    /// Whether the target is an HTTP(S) URL rather than a local file.
    pub fn is_remote(&self) -> bool {
        let t = self.target.trim_start();
        t.starts_with("http://") || t.starts_with("https://")
    }
}

/// Screenshot reference attached to a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: String,
    pub slide_index: usize,
    pub viewport: Viewport,
}

/// Deterministic screenshot file name:
/// `{name}-slide-{index}-{type}.png`, or `{name}-{w}x{h}-slide-...` when the
/// run label carries a viewport suffix.
pub fn artifact_file_name(run_label: &str, slide_index: usize, slide_type: &str) -> String {
    format!(
        "{}-slide-{}-{}.png",
        sanitize(run_label),
        slide_index,
        sanitize(slide_type)
    )
}

/// Keep file names portable.
pub(crate) fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_parse() {
        let v: Viewport = "1280x720".parse().expect("parse");
        assert_eq!(v, Viewport::new(1280, 720));
        assert_eq!(v.to_string(), "1280x720");
        assert!("1280".parse::<Viewport>().is_err());
        assert!("0x720".parse::<Viewport>().is_err());
        assert!("axb".parse::<Viewport>().is_err());
    }

    #[test]
    fn test_rect_edges() {
        let r = Rect::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(r.right(), 110.0);
        assert_eq!(r.bottom(), 70.0);
        assert_eq!(r.mid_y(), 45.0);
    }

    #[test]
    fn test_absent_selector_is_empty() {
        let snapshot = SlideSnapshot::default();
        assert!(!snapshot.is_present("h1"));
        assert_eq!(snapshot.get("h1").count(), 0);
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(
            artifact_file_name("intro", 2, "two-columns"),
            "intro-slide-2-two-columns.png"
        );
        assert_eq!(
            artifact_file_name("day 1/deck", 0, "title"),
            "day_1_deck-slide-0-title.png"
        );
    }

    #[test]
    fn test_presentation_remote_detection() {
        assert!(PresentationSpec::new("a", "http://localhost:3000/p/a").is_remote());
        assert!(!PresentationSpec::new("a", "decks/a/index.html").is_remote());
    }
}
