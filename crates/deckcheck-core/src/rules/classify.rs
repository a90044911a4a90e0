//! Ordered first-match slide classifier.
//!
//! Entries are checked in order and the first whose marker selectors are
//! present wins, so precedence is explicit. The built-in order is:
//!
//! 1. `title` (`.title-slide`)
//! 2. `section` (`.section-slide`)
//! 3. `code-embedded` (`.code-embedded`, `.code-slide`, `pre code`)
//! 4. `full-picture` (`.full-picture`)
//! 5. `half-picture` (`.half-picture`)
//! 6. `two-columns` (`.two-columns`)
//! 7. `single-column` (`.single-column`)
//!
//! Code markers come before the layout markers because a code slide usually
//! also carries a generic content class, and code rules must win.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use super::selector::validate_selector;
use crate::error::{DeckError, Result};
use crate::model::SlideSnapshot;

/// Slide type used when no classifier entry matches.
pub const UNKNOWN_SLIDE_TYPE: &str = "unknown";

/// One classifier step: `slide_type` matches if any marker is present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassifierEntry {
    pub slide_type: String,
    pub markers: Vec<String>,
}

impl ClassifierEntry {
    pub fn new(slide_type: &str, markers: &[&str]) -> Self {
        Self {
            slide_type: slide_type.to_string(),
            markers: markers.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn matches(&self, snapshot: &SlideSnapshot) -> bool {
        self.markers.iter().any(|marker| {
            snapshot.is_present(marker)
                || simple_class(marker).is_some_and(|class| snapshot.root_has_class(class))
        })
    }
}

/// `.foo` -> `Some("foo")`; anything more complex -> `None`.
fn simple_class(selector: &str) -> Option<&str> {
    let class = selector.trim().strip_prefix('.')?;
    let simple = !class.is_empty()
        && class
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    simple.then_some(class)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    entries: Vec<ClassifierEntry>,
}

impl Classifier {
    pub fn new(entries: Vec<ClassifierEntry>) -> Self {
        Self { entries }
    }

    pub fn builtin() -> Self {
        Self::new(Self::builtin_entries())
    }

    pub fn builtin_entries() -> Vec<ClassifierEntry> {
        vec![
            ClassifierEntry::new("title", &[".title-slide"]),
            ClassifierEntry::new("section", &[".section-slide"]),
            ClassifierEntry::new("code-embedded", &[".code-embedded", ".code-slide", "pre code"]),
            ClassifierEntry::new("full-picture", &[".full-picture"]),
            ClassifierEntry::new("half-picture", &[".half-picture"]),
            ClassifierEntry::new("two-columns", &[".two-columns"]),
            ClassifierEntry::new("single-column", &[".single-column"]),
        ]
    }

    pub fn entries(&self) -> &[ClassifierEntry] {
        &self.entries
    }

    /// Classify an inspected slide. Pure: the same snapshot always yields
    /// the same type.
    pub fn classify(&self, snapshot: &SlideSnapshot) -> &str {
        self.entries
            .iter()
            .find(|entry| entry.matches(snapshot))
            .map(|entry| entry.slide_type.as_str())
            .unwrap_or(UNKNOWN_SLIDE_TYPE)
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .flat_map(|e| e.markers.iter().map(String::as_str))
    }

    pub fn slide_types(&self) -> BTreeSet<&str> {
        self.entries.iter().map(|e| e.slide_type.as_str()).collect()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            let label = format!("classifier:{}", entry.slide_type);
            if entry.slide_type.trim().is_empty() {
                return Err(DeckError::invalid_rule(label, "slide type is empty"));
            }
            if entry.slide_type == UNKNOWN_SLIDE_TYPE {
                return Err(DeckError::invalid_rule(
                    label,
                    "'unknown' is reserved for unmatched slides",
                ));
            }
            if !seen.insert(entry.slide_type.as_str()) {
                return Err(DeckError::invalid_rule(label, "slide type listed twice"));
            }
            if entry.markers.is_empty() {
                return Err(DeckError::invalid_rule(label, "no marker selectors"));
            }
            for marker in &entry.markers {
                validate_selector(marker).map_err(|reason| DeckError::invalid_rule(&label, reason))?;
            }
        }
        Ok(())
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::builtin()
    }
}
