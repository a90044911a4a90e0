//! Per-run report records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DeckError;
use crate::model::{Artifact, Viewport};
use crate::rules::Severity;

/// Rule name used for checks synthesized from slide inspection errors.
pub const INSPECTION_RULE: &str = "inspection";

/// One rule observation on one slide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckResult {
    pub slide_index: usize,
    pub slide_type: String,
    pub rule_name: String,
    pub severity: Severity,
    pub passed: bool,
    pub message: String,
}

impl CheckResult {
    /// Whether this result counts against the exit code.
    pub fn is_gating_failure(&self) -> bool {
        !self.passed && self.severity == Severity::Error
    }
}

/// What was seen on one slide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlideRecord {
    pub index: usize,
    pub slide_type: String,
    pub artifact: Option<Artifact>,
}

/// Run-level error that stopped the harness from scoring a presentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FatalError {
    pub kind: String,
    pub message: String,
}

impl From<&DeckError> for FatalError {
    fn from(err: &DeckError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Outcome of validating one presentation at one viewport.
///
/// Owned by the runner while in progress; handed to the reporter once
/// complete and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub run_id: String,
    pub presentation: String,
    pub target: String,
    pub viewport: Viewport,
    /// Renderer integration in use; empty when loading failed.
    pub renderer: String,
    /// Navigation fell back to relative key stepping.
    pub degraded: bool,
    pub rule_set_digest: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total_slides: usize,
    pub slides: Vec<SlideRecord>,
    pub results: Vec<CheckResult>,
    pub warnings: Vec<String>,
    pub fatal: Option<FatalError>,
}

impl Report {
    pub(crate) fn start(
        presentation: &str,
        target: &str,
        viewport: Viewport,
        rule_set_digest: String,
    ) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            presentation: presentation.to_string(),
            target: target.to_string(),
            viewport,
            renderer: String::new(),
            degraded: false,
            rule_set_digest,
            started_at: Utc::now(),
            duration_ms: 0,
            total_slides: 0,
            slides: Vec::new(),
            results: Vec::new(),
            warnings: Vec::new(),
            fatal: None,
        }
    }

    /// Results for one slide, in rule order.
    pub fn results_for(&self, slide_index: usize) -> impl Iterator<Item = &CheckResult> {
        self.results
            .iter()
            .filter(move |r| r.slide_index == slide_index)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// The harness could not score this presentation.
    pub fn harness_failed(&self) -> bool {
        self.fatal.is_some()
    }

    /// At least one error-severity rule failed.
    pub fn rules_failed(&self) -> bool {
        self.results.iter().any(CheckResult::is_gating_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(slide: usize, passed: bool, severity: Severity) -> CheckResult {
        CheckResult {
            slide_index: slide,
            slide_type: "title".into(),
            rule_name: "r".into(),
            severity,
            passed,
            message: String::new(),
        }
    }

    #[test]
    fn test_warning_failures_do_not_gate() {
        let mut report = Report::start("deck", "file.html", Viewport::default(), "d".into());
        report.results.push(result(0, false, Severity::Warning));
        assert!(!report.rules_failed());
        report.results.push(result(1, false, Severity::Error));
        assert!(report.rules_failed());
        assert_eq!(report.failures().count(), 2);
        assert_eq!(report.results_for(1).count(), 1);
    }

    #[test]
    fn test_fatal_from_error() {
        let fatal = FatalError::from(&DeckError::LoadTimeout {
            target: "x".into(),
            timeout_ms: 10,
        });
        assert_eq!(fatal.kind, "load_timeout");
        assert!(fatal.message.contains("10ms"));
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = Report::start("deck", "t", Viewport::default(), String::new());
        let b = Report::start("deck", "t", Viewport::default(), String::new());
        assert_ne!(a.run_id, b.run_id);
    }
}
