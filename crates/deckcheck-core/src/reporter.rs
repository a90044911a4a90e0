//! Report aggregation and rendering.
//!
//! Provides two views of a finished run for CI consumers:
//! - `Summary`: machine-readable pass/total tallies overall, per slide type
//!   and per rule (serialized into the JSON report files)
//! - `Reporter::to_text`: the human-readable console summary

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::report::{FatalError, Report};
use crate::rules::Severity;

/// Process exit code for a clean run.
pub const EXIT_OK: i32 = 0;
/// Process exit code when at least one gating rule failed.
pub const EXIT_RULES_FAILED: i32 = 1;
/// Process exit code when the harness could not run.
pub const EXIT_HARNESS_ERROR: i32 = 2;

// ── tallies ───────────────────────────────────────────────────────────────

/// Passed/total counter. Invariant: `passed <= total`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tally {
    pub passed: usize,
    pub total: usize,
}

impl Tally {
    fn record(&mut self, passed: bool) {
        self.total += 1;
        if passed {
            self.passed += 1;
        }
    }

    pub fn failed(&self) -> usize {
        self.total - self.passed
    }

    fn merge(&mut self, other: &Tally) {
        self.passed += other.passed;
        self.total += other.total;
    }
}

/// Overall verdict, ordered by severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    RulesFailed,
    HarnessError,
}

impl Verdict {
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Passed => EXIT_OK,
            Verdict::RulesFailed => EXIT_RULES_FAILED,
            Verdict::HarnessError => EXIT_HARNESS_ERROR,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Passed => "PASSED",
            Verdict::RulesFailed => "RULES FAILED",
            Verdict::HarnessError => "HARNESS ERROR",
        }
    }
}

// ── per-presentation summary ─────────────────────────────────────────────

/// Aggregate of one report.
///
/// # Invariants
///
/// `overall.total` equals the sum of `by_type` totals and of `by_rule`
/// totals. Warning-severity failures are counted in the tallies and in
/// `warning_failures`, but never affect `verdict`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub presentation: String,
    pub viewport: String,
    pub renderer: String,
    pub degraded: bool,
    pub total_slides: usize,
    pub overall: Tally,
    pub by_type: BTreeMap<String, Tally>,
    pub by_rule: BTreeMap<String, Tally>,
    pub gating_failures: usize,
    pub warning_failures: usize,
    pub warnings: usize,
    pub fatal: Option<FatalError>,
    pub verdict: Verdict,
}

/// Aggregate of a whole batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchSummary {
    pub overall: Tally,
    pub presentations: Vec<Summary>,
    pub verdict: Verdict,
}

impl BatchSummary {
    pub fn exit_code(&self) -> i32 {
        self.verdict.exit_code()
    }
}

/// Report aggregation and output.
pub struct Reporter;

impl Reporter {
    pub fn summarize(report: &Report) -> Summary {
        let mut overall = Tally::default();
        let mut by_type: BTreeMap<String, Tally> = BTreeMap::new();
        let mut by_rule: BTreeMap<String, Tally> = BTreeMap::new();
        let mut gating_failures = 0;
        let mut warning_failures = 0;

        for result in &report.results {
            overall.record(result.passed);
            by_type
                .entry(result.slide_type.clone())
                .or_default()
                .record(result.passed);
            by_rule
                .entry(result.rule_name.clone())
                .or_default()
                .record(result.passed);
            if !result.passed {
                match result.severity {
                    Severity::Error => gating_failures += 1,
                    Severity::Warning => warning_failures += 1,
                }
            }
        }

        let verdict = if report.fatal.is_some() {
            Verdict::HarnessError
        } else if gating_failures > 0 {
            Verdict::RulesFailed
        } else {
            Verdict::Passed
        };

        Summary {
            presentation: report.presentation.clone(),
            viewport: report.viewport.to_string(),
            renderer: report.renderer.clone(),
            degraded: report.degraded,
            total_slides: report.total_slides,
            overall,
            by_type,
            by_rule,
            gating_failures,
            warning_failures,
            warnings: report.warnings.len(),
            fatal: report.fatal.clone(),
            verdict,
        }
    }

    /// Worst verdict wins: any harness error beats any rule failure.
    pub fn summarize_batch(reports: &[Report]) -> BatchSummary {
        let presentations: Vec<Summary> = reports.iter().map(Self::summarize).collect();
        let mut overall = Tally::default();
        for s in &presentations {
            overall.merge(&s.overall);
        }
        let verdict = presentations
            .iter()
            .map(|s| s.verdict)
            .max()
            .unwrap_or(Verdict::Passed);
        BatchSummary {
            overall,
            presentations,
            verdict,
        }
    }

    /// Machine-readable record for CI gating.
    pub fn to_structured(summary: &Summary) -> serde_json::Value {
        serde_json::to_value(summary).unwrap_or(serde_json::Value::Null)
    }

    /// Human-readable summary of one presentation.
    pub fn to_text(summary: &Summary, report: &Report) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{} [{}] {}\n",
            summary.presentation,
            summary.viewport,
            summary.verdict.label()
        ));
        if let Some(fatal) = &summary.fatal {
            out.push_str(&format!("  harness could not run ({}): {}\n", fatal.kind, fatal.message));
        }
        if summary.degraded {
            out.push_str(&format!(
                "  degraded mode: renderer '{}' has no slide-jump API, navigation used key stepping\n",
                summary.renderer
            ));
        }
        out.push_str(&format!(
            "  slides: {}  checks: {}/{} passed\n",
            summary.total_slides, summary.overall.passed, summary.overall.total
        ));
        for (slide_type, tally) in &summary.by_type {
            out.push_str(&format!(
                "    type {:<16} {}/{}\n",
                slide_type, tally.passed, tally.total
            ));
        }
        for (rule, tally) in summary.by_rule.iter().filter(|(_, t)| t.failed() > 0) {
            out.push_str(&format!(
                "    rule {:<16} {} failed of {}\n",
                rule,
                tally.failed(),
                tally.total
            ));
        }
        for failure in report.failures() {
            let marker = match failure.severity {
                Severity::Error => "✗",
                Severity::Warning => "!",
            };
            out.push_str(&format!(
                "  {} slide {} ({}) {}: {}\n",
                marker, failure.slide_index, failure.slide_type, failure.rule_name, failure.message
            ));
        }
        for warning in &report.warnings {
            out.push_str(&format!("  warning: {}\n", warning));
        }
        out
    }

    /// Console summary for a batch, distinguishing rule failures from
    /// harness failures.
    pub fn batch_to_text(batch: &BatchSummary, reports: &[Report]) -> String {
        let mut out = String::new();
        for (summary, report) in batch.presentations.iter().zip(reports) {
            out.push_str(&Self::to_text(summary, report));
            out.push('\n');
        }
        let harness_errors = batch
            .presentations
            .iter()
            .filter(|s| s.verdict == Verdict::HarnessError)
            .count();
        let rule_failures = batch
            .presentations
            .iter()
            .filter(|s| s.verdict == Verdict::RulesFailed)
            .count();
        out.push_str(&format!(
            "Summary: {}/{} checks passed across {} run(s)\n",
            batch.overall.passed,
            batch.overall.total,
            batch.presentations.len()
        ));
        if rule_failures > 0 {
            out.push_str(&format!(
                "  {} presentation run(s) need fixing (rules failed)\n",
                rule_failures
            ));
        }
        if harness_errors > 0 {
            out.push_str(&format!(
                "  {} presentation run(s) could not be checked (harness error)\n",
                harness_errors
            ));
        }
        out.push_str(&format!("Result: {}\n", batch.verdict.label()));
        out
    }

    /// Write `{label}-report.json` with the summary and full report.
    pub fn write_report(dir: &Path, label: &str, summary: &Summary, report: &Report) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}-report.json", crate::model::sanitize(label)));
        let body = serde_json::json!({ "summary": summary, "report": report });
        std::fs::write(&path, serde_json::to_vec_pretty(&body)?)?;
        Ok(path)
    }

    /// Write `summary.json` for the whole batch.
    pub fn write_batch_summary(dir: &Path, batch: &BatchSummary) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("summary.json");
        std::fs::write(&path, serde_json::to_vec_pretty(batch)?)?;
        Ok(path)
    }
}
