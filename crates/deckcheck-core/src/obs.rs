//! Structured lifecycle events for presentation runs.
//!
//! This module provides:
//! - A run-scoped tracing span (`run_span`)
//! - Emission functions for key lifecycle events: run start, per-slide
//!   verdict, capture failure, run finish and batch finish
//!
//! Events are emitted at `info!` level (warnings at `warn!`) and can be
//! filtered with `RUST_LOG`.

use tracing::{info, warn, Span};

/// Span tagging every log line of one presentation run.
///
/// Attach it to the run future with `tracing::Instrument` rather than
/// entering it, so the future stays `Send` across awaits.
///
/// ```ignore
/// runner.run(...).instrument(run_span(&label, "intro")).await
/// ```
pub fn run_span(label: &str, presentation: &str) -> Span {
    tracing::info_span!("deckcheck.run", run = %label, presentation = %presentation)
}

/// Emit event: run started.
pub fn emit_run_started(run_id: &str, target: &str, viewport: &str) {
    info!(event = "run.started", run_id = %run_id, target = %target, viewport = %viewport);
}

/// Emit event: renderer loaded and slide count known.
pub fn emit_presentation_loaded(renderer: &str, total_slides: usize, degraded: bool) {
    info!(
        event = "presentation.loaded",
        renderer = %renderer,
        total_slides = total_slides,
        degraded = degraded,
    );
}

/// Emit event: one slide checked.
pub fn emit_slide_checked(index: usize, slide_type: &str, passed: usize, total: usize) {
    info!(
        event = "slide.checked",
        index = index,
        slide_type = %slide_type,
        passed = passed,
        total = total,
    );
}

/// Emit event: screenshot failed (warning level, the run continues).
pub fn emit_capture_failed(index: usize, error: &dyn std::fmt::Display) {
    warn!(event = "artifact.capture_failed", index = index, error = %error);
}

/// Emit event: run aborted by a fatal driver error.
pub fn emit_run_aborted(kind: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.aborted", kind = %kind, error = %error);
}

/// Emit event: run finished.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, checks: usize, failed: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        checks = checks,
        failed = failed,
    );
}

/// Emit event: whole batch finished with its verdict.
pub fn emit_batch_finished(runs: usize, verdict: &str) {
    info!(event = "batch.finished", runs = runs, verdict = %verdict);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitters_do_not_panic_without_subscriber() {
        emit_run_started("run-1", "deck.html", "1920x1080");
        emit_presentation_loaded("reveal", 3, false);
        emit_slide_checked(0, "title", 2, 2);
        emit_capture_failed(1, &"disk full");
        emit_run_aborted("load_timeout", &"timeout");
        emit_run_finished("run-1", 10, 4, 1);
        emit_batch_finished(1, "passed");
    }

    #[test]
    fn test_run_span_create() {
        let span = run_span("deck-1920x1080", "deck");
        let _entered = span.enter();
    }
}
