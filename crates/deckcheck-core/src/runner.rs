//! Presentation validation runs.
//!
//! One run walks every slide of one presentation at one viewport,
//! strictly in order: navigate, inspect, classify, evaluate, capture.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::driver::{DriverHandle, NavigationMode, SlideDriver};
use crate::error::{DeckError, Result};
use crate::model::{artifact_file_name, Artifact, Viewport};
use crate::obs;
use crate::report::{CheckResult, FatalError, Report, SlideRecord, INSPECTION_RULE};
use crate::rules::{RuleSet, Severity, UNKNOWN_SLIDE_TYPE};

/// Key sent per step when the renderer has no jump API.
pub const DEFAULT_NEXT_KEY: &str = "ArrowRight";

/// Settings shared by every run of a batch.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory for screenshots.
    pub output_dir: PathBuf,
    /// Key used for relative stepping in degraded mode.
    pub next_key: String,
    /// Capture one screenshot per slide.
    pub capture: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("deckcheck-out"),
            next_key: DEFAULT_NEXT_KEY.to_string(),
            capture: true,
        }
    }
}

/// What to validate in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTarget {
    pub presentation: String,
    pub target: String,
    pub viewport: Viewport,
    /// Prefix for artifact and report file names.
    pub label: String,
}

impl RunTarget {
    pub fn new(presentation: &str, target: &str, viewport: Viewport) -> Self {
        Self {
            presentation: presentation.to_string(),
            target: target.to_string(),
            viewport,
            label: presentation.to_string(),
        }
    }

    /// Label as `{presentation}-{w}x{h}`, used when a presentation is
    /// checked at several viewports.
    pub fn with_viewport_label(mut self) -> Self {
        self.label = format!("{}-{}", self.presentation, self.viewport);
        self
    }
}

/// Drives one presentation run.
#[derive(Clone)]
pub struct Runner {
    driver: Arc<dyn SlideDriver>,
    rule_set: Arc<RuleSet>,
    config: RunConfig,
}

impl Runner {
    pub fn new(driver: Arc<dyn SlideDriver>, rule_set: Arc<RuleSet>, config: RunConfig) -> Self {
        Self {
            driver,
            rule_set,
            config,
        }
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rule_set
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Validate one presentation.
    ///
    /// Never fails: load errors and fatal driver errors end up in
    /// `Report::fatal`, rule failures in `Report::results`.
    pub async fn run(&self, target: &RunTarget) -> Report {
        self.run_until_cancelled(target, None).await
    }

    /// Like [`Runner::run`], checking `cancel` before each slide. A cancelled
    /// run still releases its driver handle.
    pub async fn run_until_cancelled(
        &self,
        target: &RunTarget,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Report {
        let started = Instant::now();
        let mut report = Report::start(
            &target.presentation,
            &target.target,
            target.viewport,
            self.rule_set.digest(),
        );
        obs::emit_run_started(&report.run_id, &target.target, &target.viewport.to_string());

        let loaded = if is_cancelled(cancel.as_ref()) {
            Err(DeckError::Cancelled)
        } else {
            self.driver.load(&target.target, target.viewport).await
        };

        match loaded {
            Ok(mut handle) => {
                report.renderer = handle.renderer().to_string();
                report.degraded = handle.navigation_mode() == NavigationMode::Stepping;

                let scored = self
                    .score_slides(handle.as_mut(), target, &mut report, cancel.as_ref())
                    .await;
                if let Err(err) = scored {
                    obs::emit_run_aborted(err.kind(), &err);
                    report.fatal = Some(FatalError::from(&err));
                }

                // Release unconditionally, whatever happened above.
                if let Err(err) = handle.close().await {
                    report.warnings.push(format!("closing the browser failed: {}", err));
                }
            }
            Err(err) => {
                obs::emit_run_aborted(err.kind(), &err);
                report.fatal = Some(FatalError::from(&err));
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        obs::emit_run_finished(
            &report.run_id,
            report.duration_ms,
            report.results.len(),
            report.failures().count(),
        );
        report
    }

    async fn score_slides(
        &self,
        handle: &mut dyn DriverHandle,
        target: &RunTarget,
        report: &mut Report,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<()> {
        let total = handle.total_slides().await?;
        report.total_slides = total;
        obs::emit_presentation_loaded(&report.renderer, total, report.degraded);

        if self.config.capture {
            if let Err(err) = tokio::fs::create_dir_all(&self.config.output_dir).await {
                report.warnings.push(format!(
                    "cannot create artifact directory {}: {}",
                    self.config.output_dir.display(),
                    err
                ));
            }
        }

        let selectors = self.rule_set.selectors();
        let mut position = 0usize;

        for index in 0..total {
            if is_cancelled(cancel) {
                return Err(DeckError::Cancelled);
            }

            self.navigate(handle, index, &mut position).await?;

            let (slide_type, results) = match handle.inspect(&selectors).await {
                Ok(snapshot) => {
                    let slide_type = self.rule_set.classify(&snapshot);
                    let results: Vec<CheckResult> = self
                        .rule_set
                        .rules_for(&slide_type)
                        .into_iter()
                        .map(|rule| {
                            let outcome = rule.evaluate(&snapshot, target.viewport);
                            CheckResult {
                                slide_index: index,
                                slide_type: slide_type.clone(),
                                rule_name: rule.name.clone(),
                                severity: rule.severity,
                                passed: outcome.passed,
                                message: outcome.message,
                            }
                        })
                        .collect();
                    (slide_type, results)
                }
                Err(err) if !err.is_fatal() => {
                    debug!(index, error = %err, "slide inspection failed");
                    let failed = CheckResult {
                        slide_index: index,
                        slide_type: UNKNOWN_SLIDE_TYPE.to_string(),
                        rule_name: INSPECTION_RULE.to_string(),
                        severity: Severity::Error,
                        passed: false,
                        message: format!("[{}] {}", err.kind(), err),
                    };
                    (UNKNOWN_SLIDE_TYPE.to_string(), vec![failed])
                }
                Err(err) => return Err(err),
            };

            let artifact = if self.config.capture {
                self.capture(handle, target, index, &slide_type, report).await
            } else {
                None
            };

            let passed = results.iter().filter(|r| r.passed).count();
            obs::emit_slide_checked(index, &slide_type, passed, results.len());

            report.slides.push(SlideRecord {
                index,
                slide_type,
                artifact,
            });
            report.results.extend(results);
        }

        info!(slides = total, "all slides scored");
        Ok(())
    }

    /// Move to `index`. In stepping mode the runner owns the notion of the
    /// current slide and only ever steps forward.
    async fn navigate(
        &self,
        handle: &mut dyn DriverHandle,
        index: usize,
        position: &mut usize,
    ) -> Result<()> {
        match handle.navigation_mode() {
            NavigationMode::Direct => handle.go_to(index).await,
            NavigationMode::Stepping => {
                if index < *position {
                    return Err(DeckError::Navigation(format!(
                        "cannot step back from slide {} to {} without a jump API",
                        position, index
                    )));
                }
                while *position < index {
                    handle.send_key(&self.config.next_key).await?;
                    *position += 1;
                    tokio::time::sleep(handle.settle_delay()).await;
                }
                Ok(())
            }
        }
    }

    async fn capture(
        &self,
        handle: &mut dyn DriverHandle,
        target: &RunTarget,
        index: usize,
        slide_type: &str,
        report: &mut Report,
    ) -> Option<Artifact> {
        let path = self
            .config
            .output_dir
            .join(artifact_file_name(&target.label, index, slide_type));
        match handle.screenshot(&path, None).await {
            Ok(()) => Some(Artifact {
                path: path.to_string_lossy().into_owned(),
                slide_index: index,
                viewport: target.viewport,
            }),
            Err(err) => {
                obs::emit_capture_failed(index, &err);
                report
                    .warnings
                    .push(format!("slide {}: screenshot not captured: {}", index, err));
                None
            }
        }
    }
}

fn is_cancelled(cancel: Option<&watch::Receiver<bool>>) -> bool {
    cancel.is_some_and(|rx| *rx.borrow())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_target_labels() {
        let t = RunTarget::new("intro", "http://localhost:3000", Viewport::new(1280, 720));
        assert_eq!(t.label, "intro");
        assert_eq!(t.with_viewport_label().label, "intro-1280x720");
    }

    #[test]
    fn test_default_config() {
        let c = RunConfig::default();
        assert_eq!(c.next_key, "ArrowRight");
        assert!(c.capture);
    }
}
