//! Concurrent validation of many presentations.
//!
//! Each (presentation, viewport) pair is an independent run on its own
//! tokio task, with at most `concurrency` runs in flight. Reports come back
//! in input order regardless of completion order.

use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};

use crate::model::PresentationSpec;
use crate::obs;
use crate::report::{FatalError, Report};
use crate::runner::{RunTarget, Runner};

/// Default number of presentations validated at once.
pub const DEFAULT_CONCURRENCY: usize = 2;

pub struct Batch {
    runner: Runner,
    concurrency: usize,
}

impl Batch {
    /// `concurrency` below 1 is treated as 1.
    pub fn new(runner: Runner, concurrency: usize) -> Self {
        Self {
            runner,
            concurrency: concurrency.max(1),
        }
    }

    /// Expand presentations into runs, one per viewport. Labels carry a
    /// `-{w}x{h}` suffix only for presentations with several viewports.
    pub fn plan(presentations: &[PresentationSpec]) -> Vec<RunTarget> {
        presentations
            .iter()
            .flat_map(|p| {
                let suffixed = p.viewports.len() > 1;
                p.viewports.iter().map(move |viewport| {
                    let target = RunTarget::new(&p.name, &p.target, *viewport);
                    if suffixed {
                        target.with_viewport_label()
                    } else {
                        target
                    }
                })
            })
            .collect()
    }

    pub async fn run(&self, targets: Vec<RunTarget>) -> Vec<Report> {
        // The sender stays alive for the whole batch, so runs never see a
        // closed channel.
        let (_keep, cancel) = watch::channel(false);
        self.run_until_cancelled(targets, cancel).await
    }

    /// Run every target; once `cancel` flips to `true`, in-flight runs stop
    /// at their next slide and queued runs report `cancelled` without
    /// loading anything.
    pub async fn run_until_cancelled(
        &self,
        targets: Vec<RunTarget>,
        cancel: watch::Receiver<bool>,
    ) -> Vec<Report> {
        info!(runs = targets.len(), concurrency = self.concurrency, "starting batch");
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let mut tasks: Vec<(RunTarget, JoinHandle<Report>)> = Vec::with_capacity(targets.len());
        for target in targets {
            let runner = self.runner.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let span = obs::run_span(&target.label, &target.presentation);
            let task_target = target.clone();

            let task = tokio::spawn(
                async move {
                    let _permit = semaphore.acquire_owned().await;
                    runner.run_until_cancelled(&task_target, Some(cancel)).await
                }
                .instrument(span),
            );
            tasks.push((target, task));
        }

        let mut reports = Vec::with_capacity(tasks.len());
        for (target, task) in tasks {
            match task.await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    warn!(run = %target.label, error = %err, "run task failed");
                    let mut report = Report::start(
                        &target.presentation,
                        &target.target,
                        target.viewport,
                        self.runner.rule_set().digest(),
                    );
                    report.fatal = Some(FatalError {
                        kind: "task_failed".to_string(),
                        message: err.to_string(),
                    });
                    reports.push(report);
                }
            }
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Viewport;

    #[test]
    fn test_plan_labels() {
        let presentations = vec![
            PresentationSpec::new("intro", "intro.html"),
            PresentationSpec::new("deep", "deep.html")
                .with_viewports(vec![Viewport::new(1920, 1080), Viewport::new(1280, 720)]),
        ];
        let plan = Batch::plan(&presentations);
        let labels: Vec<&str> = plan.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["intro", "deep-1920x1080", "deep-1280x720"]);
        assert_eq!(plan[2].viewport, Viewport::new(1280, 720));
    }
}
