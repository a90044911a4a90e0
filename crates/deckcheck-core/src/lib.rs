//! deckcheck core library
//!
//! Renderer-agnostic presentation conformance checking.
//!
//! ## Key Components
//!
//! - `SlideDriver` / `DriverHandle`: browser abstraction (load, navigate,
//!   inspect, capture)
//! - `RuleSet`: slide classifier plus declarative per-type layout rules
//! - `Runner` / `Batch`: sequential per-slide scoring, concurrent
//!   presentation fan-out
//! - `Reporter`: tallies, console summary, JSON report files and exit codes

mod error;

pub mod batch;
pub mod config;
pub mod driver;
pub mod fakes;
pub mod model;
pub mod obs;
pub mod report;
pub mod reporter;
pub mod rules;
pub mod runner;
pub mod telemetry;

pub use batch::{Batch, DEFAULT_CONCURRENCY};
pub use config::{DriverConfig, HarnessConfig, RendererKind};
pub use driver::{DriverHandle, DriverOptions, NavigationMode, SlideDriver};
pub use error::{DeckError, Result};
pub use model::{
    artifact_file_name, Artifact, ElementInfo, ElementSnapshot, PresentationSpec, Rect,
    SlideSnapshot, Viewport, STYLE_WHITELIST,
};
pub use report::{CheckResult, FatalError, Report, SlideRecord};
pub use reporter::{BatchSummary, Reporter, Summary, Tally, Verdict};
pub use rules::{
    Classifier, ClassifierEntry, Rule, RuleKind, RuleSet, RuleSetConfig, Severity,
    UNKNOWN_SLIDE_TYPE,
};
pub use runner::{RunConfig, RunTarget, Runner};
