//! Harness configuration
//!
//! Loaded from a TOML file; every field has a default so an empty or missing
//! file is a valid configuration.
//!
//! ```toml
//! output_dir = "deckcheck-out"
//! concurrency = 2
//!
//! [driver]
//! renderer = "reveal"
//! settle_delay_ms = 300
//!
//! [[presentation]]
//! name = "intro"
//! target = "slides/intro.html"
//! viewports = [{ width = 1920, height = 1080 }, { width = 1280, height = 720 }]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::batch::{Batch, DEFAULT_CONCURRENCY};
use crate::driver::{DriverOptions, DEFAULT_LOAD_TIMEOUT_MS, DEFAULT_SETTLE_DELAY_MS, MAX_SETTLE_DELAY_MS};
use crate::error::{DeckError, Result};
use crate::model::{sanitize, PresentationSpec};
use crate::rules::{RuleSet, RuleSetConfig};
use crate::runner::{RunConfig, DEFAULT_NEXT_KEY};

/// Which renderer integration the browser driver should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    /// Probe the page and pick the first renderer that answers.
    #[default]
    Auto,
    Reveal,
    Slidev,
    Marp,
}

impl RendererKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RendererKind::Auto => "auto",
            RendererKind::Reveal => "reveal",
            RendererKind::Slidev => "slidev",
            RendererKind::Marp => "marp",
        }
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RendererKind {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(RendererKind::Auto),
            "reveal" | "revealjs" | "reveal.js" => Ok(RendererKind::Reveal),
            "slidev" => Ok(RendererKind::Slidev),
            "marp" => Ok(RendererKind::Marp),
            other => Err(DeckError::Config(format!(
                "unknown renderer '{}' (expected auto, reveal, slidev or marp)",
                other
            ))),
        }
    }
}

/// Browser driver configuration (`[driver]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Bounded wait for the renderer's ready signal
    pub load_timeout_ms: u64,

    /// Wait after each navigation before inspecting
    pub settle_delay_ms: u64,

    pub renderer: RendererKind,

    pub headless: bool,

    /// Chrome/Chromium binary; auto-detected when unset
    pub chrome_path: Option<PathBuf>,

    /// Key used for relative stepping when the renderer has no jump API
    pub next_key: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            renderer: RendererKind::Auto,
            headless: true,
            chrome_path: None,
            next_key: DEFAULT_NEXT_KEY.to_string(),
        }
    }
}

impl DriverConfig {
    pub fn options(&self) -> DriverOptions {
        DriverOptions {
            load_timeout_ms: self.load_timeout_ms,
            settle_delay_ms: self.settle_delay_ms,
        }
    }
}

/// Top-level harness configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory for screenshots and report files
    pub output_dir: PathBuf,

    /// Maximum presentations validated at once
    pub concurrency: usize,

    pub driver: DriverConfig,

    #[serde(rename = "presentation")]
    pub presentations: Vec<PresentationSpec>,

    /// Custom rule set; the built-in catalogue applies when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<RuleSetConfig>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("deckcheck-out"),
            concurrency: DEFAULT_CONCURRENCY,
            driver: DriverConfig::default(),
            presentations: Vec::new(),
            rules: None,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file; a missing file yields defaults.
    ///
    /// Not validated: callers fold their overrides in first and then call
    /// [`HarnessConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check value ranges and presentation entries.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(DeckError::Config("concurrency must be at least 1".into()));
        }
        if self.driver.load_timeout_ms == 0 {
            return Err(DeckError::Config("driver.load_timeout_ms must be positive".into()));
        }
        if self.driver.settle_delay_ms > MAX_SETTLE_DELAY_MS {
            return Err(DeckError::Config(format!(
                "driver.settle_delay_ms must be within 0..={}",
                MAX_SETTLE_DELAY_MS
            )));
        }
        if self.driver.next_key.trim().is_empty() {
            return Err(DeckError::Config("driver.next_key is empty".into()));
        }
        let mut names = HashSet::new();
        for p in &self.presentations {
            if p.name.trim().is_empty() {
                return Err(DeckError::Config("presentation with empty name".into()));
            }
            if !names.insert(p.name.as_str()) {
                return Err(DeckError::Config(format!("presentation '{}' listed twice", p.name)));
            }
            if p.target.trim().is_empty() {
                return Err(DeckError::Config(format!("presentation '{}' has no target", p.name)));
            }
            if p.viewports.is_empty() {
                return Err(DeckError::Config(format!("presentation '{}' has no viewports", p.name)));
            }
        }

        // Run labels become file names; two runs must never share one.
        let mut files = HashSet::new();
        for target in Batch::plan(&self.presentations) {
            let file = sanitize(&target.label);
            if !files.insert(file.clone()) {
                return Err(DeckError::Config(format!(
                    "run '{}' would overwrite the output files of another run ('{}-*')",
                    target.label, file
                )));
            }
        }
        Ok(())
    }

    /// The effective, validated rule set.
    pub fn rule_set(&self) -> Result<RuleSet> {
        match &self.rules {
            Some(rules) => RuleSet::from_config(rules.clone()),
            None => Ok(RuleSet::builtin()),
        }
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            output_dir: self.output_dir.clone(),
            next_key: self.driver.next_key.clone(),
            capture: true,
        }
    }
}
