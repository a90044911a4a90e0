//! Error types for deckcheck

use thiserror::Error;

/// Errors raised by drivers, rule configuration and the runner.
///
/// Rule failures are not errors: they are recorded as failed
/// [`CheckResult`](crate::report::CheckResult) values.
#[derive(Error, Debug)]
pub enum DeckError {
    /// The renderer never signalled readiness within the load timeout
    #[error("renderer not ready after {timeout_ms}ms: {target}")]
    LoadTimeout { target: String, timeout_ms: u64 },

    /// Network, file or navigation script failure
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// A handle operation was used before `load` completed
    #[error("renderer not ready: {0}")]
    RendererNotReady(String),

    /// Slide index outside `[0, total)`
    #[error("slide index {index} out of range (presentation has {total} slides)")]
    IndexOutOfRange { index: usize, total: usize },

    /// Screenshot could not be captured or written
    #[error("screenshot capture failed: {0}")]
    Capture(String),

    /// DOM inspection script failed on the current slide
    #[error("inspection failed: {0}")]
    Inspection(String),

    /// A rule definition is malformed
    #[error("invalid rule definition '{rule}': {reason}")]
    InvalidRuleDefinition { rule: String, reason: String },

    /// Configuration could not be loaded or is inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    /// The run was cancelled before it finished
    #[error("run cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeckError {
    /// Stable snake_case tag used in reports and console output.
    pub fn kind(&self) -> &'static str {
        match self {
            DeckError::LoadTimeout { .. } => "load_timeout",
            DeckError::Navigation(_) => "navigation_error",
            DeckError::RendererNotReady(_) => "renderer_not_ready",
            DeckError::IndexOutOfRange { .. } => "index_out_of_range",
            DeckError::Capture(_) => "capture_error",
            DeckError::Inspection(_) => "inspection_error",
            DeckError::InvalidRuleDefinition { .. } => "invalid_rule_definition",
            DeckError::Config(_) => "config_error",
            DeckError::Cancelled => "cancelled",
            DeckError::Io(_) => "io_error",
            DeckError::Serialization(_) => "serialization_error",
        }
    }

    /// Whether this error aborts the whole presentation run.
    ///
    /// Inspection and capture errors only affect a single slide.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DeckError::Inspection(_) | DeckError::Capture(_))
    }

    pub(crate) fn invalid_rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        DeckError::InvalidRuleDefinition {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for DeckError {
    fn from(err: toml::de::Error) -> Self {
        DeckError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DeckError {
    fn from(err: toml::ser::Error) -> Self {
        DeckError::Config(err.to_string())
    }
}

/// Result type for deckcheck operations
pub type Result<T> = std::result::Result<T, DeckError>;
