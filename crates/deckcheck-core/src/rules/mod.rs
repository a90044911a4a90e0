//! Slide rules engine.
//!
//! A [`RuleSet`] maps slide types to ordered lists of declarative [`Rule`]s,
//! plus a `default` list applied to every slide. Slide types come from an
//! ordered first-match [`Classifier`]. Rules are pure predicates over a
//! [`SlideSnapshot`]; evaluating them never touches the page.
//!
//! Rule sets are validated on construction: a malformed rule fails with
//! `InvalidRuleDefinition` instead of being skipped.

mod checks;
mod classify;
mod selector;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::{DeckError, Result};
use crate::model::{SlideSnapshot, Viewport, STYLE_WHITELIST};

pub use classify::{Classifier, ClassifierEntry, UNKNOWN_SLIDE_TYPE};
pub use selector::validate_selector;

/// Text-bearing elements checked by the built-in overflow rule.
pub const TEXT_SELECTOR: &str = "h1, h2, h3, h4, p, li, pre, td, th, blockquote";

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Whether a failing rule gates the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Error,
    /// Reported, never counted against the exit code.
    Warning,
}

/// The predicate a rule applies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    /// Every text-bearing element matched by `selector` stays inside the
    /// viewport (right/bottom edges), within `tolerance_px`.
    NoOverflow {
        #[serde(default = "default_text_selector")]
        selector: String,
        #[serde(default)]
        tolerance_px: f64,
    },
    /// Each selector resolves to at least one element.
    RequiredElementsPresent { selectors: Vec<String> },
    /// Computed `text-align` of every matched element equals `expected`.
    TextAlignment { selector: String, expected: String },
    /// Matched siblings sit side by side: vertical midpoints within
    /// `tolerance_px` of each other and each left edge at least half the
    /// previous sibling's width to the right of it.
    LayoutArrangement {
        selector: String,
        #[serde(default = "default_min_columns")]
        min_count: usize,
        #[serde(default = "default_band_px")]
        tolerance_px: f64,
    },
    /// Fragment indices form exactly `[first_index, first_index + N)`.
    FragmentSequenceIntegrity {
        #[serde(default = "default_fragment_selector")]
        selector: String,
        #[serde(default = "default_first_fragment")]
        first_index: i64,
    },
    /// Rendered width and height stay within `max_fraction` of the viewport.
    ElementSizeBound {
        selector: String,
        #[serde(default = "default_max_fraction")]
        max_fraction: f64,
    },
    /// A whitelisted computed style property equals `expected`.
    ComputedStyle {
        selector: String,
        property: String,
        expected: String,
    },
    /// No matched element's text matches a `forbidden` pattern, and every
    /// `required` pattern matches the text of at least one element.
    TextPattern {
        #[serde(default = "default_text_selector")]
        selector: String,
        #[serde(default)]
        forbidden: Vec<String>,
        #[serde(default)]
        required: Vec<String>,
    },
    /// On arrival, exactly `expected_visible` fragments carry `visible_class`.
    FragmentVisibility {
        #[serde(default = "default_fragment_selector")]
        selector: String,
        #[serde(default = "default_visible_class")]
        visible_class: String,
        #[serde(default)]
        expected_visible: usize,
    },
}

fn default_text_selector() -> String {
    TEXT_SELECTOR.to_string()
}

fn default_min_columns() -> usize {
    2
}

fn default_band_px() -> f64 {
    50.0
}

fn default_fragment_selector() -> String {
    ".fragment".to_string()
}

fn default_first_fragment() -> i64 {
    1
}

fn default_max_fraction() -> f64 {
    0.9
}

fn default_visible_class() -> String {
    "visible".to_string()
}

fn default_enabled() -> bool {
    true
}

/// A named, declarative check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub name: String,
    #[serde(flatten)]
    pub kind: RuleKind,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// When set, a rule whose selectors match nothing is reported as not
    /// applicable instead of failing.
    #[serde(default)]
    pub only_if_present: bool,
}

/// Result of evaluating one rule against one slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub passed: bool,
    pub message: String,
}

impl Rule {
    pub fn new(name: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            name: name.into(),
            kind,
            severity: Severity::Error,
            enabled: true,
            only_if_present: false,
        }
    }

    pub fn warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn only_if_present(mut self) -> Self {
        self.only_if_present = true;
        self
    }

    /// Selectors this rule reads.
    pub fn selectors(&self) -> Vec<&str> {
        match &self.kind {
            RuleKind::RequiredElementsPresent { selectors } => {
                selectors.iter().map(String::as_str).collect()
            }
            RuleKind::NoOverflow { selector, .. }
            | RuleKind::TextAlignment { selector, .. }
            | RuleKind::LayoutArrangement { selector, .. }
            | RuleKind::FragmentSequenceIntegrity { selector, .. }
            | RuleKind::ElementSizeBound { selector, .. }
            | RuleKind::ComputedStyle { selector, .. }
            | RuleKind::TextPattern { selector, .. }
            | RuleKind::FragmentVisibility { selector, .. } => vec![selector.as_str()],
        }
    }

    /// Evaluate against an inspected slide.
    pub fn evaluate(&self, snapshot: &SlideSnapshot, viewport: Viewport) -> Outcome {
        checks::evaluate(self, snapshot, viewport)
    }

    /// Reject malformed definitions.
    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DeckError::invalid_rule("<unnamed>", "rule name is empty"));
        }
        let fail = |reason: String| Err(DeckError::invalid_rule(name, reason));

        for sel in self.selectors() {
            if let Err(reason) = validate_selector(sel) {
                return fail(reason);
            }
        }

        match &self.kind {
            RuleKind::NoOverflow { tolerance_px, .. } => {
                if !tolerance_px.is_finite() || *tolerance_px < 0.0 {
                    return fail(format!("tolerance_px must be >= 0, got {}", tolerance_px));
                }
            }
            RuleKind::RequiredElementsPresent { selectors } => {
                if selectors.is_empty() {
                    return fail("selectors list is empty".to_string());
                }
            }
            RuleKind::TextAlignment { expected, .. } => {
                if !checks::is_known_alignment(expected) {
                    return fail(format!("unknown text-align value '{}'", expected));
                }
            }
            RuleKind::LayoutArrangement {
                min_count,
                tolerance_px,
                ..
            } => {
                if *min_count < 2 {
                    return fail(format!("min_count must be >= 2, got {}", min_count));
                }
                if !tolerance_px.is_finite() || *tolerance_px < 0.0 {
                    return fail(format!("tolerance_px must be >= 0, got {}", tolerance_px));
                }
            }
            RuleKind::FragmentSequenceIntegrity { first_index, .. } => {
                if *first_index < 0 {
                    return fail(format!("first_index must be >= 0, got {}", first_index));
                }
            }
            RuleKind::ElementSizeBound { max_fraction, .. } => {
                if !max_fraction.is_finite() || *max_fraction <= 0.0 || *max_fraction > 1.0 {
                    return fail(format!("max_fraction must be in (0, 1], got {}", max_fraction));
                }
            }
            RuleKind::ComputedStyle {
                property, expected, ..
            } => {
                if !STYLE_WHITELIST.contains(&property.as_str()) {
                    return fail(format!(
                        "property '{}' is not inspected (allowed: {})",
                        property,
                        STYLE_WHITELIST.join(", ")
                    ));
                }
                if expected.trim().is_empty() {
                    return fail("expected value is empty".to_string());
                }
            }
            RuleKind::TextPattern {
                forbidden,
                required,
                ..
            } => {
                if forbidden.is_empty() && required.is_empty() {
                    return fail("no forbidden or required patterns".to_string());
                }
                for pattern in forbidden.iter().chain(required) {
                    if let Err(err) = regex::Regex::new(pattern) {
                        return fail(format!("invalid pattern '{}': {}", pattern, err));
                    }
                }
            }
            RuleKind::FragmentVisibility { visible_class, .. } => {
                if visible_class.trim().is_empty() || visible_class.contains(char::is_whitespace)
                {
                    return fail(format!("invalid visible_class '{}'", visible_class));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rule sets
// ---------------------------------------------------------------------------

/// Serializable form of a [`RuleSet`], as found under `[rules]` in the
/// harness config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleSetConfig {
    #[serde(default = "Classifier::builtin_entries")]
    pub classifier: Vec<ClassifierEntry>,
    #[serde(default)]
    pub default: Vec<Rule>,
    #[serde(default)]
    pub types: BTreeMap<String, Vec<Rule>>,
}

/// Validated rule set.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    classifier: Classifier,
    default: Vec<Rule>,
    by_type: BTreeMap<String, Vec<Rule>>,
}

impl RuleSet {
    /// Build and validate a rule set.
    pub fn new(
        classifier: Classifier,
        default: Vec<Rule>,
        by_type: BTreeMap<String, Vec<Rule>>,
    ) -> Result<Self> {
        classifier.validate()?;

        let default_names = unique_names(&default, "default")?;
        for rule in &default {
            rule.validate()?;
        }

        let known = classifier.slide_types();
        for (slide_type, rules) in &by_type {
            let first = rules
                .first()
                .map(|r| r.name.as_str())
                .unwrap_or(slide_type.as_str());
            if slide_type == UNKNOWN_SLIDE_TYPE {
                return Err(DeckError::invalid_rule(
                    first,
                    format!("'{}' slides only receive the default rules", UNKNOWN_SLIDE_TYPE),
                ));
            }
            if !known.contains(slide_type.as_str()) {
                return Err(DeckError::invalid_rule(
                    first,
                    format!("slide type '{}' is never produced by the classifier", slide_type),
                ));
            }
            let names = unique_names(rules, slide_type)?;
            if let Some(clash) = names.intersection(&default_names).next() {
                return Err(DeckError::invalid_rule(
                    *clash,
                    format!("name used both in default rules and for '{}'", slide_type),
                ));
            }
            for rule in rules {
                rule.validate()?;
            }
        }

        Ok(Self {
            classifier,
            default,
            by_type,
        })
    }

    pub fn from_config(config: RuleSetConfig) -> Result<Self> {
        Self::new(
            Classifier::new(config.classifier),
            config.default,
            config.types,
        )
    }

    pub fn to_config(&self) -> RuleSetConfig {
        RuleSetConfig {
            classifier: self.classifier.entries().to_vec(),
            default: self.default.clone(),
            types: self.by_type.clone(),
        }
    }

    /// The catalogue used when no `[rules]` section is configured.
    pub fn builtin() -> Self {
        let default = vec![
            Rule::new(
                "no-overflow",
                RuleKind::NoOverflow {
                    selector: default_text_selector(),
                    tolerance_px: 0.0,
                },
            )
            .only_if_present(),
            Rule::new(
                "fragment-sequence",
                RuleKind::FragmentSequenceIntegrity {
                    selector: default_fragment_selector(),
                    first_index: 1,
                },
            )
            .only_if_present(),
        ];

        let mut by_type = BTreeMap::new();
        by_type.insert(
            "title".to_string(),
            vec![
                Rule::new(
                    "title-elements",
                    RuleKind::RequiredElementsPresent {
                        selectors: vec!["h1".to_string(), ".logo, .vanilla-logo".to_string()],
                    },
                ),
                Rule::new(
                    "title-centered",
                    RuleKind::TextAlignment {
                        selector: "h1".to_string(),
                        expected: "center".to_string(),
                    },
                ),
            ],
        );
        by_type.insert(
            "section".to_string(),
            vec![Rule::new(
                "section-heading",
                RuleKind::RequiredElementsPresent {
                    selectors: vec!["h1, h2".to_string()],
                },
            )],
        );
        by_type.insert(
            "two-columns".to_string(),
            vec![
                Rule::new(
                    "columns-side-by-side",
                    RuleKind::LayoutArrangement {
                        selector: ".column".to_string(),
                        min_count: 2,
                        tolerance_px: default_band_px(),
                    },
                ),
                Rule::new(
                    "heading-left",
                    RuleKind::TextAlignment {
                        selector: "h2".to_string(),
                        expected: "left".to_string(),
                    },
                )
                .only_if_present(),
            ],
        );
        by_type.insert(
            "code-embedded".to_string(),
            vec![
                Rule::new(
                    "code-height",
                    RuleKind::ElementSizeBound {
                        selector: "pre".to_string(),
                        max_fraction: default_max_fraction(),
                    },
                ),
                Rule::new(
                    "code-left",
                    RuleKind::TextAlignment {
                        selector: "pre".to_string(),
                        expected: "left".to_string(),
                    },
                ),
            ],
        );
        by_type.insert(
            "half-picture".to_string(),
            vec![Rule::new(
                "picture-present",
                RuleKind::RequiredElementsPresent {
                    selectors: vec!["img".to_string()],
                },
            )],
        );
        by_type.insert(
            "full-picture".to_string(),
            vec![Rule::new(
                "full-picture-present",
                RuleKind::RequiredElementsPresent {
                    selectors: vec!["img".to_string()],
                },
            )],
        );

        // The catalogue above is static and valid; construct directly.
        Self {
            classifier: Classifier::builtin(),
            default,
            by_type,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Deterministic first-match slide type.
    pub fn classify(&self, snapshot: &SlideSnapshot) -> String {
        self.classifier.classify(snapshot).to_string()
    }

    /// Enabled default rules followed by enabled type-specific rules.
    /// Unknown slide types receive only the defaults.
    pub fn rules_for(&self, slide_type: &str) -> Vec<&Rule> {
        self.default
            .iter()
            .chain(self.by_type.get(slide_type).into_iter().flatten())
            .filter(|r| r.enabled)
            .collect()
    }

    /// Every selector needed to classify a slide and run any enabled rule.
    pub fn selectors(&self) -> BTreeSet<String> {
        let mut out: BTreeSet<String> = self.classifier.selectors().map(str::to_string).collect();
        for rule in self
            .default
            .iter()
            .chain(self.by_type.values().flatten())
            .filter(|r| r.enabled)
        {
            out.extend(rule.selectors().into_iter().map(str::to_string));
        }
        out
    }

    /// SHA-256 hex digest of the serialized configuration.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(&self.to_config()).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

fn unique_names<'a>(rules: &'a [Rule], scope: &str) -> Result<HashSet<&'a str>> {
    let mut seen = HashSet::new();
    for rule in rules {
        if !seen.insert(rule.name.as_str()) {
            return Err(DeckError::invalid_rule(
                rule.name.as_str(),
                format!("duplicate rule name in '{}'", scope),
            ));
        }
    }
    Ok(seen)
}
