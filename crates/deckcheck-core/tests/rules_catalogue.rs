//! Integration tests for the rule catalogue and rule set configuration.

use deckcheck_core::{
    ElementInfo, ElementSnapshot, Rect, Rule, RuleKind, RuleSet, RuleSetConfig, Severity,
    SlideSnapshot, Viewport,
};

fn vp() -> Viewport {
    Viewport::new(1920, 1080)
}

fn slide(entries: Vec<(&str, Vec<ElementSnapshot>)>) -> SlideSnapshot {
    let mut s = SlideSnapshot::default();
    for (sel, elements) in entries {
        s.elements.insert(sel.to_string(), ElementInfo::new(elements));
    }
    s
}

fn fragments(indices: &[i64]) -> Vec<ElementSnapshot> {
    indices
        .iter()
        .map(|i| ElementSnapshot::default().with_fragment_index(*i))
        .collect()
}

fn columns_rule() -> Rule {
    Rule::new(
        "columns",
        RuleKind::LayoutArrangement {
            selector: ".column".into(),
            min_count: 2,
            tolerance_px: 50.0,
        },
    )
}

fn fragment_rule() -> Rule {
    Rule::new(
        "fragments",
        RuleKind::FragmentSequenceIntegrity {
            selector: ".fragment".into(),
            first_index: 1,
        },
    )
}

/// Test: two containers side by side pass the arrangement rule
#[test]
fn test_layout_side_by_side_passes() {
    let s = slide(vec![(
        ".column",
        vec![
            ElementSnapshot::at(Rect::new(0.0, 0.0, 800.0, 600.0)),
            ElementSnapshot::at(Rect::new(850.0, 10.0, 800.0, 600.0)),
        ],
    )]);
    let outcome = columns_rule().evaluate(&s, vp());
    assert!(outcome.passed, "{}", outcome.message);
}

/// Test: stacked containers fail the arrangement rule
#[test]
fn test_layout_stacked_fails() {
    let s = slide(vec![(
        ".column",
        vec![
            ElementSnapshot::at(Rect::new(0.0, 0.0, 800.0, 400.0)),
            ElementSnapshot::at(Rect::new(0.0, 450.0, 800.0, 400.0)),
        ],
    )]);
    assert!(!columns_rule().evaluate(&s, vp()).passed);
}

/// Test: a single container is not an arrangement
#[test]
fn test_layout_needs_min_count() {
    let s = slide(vec![(
        ".column",
        vec![ElementSnapshot::at(Rect::new(0.0, 0.0, 800.0, 600.0))],
    )]);
    assert!(!columns_rule().evaluate(&s, vp()).passed);
}

/// Test: a contiguous fragment sequence passes
#[test]
fn test_fragments_contiguous_pass() {
    let s = slide(vec![(".fragment", fragments(&[1, 2, 3, 4, 5, 6, 7, 8, 9]))]);
    assert!(fragment_rule().evaluate(&s, vp()).passed);
}

/// Test: a duplicate index is reported by value
#[test]
fn test_fragments_duplicate_named() {
    let s = slide(vec![(".fragment", fragments(&[1, 2, 2, 4]))]);
    let outcome = fragment_rule().evaluate(&s, vp());
    assert!(!outcome.passed);
    assert!(
        outcome.message.contains("duplicate fragment index 2"),
        "message: {}",
        outcome.message
    );
}

/// Test: a gap is reported by the missing index
#[test]
fn test_fragments_gap_named() {
    let s = slide(vec![(".fragment", fragments(&[1, 2, 4]))]);
    let outcome = fragment_rule().evaluate(&s, vp());
    assert!(!outcome.passed);
    assert!(
        outcome.message.contains("missing fragment index 3"),
        "message: {}",
        outcome.message
    );
}

/// Test: overflow depends on the configured tolerance
#[test]
fn test_overflow_tolerance() {
    // right edge at 1925px on a 1920px viewport
    let s = slide(vec![(
        "p",
        vec![ElementSnapshot::at(Rect::new(1125.0, 100.0, 800.0, 40.0)).with_text()],
    )]);
    let strict = Rule::new(
        "overflow",
        RuleKind::NoOverflow {
            selector: "p".into(),
            tolerance_px: 0.0,
        },
    );
    let lenient = Rule::new(
        "overflow",
        RuleKind::NoOverflow {
            selector: "p".into(),
            tolerance_px: 10.0,
        },
    );
    assert!(!strict.evaluate(&s, vp()).passed);
    assert!(lenient.evaluate(&s, vp()).passed);
}

/// Test: alignment compares against computed style
#[test]
fn test_text_alignment() {
    let rule = Rule::new(
        "left",
        RuleKind::TextAlignment {
            selector: "h2".into(),
            expected: "left".into(),
        },
    );
    let centered = slide(vec![(
        "h2",
        vec![ElementSnapshot::default().with_style("text-align", "center")],
    )]);
    let start = slide(vec![(
        "h2",
        vec![ElementSnapshot::default().with_style("text-align", "start")],
    )]);
    assert!(!rule.evaluate(&centered, vp()).passed);
    assert!(rule.evaluate(&start, vp()).passed);
}

fn time_annotation_rule() -> Rule {
    Rule::new(
        "no-time-annotations",
        RuleKind::TextPattern {
            selector: "h1, h2, p".to_string(),
            forbidden: vec![
                r"\(\d+\s*min\)".to_string(),
                r"(?i)zeit:\s*\d+".to_string(),
            ],
            required: Vec::new(),
        },
    )
}

/// Test: forbidden text patterns fail the slide and name the match
#[test]
fn test_text_pattern_forbidden() {
    let rule = time_annotation_rule();
    rule.validate().expect("valid rule");

    let clean = slide(vec![(
        "h1, h2, p",
        vec![ElementSnapshot::default().with_text_content("Architecture   overview")],
    )]);
    assert!(rule.evaluate(&clean, vp()).passed);

    let minutes = slide(vec![(
        "h1, h2, p",
        vec![
            ElementSnapshot::default().with_text_content("Intro"),
            ElementSnapshot::default().with_text_content("Live demo (10 min)"),
        ],
    )]);
    let out = rule.evaluate(&minutes, vp());
    assert!(!out.passed);
    assert!(out.message.contains("element #1"), "{}", out.message);
    assert!(out.message.contains("Live demo (10 min)"), "{}", out.message);

    let zeit = slide(vec![(
        "h1, h2, p",
        vec![ElementSnapshot::default().with_text_content("Zeit: 15")],
    )]);
    assert!(!rule.evaluate(&zeit, vp()).passed);
}

/// Test: required patterns must match at least one element
#[test]
fn test_text_pattern_required() {
    let rule = Rule::new(
        "agenda-numbered",
        RuleKind::TextPattern {
            selector: "li".to_string(),
            forbidden: Vec::new(),
            required: vec![r"^\d+\.".to_string()],
        },
    );
    let numbered = slide(vec![(
        "li",
        vec![
            ElementSnapshot::default().with_text_content("Welcome"),
            ElementSnapshot::default().with_text_content("2. Roadmap"),
        ],
    )]);
    assert!(rule.evaluate(&numbered, vp()).passed);

    let plain = slide(vec![(
        "li",
        vec![ElementSnapshot::default().with_text_content("Roadmap")],
    )]);
    let out = rule.evaluate(&plain, vp());
    assert!(!out.passed);
    assert!(out.message.contains("required pattern"), "{}", out.message);
}

/// Test: text patterns load from TOML and bad patterns are rejected
#[test]
fn test_text_pattern_config() {
    let config: RuleSetConfig = toml::from_str(
        r#"
        [[default]]
        name = "no-time-annotations"
        type = "text_pattern"
        forbidden = ['\(\d+ min\)']
        only_if_present = true
        "#,
    )
    .expect("parse");
    let rules = RuleSet::from_config(config).expect("valid");
    assert!(rules.selectors().contains("h1, h2, h3, h4, p, li, pre, td, th, blockquote"));

    let unbalanced: RuleSetConfig = toml::from_str(
        r#"
        [[default]]
        name = "broken"
        type = "text_pattern"
        forbidden = ['(unclosed']
        "#,
    )
    .expect("parse");
    let err = RuleSet::from_config(unbalanced).unwrap_err();
    assert_eq!(err.kind(), "invalid_rule_definition");
    assert!(err.to_string().contains("(unclosed"), "{}", err);

    let empty: RuleSetConfig = toml::from_str(
        r#"
        [[default]]
        name = "empty"
        type = "text_pattern"
        "#,
    )
    .expect("parse");
    assert!(RuleSet::from_config(empty).is_err());
}

/// Test: the built-in catalogue routes rules by slide type
#[test]
fn test_builtin_rules_for_types() {
    let rules = RuleSet::builtin();
    let names = |t: &str| -> Vec<String> {
        rules.rules_for(t).iter().map(|r| r.name.clone()).collect()
    };
    assert_eq!(
        names("title"),
        vec!["no-overflow", "fragment-sequence", "title-elements", "title-centered"]
    );
    assert_eq!(names("unknown"), vec!["no-overflow", "fragment-sequence"]);
    assert!(names("two-columns").contains(&"columns-side-by-side".to_string()));
}

/// Test: a rule set round-trips through TOML and keeps its digest
#[test]
fn test_rule_set_toml_round_trip() {
    let builtin = RuleSet::builtin();
    let text = toml::to_string_pretty(&builtin.to_config()).expect("serialize");
    let parsed: RuleSetConfig = toml::from_str(&text).expect("parse");
    let rebuilt = RuleSet::from_config(parsed).expect("valid");
    assert_eq!(rebuilt, builtin);
    assert_eq!(rebuilt.digest(), builtin.digest());
}

/// Test: a custom TOML rule set with severities and opt-in rules
#[test]
fn test_custom_rule_set_from_toml() {
    let config: RuleSetConfig = toml::from_str(
        r##"
        [[classifier]]
        slide_type = "title"
        markers = [".title-slide"]

        [[default]]
        name = "no-overflow"
        type = "no_overflow"
        tolerance_px = 4

        [[types.title]]
        name = "brand-color"
        type = "computed_style"
        selector = "h1"
        property = "color"
        expected = "rgb(0, 0, 0)"
        severity = "warning"

        [[types.title]]
        name = "fragments-hidden"
        type = "fragment_visibility"
        "##,
    )
    .expect("parse");
    let rules = RuleSet::from_config(config).expect("valid");
    let title = rules.rules_for("title");
    assert_eq!(title.len(), 3);
    assert_eq!(title[1].severity, Severity::Warning);
    assert!(rules.selectors().contains(".fragment"));
}

/// Test: malformed rules are rejected, not skipped
#[test]
fn test_invalid_rules_rejected() {
    let bad_property: RuleSetConfig = toml::from_str(
        r#"
        [[default]]
        name = "bogus"
        type = "computed_style"
        selector = "h1"
        property = "transform"
        expected = "none"
        "#,
    )
    .expect("parse");
    let err = RuleSet::from_config(bad_property).unwrap_err();
    assert_eq!(err.kind(), "invalid_rule_definition");

    let unknown_type: RuleSetConfig = toml::from_str(
        r#"
        [[types.keynote]]
        name = "x"
        type = "required_elements_present"
        selectors = ["h1"]
        "#,
    )
    .expect("parse");
    assert!(RuleSet::from_config(unknown_type).is_err());

    let bad_selector: RuleSetConfig = toml::from_str(
        r#"
        [[default]]
        name = "x"
        type = "required_elements_present"
        selectors = ["div[data-x"]
        "#,
    )
    .expect("parse");
    assert!(RuleSet::from_config(bad_selector).is_err());
}
