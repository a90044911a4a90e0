//! Rule evaluation.

use regex::Regex;
use std::collections::BTreeMap;

use super::{Outcome, Rule, RuleKind};
use crate::model::{ElementSnapshot, SlideSnapshot, Viewport};

pub(crate) fn evaluate(rule: &Rule, snapshot: &SlideSnapshot, viewport: Viewport) -> Outcome {
    // Presence gate shared by every single-selector rule.
    if !matches!(rule.kind, RuleKind::RequiredElementsPresent { .. }) {
        let absent: Vec<&str> = rule
            .selectors()
            .into_iter()
            .filter(|sel| !snapshot.is_present(sel))
            .collect();
        if !absent.is_empty() {
            return if rule.only_if_present {
                pass(format!("not applicable: '{}' matched no elements", absent.join("', '")))
            } else {
                fail(format!("'{}' matched no elements", absent.join("', '")))
            };
        }
    }

    match &rule.kind {
        RuleKind::NoOverflow {
            selector,
            tolerance_px,
        } => no_overflow(&snapshot.get(selector).elements, viewport, *tolerance_px),
        RuleKind::RequiredElementsPresent { selectors } => {
            let missing: Vec<&str> = selectors
                .iter()
                .map(String::as_str)
                .filter(|sel| !snapshot.is_present(sel))
                .collect();
            if missing.is_empty() {
                pass(format!("all {} required selector(s) present", selectors.len()))
            } else {
                fail(format!("missing required element(s): {}", missing.join(", ")))
            }
        }
        RuleKind::TextAlignment { selector, expected } => {
            text_alignment(&snapshot.get(selector).elements, expected)
        }
        RuleKind::LayoutArrangement {
            selector,
            min_count,
            tolerance_px,
        } => layout_arrangement(&snapshot.get(selector).elements, *min_count, *tolerance_px),
        RuleKind::FragmentSequenceIntegrity {
            selector,
            first_index,
        } => fragment_sequence(&snapshot.get(selector).elements, *first_index),
        RuleKind::ElementSizeBound {
            selector,
            max_fraction,
        } => size_bound(&snapshot.get(selector).elements, viewport, *max_fraction),
        RuleKind::ComputedStyle {
            selector,
            property,
            expected,
        } => computed_style(&snapshot.get(selector).elements, property, expected),
        RuleKind::TextPattern {
            selector,
            forbidden,
            required,
        } => text_pattern(&snapshot.get(selector).elements, forbidden, required),
        RuleKind::FragmentVisibility {
            selector,
            visible_class,
            expected_visible,
        } => {
            let visible = snapshot
                .get(selector)
                .elements
                .iter()
                .filter(|e| e.has_class(visible_class))
                .count();
            if visible == *expected_visible {
                pass(format!("{} fragment(s) visible on arrival", visible))
            } else {
                fail(format!(
                    "{} fragment(s) carry '{}' on arrival, expected {}",
                    visible, visible_class, expected_visible
                ))
            }
        }
    }
}

fn pass(message: String) -> Outcome {
    Outcome {
        passed: true,
        message,
    }
}

fn fail(message: String) -> Outcome {
    Outcome {
        passed: false,
        message,
    }
}

fn no_overflow(elements: &[ElementSnapshot], viewport: Viewport, tolerance: f64) -> Outcome {
    let max_right = f64::from(viewport.width) + tolerance;
    let max_bottom = f64::from(viewport.height) + tolerance;
    let text: Vec<&ElementSnapshot> = elements.iter().filter(|e| e.has_text).collect();
    let overflowing: Vec<&ElementSnapshot> = text
        .iter()
        .copied()
        .filter(|e| e.rect.right() > max_right || e.rect.bottom() > max_bottom)
        .collect();

    match overflowing.first() {
        None => pass(format!(
            "{} text element(s) within {} (tolerance {}px)",
            text.len(),
            viewport,
            tolerance
        )),
        Some(first) => fail(format!(
            "{} of {} text element(s) overflow {} (tolerance {}px); first: right={}, bottom={}",
            overflowing.len(),
            text.len(),
            viewport,
            tolerance,
            first.rect.right(),
            first.rect.bottom()
        )),
    }
}

pub(crate) fn is_known_alignment(value: &str) -> bool {
    matches!(
        normalize_alignment(value).as_str(),
        "left" | "right" | "center" | "justify"
    )
}

/// Computed `text-align` as Chrome reports it, folded onto the physical
/// keywords for left-to-right documents.
fn normalize_alignment(value: &str) -> String {
    match value.trim().to_ascii_lowercase().as_str() {
        "start" => "left".to_string(),
        "end" => "right".to_string(),
        "-webkit-center" => "center".to_string(),
        "-webkit-left" => "left".to_string(),
        "-webkit-right" => "right".to_string(),
        other => other.to_string(),
    }
}

fn text_alignment(elements: &[ElementSnapshot], expected: &str) -> Outcome {
    let want = normalize_alignment(expected);
    for (i, element) in elements.iter().enumerate() {
        let actual = element.style_value("text-align").unwrap_or("");
        if normalize_alignment(actual) != want {
            return fail(format!(
                "element #{} has text-align '{}', expected '{}'",
                i, actual, expected
            ));
        }
    }
    pass(format!("{} element(s) aligned '{}'", elements.len(), expected))
}

fn layout_arrangement(elements: &[ElementSnapshot], min_count: usize, band: f64) -> Outcome {
    if elements.len() < min_count {
        return fail(format!(
            "found {} sibling container(s), need at least {}",
            elements.len(),
            min_count
        ));
    }

    let mids = elements.iter().map(|e| e.rect.mid_y());
    let lowest = mids.clone().fold(f64::INFINITY, f64::min);
    let highest = mids.fold(f64::NEG_INFINITY, f64::max);
    if highest - lowest > band {
        return fail(format!(
            "vertical midpoints spread {}px, exceeding the {}px band (stacked layout)",
            highest - lowest,
            band
        ));
    }

    for (i, pair) in elements.windows(2).enumerate() {
        let (prev, next) = (&pair[0].rect, &pair[1].rect);
        let min_left = prev.x + prev.width / 2.0;
        if next.x < min_left {
            return fail(format!(
                "container #{} starts at x={}, expected >= {} (previous left edge plus half its width)",
                i + 1,
                next.x,
                min_left
            ));
        }
    }

    pass(format!("{} containers arranged horizontally", elements.len()))
}

fn fragment_sequence(elements: &[ElementSnapshot], first_index: i64) -> Outcome {
    let n = elements.len();
    let unindexed = elements.iter().filter(|e| e.fragment_index.is_none()).count();

    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for index in elements.iter().filter_map(|e| e.fragment_index) {
        *counts.entry(index).or_default() += 1;
    }

    let last = first_index + n as i64 - 1;
    let mut problems = Vec::new();
    if unindexed > 0 {
        problems.push(format!("{} fragment(s) without an index", unindexed));
    }
    for (index, count) in &counts {
        if *count > 1 {
            problems.push(format!("duplicate fragment index {} (x{})", index, count));
        }
    }
    let missing: Vec<String> = (first_index..=last)
        .filter(|i| !counts.contains_key(i))
        .map(|i| i.to_string())
        .collect();
    if !missing.is_empty() {
        problems.push(format!("missing fragment index {}", missing.join(", ")));
    }
    let unexpected: Vec<String> = counts
        .keys()
        .filter(|i| **i < first_index || **i > last)
        .map(|i| i.to_string())
        .collect();
    if !unexpected.is_empty() {
        problems.push(format!("unexpected fragment index {}", unexpected.join(", ")));
    }

    if problems.is_empty() {
        pass(format!("fragments numbered {}..={}", first_index, last))
    } else {
        fail(problems.join("; "))
    }
}

fn size_bound(elements: &[ElementSnapshot], viewport: Viewport, max_fraction: f64) -> Outcome {
    let max_w = f64::from(viewport.width) * max_fraction;
    let max_h = f64::from(viewport.height) * max_fraction;
    for (i, element) in elements.iter().enumerate() {
        if element.rect.height > max_h || element.rect.width > max_w {
            return fail(format!(
                "element #{} is {}x{}px, limit {}x{}px ({}% of {})",
                i,
                element.rect.width,
                element.rect.height,
                max_w,
                max_h,
                max_fraction * 100.0,
                viewport
            ));
        }
    }
    pass(format!(
        "{} element(s) within {}% of {}",
        elements.len(),
        max_fraction * 100.0,
        viewport
    ))
}

fn computed_style(elements: &[ElementSnapshot], property: &str, expected: &str) -> Outcome {
    let want = normalize_style(expected);
    for (i, element) in elements.iter().enumerate() {
        let actual = element.style_value(property).unwrap_or("");
        if normalize_style(actual) != want {
            return fail(format!(
                "element #{} has {} '{}', expected '{}'",
                i, property, actual, expected
            ));
        }
    }
    pass(format!("{} element(s) have {} '{}'", elements.len(), property, expected))
}

fn text_pattern(
    elements: &[ElementSnapshot],
    forbidden: &[String],
    required: &[String],
) -> Outcome {
    for pattern in forbidden {
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(err) => return fail(format!("invalid pattern '{}': {}", pattern, err)),
        };
        if let Some((i, el)) = elements.iter().enumerate().find(|(_, e)| re.is_match(&e.text)) {
            return fail(format!(
                "element #{} text '{}' matches forbidden pattern '{}'",
                i,
                excerpt(&el.text),
                pattern
            ));
        }
    }
    for pattern in required {
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(err) => return fail(format!("invalid pattern '{}': {}", pattern, err)),
        };
        if !elements.iter().any(|e| re.is_match(&e.text)) {
            return fail(format!("no element text matches required pattern '{}'", pattern));
        }
    }
    pass(format!(
        "{} element(s) checked against {} forbidden and {} required pattern(s)",
        elements.len(),
        forbidden.len(),
        required.len()
    ))
}

fn excerpt(text: &str) -> String {
    const MAX_CHARS: usize = 60;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_CHARS).collect();
        format!("{}...", head)
    }
}

/// Case-insensitive and insensitive to whitespace inside functional
/// notation, so `rgb(0,0,0)` equals `rgb(0, 0, 0)`.
fn normalize_style(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}
