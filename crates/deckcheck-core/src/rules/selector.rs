//! Structural sanity checks for CSS selectors.
//!
//! Drivers hand selectors to the page verbatim, so anything that could not
//! possibly parse (or that smuggles in a style block) is rejected up front.

/// Validate a selector list such as `h1, .title-slide > h2`.
pub fn validate_selector(selector: &str) -> Result<(), String> {
    if selector.trim().is_empty() {
        return Err("selector is empty".to_string());
    }
    if selector.contains(['{', '}', ';']) {
        return Err(format!("selector '{}' contains a style block character", selector));
    }

    let mut depth_paren = 0i32;
    let mut depth_bracket = 0i32;
    let mut quote: Option<char> = None;
    let mut segment = String::new();

    for c in selector.chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            segment.push(c);
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth_paren += 1,
            ')' => depth_paren -= 1,
            '[' => depth_bracket += 1,
            ']' => depth_bracket -= 1,
            ',' if depth_paren == 0 && depth_bracket == 0 => {
                check_segment(selector, &segment)?;
                segment.clear();
                continue;
            }
            _ => {}
        }
        if depth_paren < 0 || depth_bracket < 0 {
            return Err(format!("selector '{}' has unbalanced brackets", selector));
        }
        segment.push(c);
    }

    if quote.is_some() {
        return Err(format!("selector '{}' has an unterminated string", selector));
    }
    if depth_paren != 0 || depth_bracket != 0 {
        return Err(format!("selector '{}' has unbalanced brackets", selector));
    }
    check_segment(selector, &segment)
}

fn check_segment(selector: &str, segment: &str) -> Result<(), String> {
    let s = segment.trim();
    if s.is_empty() {
        return Err(format!("selector '{}' has an empty list entry", selector));
    }
    let combinators = ['>', '+', '~'];
    if s.starts_with(combinators) || s.ends_with(combinators) {
        return Err(format!("selector '{}' has a dangling combinator", selector));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_selectors() {
        for sel in [
            "h1",
            ".title-slide h1",
            "h1, h2",
            "pre code",
            ".reveal .slides > section.present",
            "[data-fragment-index]",
            "a[href=\"x,y\"]",
            "li:nth-child(2n + 1)",
            ":scope > .column",
        ] {
            assert!(validate_selector(sel).is_ok(), "{}", sel);
        }
    }

    #[test]
    fn test_rejects_malformed_selectors() {
        let malformed = [
            "",
            "   ",
            "h1,",
            ", h1",
            "div[",
            "div]",
            "p:not(.a",
            "h1 >",
            "> .column",
            "p { color: red }",
            "a[href='x]",
        ];
        for sel in malformed {
            assert!(validate_selector(sel).is_err(), "{:?}", sel);
        }
    }
}
