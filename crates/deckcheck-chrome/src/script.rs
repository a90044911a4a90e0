//! Page-side inspection script.
//!
//! The script only reads: bounding boxes, whitelisted computed styles,
//! class lists, whitespace-collapsed text and `data-fragment-index`. Selectors are
//! resolved inside the current slide root, and the root itself counts as a
//! match when it satisfies the selector.

use deckcheck_core::STYLE_WHITELIST;
use std::collections::BTreeSet;

const INSPECT_TEMPLATE: &str = r#"(() => {
  const root = __ROOT__;
  if (!root) { throw new Error('current slide element not found'); }
  const selectors = __SELECTORS__;
  const props = __PROPS__;
  const snap = (el) => {
    const r = el.getBoundingClientRect();
    const cs = window.getComputedStyle(el);
    const style = {};
    for (const p of props) { style[p] = cs.getPropertyValue(p); }
    const raw = el.getAttribute('data-fragment-index');
    const idx = raw === null ? NaN : parseInt(raw, 10);
    const text = (el.innerText || el.textContent || '').replace(/\s+/g, ' ').trim();
    return {
      rect: { x: r.x, y: r.y, width: r.width, height: r.height },
      style,
      classes: Array.from(el.classList),
      has_text: text.length > 0,
      text,
      fragment_index: Number.isNaN(idx) ? null : idx,
    };
  };
  const elements = {};
  for (const sel of selectors) {
    const found = Array.from(root.querySelectorAll(sel));
    if (root.matches(sel)) { found.unshift(root); }
    elements[sel] = { elements: found.map(snap) };
  }
  return { root_classes: Array.from(root.classList), elements };
})()"#;

/// Build the inspection expression for `selectors`, with `root_expr`
/// locating the current slide.
pub fn inspect_script(root_expr: &str, selectors: &BTreeSet<String>) -> String {
    // serde_json string encoding doubles as JS literal escaping.
    let selectors = serde_json::to_string(selectors).unwrap_or_else(|_| "[]".to_string());
    let props = serde_json::to_string(STYLE_WHITELIST).unwrap_or_else(|_| "[]".to_string());
    INSPECT_TEMPLATE
        .replace("__ROOT__", root_expr)
        .replace("__SELECTORS__", &selectors)
        .replace("__PROPS__", &props)
}
