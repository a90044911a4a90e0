//! Renderer integrations.
//!
//! Each renderer is described by a handful of page-side JavaScript
//! expressions: readiness, slide count, jump and current slide root.
//! Expressions are synchronous and return JSON-serializable values.

use deckcheck_core::{NavigationMode, RendererKind};

/// A concrete presentation framework detected on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renderer {
    Reveal,
    Slidev,
    /// Marp bespoke HTML export; no jump API.
    Marp,
}

/// Probe order used by `auto`.
pub const PROBE_ORDER: [Renderer; 3] = [Renderer::Reveal, Renderer::Slidev, Renderer::Marp];

impl Renderer {
    pub fn name(&self) -> &'static str {
        match self {
            Renderer::Reveal => "reveal",
            Renderer::Slidev => "slidev",
            Renderer::Marp => "marp",
        }
    }

    /// Renderers a configured kind may resolve to, in probe order.
    pub fn candidates(kind: RendererKind) -> Vec<Renderer> {
        match kind {
            RendererKind::Auto => PROBE_ORDER.to_vec(),
            RendererKind::Reveal => vec![Renderer::Reveal],
            RendererKind::Slidev => vec![Renderer::Slidev],
            RendererKind::Marp => vec![Renderer::Marp],
        }
    }

    pub fn navigation_mode(&self) -> NavigationMode {
        match self {
            Renderer::Reveal | Renderer::Slidev => NavigationMode::Direct,
            Renderer::Marp => NavigationMode::Stepping,
        }
    }

    /// Boolean expression, true once the renderer finished initialising.
    pub fn ready_expr(&self) -> &'static str {
        match self {
            Renderer::Reveal => {
                "typeof window.Reveal !== 'undefined' \
                 && typeof Reveal.isReady === 'function' && Reveal.isReady() === true"
            }
            Renderer::Slidev => {
                "!!(window.__slidev__ && window.__slidev__.nav \
                 && document.querySelector('#slide-content'))"
            }
            Renderer::Marp => {
                "document.readyState === 'complete' \
                 && typeof window.Reveal === 'undefined' && !window.__slidev__ \
                 && !!document.querySelector('svg[data-marpit-svg], .bespoke-marp-parent')"
            }
        }
    }

    /// Numeric expression: total slide count.
    pub fn count_expr(&self) -> &'static str {
        match self {
            Renderer::Reveal => "Reveal.getTotalSlides()",
            Renderer::Slidev => {
                "(t => (t !== null && typeof t === 'object') ? t.value : t)\
                 (window.__slidev__.nav.total)"
            }
            Renderer::Marp => {
                "document.querySelectorAll('svg[data-marpit-svg]').length \
                 || document.querySelectorAll('section').length"
            }
        }
    }

    /// Boolean expression jumping to 0-based `index`, or `None` when the
    /// renderer only supports relative stepping.
    ///
    /// Reveal counts vertical slides in `getTotalSlides`, so the flat index
    /// is mapped through `getSlides`/`getIndices`. Slidev numbers slides
    /// from 1.
    pub fn jump_expr(&self, index: usize) -> Option<String> {
        match self {
            Renderer::Reveal => Some(format!(
                "(() => {{ const s = Reveal.getSlides()[{}]; if (!s) return false; \
                 const ix = Reveal.getIndices(s); Reveal.slide(ix.h, ix.v || 0); return true; }})()",
                index
            )),
            Renderer::Slidev => Some(format!(
                "(() => {{ window.__slidev__.nav.go({}); return true; }})()",
                index + 1
            )),
            Renderer::Marp => None,
        }
    }

    /// Expression evaluating to the current slide's root element.
    pub fn root_expr(&self) -> &'static str {
        match self {
            Renderer::Reveal => {
                "Array.from(document.querySelectorAll('.reveal .slides section.present')).pop()"
            }
            Renderer::Slidev => "document.querySelector('#slide-content')",
            Renderer::Marp => {
                "(document.querySelector('.bespoke-marp-active') \
                 || document.querySelector('section'))"
            }
        }
    }
}

/// Expression returning, per renderer name, whether it is ready.
pub fn probe_expr(candidates: &[Renderer]) -> String {
    let fields: Vec<String> = candidates
        .iter()
        .map(|r| {
            format!(
                "{}: (() => {{ try {{ return {}; }} catch (e) {{ return false; }} }})()",
                r.name(),
                r.ready_expr()
            )
        })
        .collect();
    format!("({{ {} }})", fields.join(", "))
}

/// First ready renderer among `candidates`, honouring their order.
pub fn pick_ready(candidates: &[Renderer], probe: &serde_json::Value) -> Option<Renderer> {
    candidates
        .iter()
        .copied()
        .find(|r| probe.get(r.name()).and_then(serde_json::Value::as_bool) == Some(true))
}
