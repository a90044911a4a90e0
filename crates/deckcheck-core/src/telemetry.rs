//! Log setup for the `deckcheck` binary.
//!
//! stdout carries the console summary only; every log line goes to stderr
//! so CI jobs can capture the two separately. `RUST_LOG` replaces the
//! default filter entirely.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Browser transport targets that flood debug output with per-frame CDP
/// traffic.
const QUIET_TARGETS: &[&str] = &[
    "chromiumoxide::conn=off",
    "chromiumoxide::handler=warn",
    "tungstenite=warn",
];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_filter(level: Level) -> String {
    let mut directives = vec![level.as_str().to_ascii_lowercase()];
    directives.extend(QUIET_TARGETS.iter().map(|d| d.to_string()));
    directives.join(",")
}

/// Install the global subscriber; `json` switches to one JSON object per
/// line, with event targets included.
///
/// Only the first call in a process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));
    let registry = tracing_subscriber::registry().with(filter);
    let layer = fmt::layer().with_writer(std::io::stderr);

    if json {
        registry.with(layer.json()).try_init().ok();
    } else {
        registry.with(layer.with_target(false)).try_init().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_quiets_cdp_transport() {
        let filter = default_filter(Level::DEBUG);
        assert!(filter.starts_with("debug,"));
        assert!(filter.contains("chromiumoxide::conn=off"));
        assert!(EnvFilter::try_new(&filter).is_ok());
    }

    #[test]
    fn test_second_init_is_ignored() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }
}
