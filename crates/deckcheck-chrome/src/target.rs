//! Presentation target resolution.

use deckcheck_core::{DeckError, Result};
use std::path::Path;
use url::Url;

/// Turn a configured target into a URL the browser can open.
///
/// `http`, `https` and `file` URLs pass through; anything else is treated
/// as a local path, canonicalised and converted to a `file://` URL.
pub fn resolve_target(target: &str) -> Result<Url> {
    let trimmed = target.trim();
    if let Ok(url) = Url::parse(trimmed) {
        match url.scheme() {
            "http" | "https" | "file" => return Ok(url),
            // Windows drive letters parse as a one-letter scheme.
            scheme if scheme.len() > 1 => {
                return Err(DeckError::Navigation(format!(
                    "unsupported URL scheme '{}' in {}",
                    scheme, trimmed
                )))
            }
            _ => {}
        }
    }

    let path = Path::new(trimmed);
    let canonical = path.canonicalize().map_err(|e| {
        DeckError::Navigation(format!("cannot open {}: {}", path.display(), e))
    })?;
    Url::from_file_path(&canonical).map_err(|_| {
        DeckError::Navigation(format!("cannot express {} as a file URL", canonical.display()))
    })
}
