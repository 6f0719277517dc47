//! Candidate URL normalization
//!
//! Turns whatever a heuristic scraped out of a page (absolute URLs,
//! protocol-relative references, paths relative to a frame or playlist)
//! into an absolute URL. Best-effort: a reference that cannot be resolved
//! comes back unchanged rather than as an error.

use url::Url;

/// Resolve `candidate` against `base`.
///
/// Returns `None` only for an empty candidate.
#[must_use]
pub fn normalize(candidate: &str, base: &str) -> Option<String> {
    if candidate.is_empty() {
        return None;
    }
    if candidate.starts_with("//") {
        return Some(format!("https:{candidate}"));
    }
    if candidate.starts_with("http://") || candidate.starts_with("https://") {
        return Some(candidate.to_string());
    }

    let joined = Url::parse(base).and_then(|base| base.join(candidate));
    Some(joined.map_or_else(|_| candidate.to_string(), String::from))
}
