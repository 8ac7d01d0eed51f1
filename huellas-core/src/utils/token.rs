// huellas-core/src/utils/token.rs
//! Share-token normalization for join-by-token.
//!
//! Users paste either the bare token (any case, stray whitespace) or the
//! whole share link; both must resolve to the same uppercase lookup key.

use url::Url;

/// Returns `None` when the input normalizes to an empty token.
///
/// - trims surrounding whitespace,
/// - for absolute URLs, keeps the last non-empty path segment,
/// - for scheme-less links (`huellas.app/m/AB12CD34`), keeps the last
///   non-empty `/`-separated segment, ignoring any query or fragment,
/// - uppercases the result.
pub fn normalize_share_token(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = match Url::parse(trimmed) {
        Ok(url) if url.has_host() => url
            .path_segments()
            .and_then(|segs| segs.filter(|s| !s.is_empty()).last())
            .unwrap_or("")
            .to_string(),
        _ => last_segment(trimmed).to_string(),
    };

    let token = candidate.trim().to_uppercase();
    if token.is_empty() { None } else { Some(token) }
}

fn last_segment(s: &str) -> &str {
    let path = s.split(['?', '#']).next().unwrap_or(s);
    path.rsplit('/').find(|seg| !seg.trim().is_empty()).unwrap_or("")
}
