//! Matching candidates against ordered pattern lists

use super::pattern::SearchPattern;

/// Check a candidate against an ordered list of patterns
///
/// The candidate is lower-cased once, then patterns are tried in list order
/// and the first hit wins. Pure function; safe to call from any thread.
pub fn matches(candidate: &str, patterns: &[SearchPattern]) -> bool {
    if patterns.is_empty() {
        return false;
    }

    let lowered = candidate.to_lowercase();
    patterns.iter().any(|p| p.matches_lowered(&lowered))
}

/// Check whether any of several candidates matches
pub fn matches_any<'a, I>(candidates: I, patterns: &[SearchPattern]) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    if patterns.is_empty() {
        return false;
    }

    candidates.into_iter().any(|c| matches(c, patterns))
}
