//! Substring helpers used by locator expansion.

/// Everything to the right of the first occurrence of `search` in `full`,
/// or `None` when `search` does not occur.
pub fn remainder_right_of<'a>(full: &'a str, search: &str) -> Option<&'a str> {
    full.find(search).map(|i| &full[i + search.len()..])
}

/// Everything to the left of the first occurrence of `search` in `full`,
/// or `None` when `search` does not occur.
pub fn remainder_left_of<'a>(full: &'a str, search: &str) -> Option<&'a str> {
    full.find(search).map(|i| &full[..i])
}

/// The substring between the first `left` and the first `right` after it.
pub fn extract_between<'a>(full: &'a str, left: &str, right: &str) -> Option<&'a str> {
    remainder_right_of(full, left).and_then(|rest| remainder_left_of(rest, right))
}

/// Collapse contiguous repeats of `needle` in `haystack` down to a single
/// occurrence.
pub fn deduplicate(haystack: &str, needle: &str) -> String {
    let doubled = needle.repeat(2);
    let mut out = haystack.to_string();
    while out.contains(&doubled) {
        out = out.replace(&doubled, needle);
    }
    out
}
