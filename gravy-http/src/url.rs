//! Prefix-pinned relative-URL resolution.
//!
//! A provider implementation only ever hands the requestor a path relative
//! to its account's configured base URL; this is the boundary that keeps
//! it from being tricked (by a malicious API response, say) into reaching
//! somewhere else. Three things are rejected outright, matching what a
//! "full URL" computation for a pinned prefix must reject:
//!
//! 1. a scheme (`relative` looks like `"http://..."` or `"javascript:..."`),
//! 2. a network-location / protocol-relative form (`"//evil.example"`),
//! 3. an absolute path (`"/etc/passwd"`, which would escape the prefix's
//!    own path component entirely).
//!
//! After joining, the resolved URL must still be a string-prefix of the
//! requestor's prefix URL — this is what catches `../` dot-segment escapes
//! that survive the checks above (`Url::join` normalizes dot-segments
//! before we ever see the result).

use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("relative URL escapes requestor prefix: {relative}")]
pub struct InvalidRelativeUrl {
    pub relative: String,
}

/// Resolves `relative` against `prefix`, rejecting anything that would
/// escape it.
pub fn resolve(prefix: &Url, relative: &str) -> Result<Url, InvalidRelativeUrl> {
    let reject = || InvalidRelativeUrl { relative: relative.to_string() };

    if has_scheme(relative) || relative.starts_with("//") || relative.starts_with('/') {
        return Err(reject());
    }

    let joined = prefix.join(relative).map_err(|_| reject())?;
    if !joined.as_str().starts_with(prefix.as_str()) {
        return Err(reject());
    }
    Ok(joined)
}

/// RFC 3986 `scheme = ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"`,
/// the same pattern `urlsplit` uses to decide a string carries a scheme.
fn has_scheme(s: &str) -> bool {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    for (_, c) in chars {
        if c == ':' {
            return true;
        }
        if !(c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix() -> Url {
        Url::parse("https://api.example.com/v2/").unwrap()
    }

    #[test]
    fn test_resolves_plain_relative_path() {
        let resolved = resolve(&prefix(), "folders/123/items").unwrap();
        assert_eq!(resolved.as_str(), "https://api.example.com/v2/folders/123/items");
    }

    #[test]
    fn test_rejects_absolute_scheme() {
        assert!(resolve(&prefix(), "http://evil.example/steal").is_err());
    }

    #[test]
    fn test_rejects_protocol_relative() {
        assert!(resolve(&prefix(), "//evil.example/steal").is_err());
    }

    #[test]
    fn test_rejects_leading_slash() {
        assert!(resolve(&prefix(), "/etc/passwd").is_err());
    }

    #[test]
    fn test_rejects_dot_segment_escape() {
        assert!(resolve(&prefix(), "../../../secrets").is_err());
    }

    #[test]
    fn test_rejects_javascript_scheme() {
        assert!(resolve(&prefix(), "javascript:alert(1)").is_err());
    }

    #[test]
    fn test_allows_query_and_fragment_in_relative() {
        let resolved = resolve(&prefix(), "items?q=1").unwrap();
        assert_eq!(resolved.as_str(), "https://api.example.com/v2/items?q=1");
    }
}
