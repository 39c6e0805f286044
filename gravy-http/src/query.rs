//! Percent-encoded query-string construction.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters query components must keep literal. `NON_ALPHANUMERIC` minus
/// the handful of reserved characters a query string is allowed to use
/// unescaped would still over-encode relative to most provider APIs, so we
/// escape everything except the RFC 3986 `unreserved` set.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Builds a `key=value&key2=value2` query string, percent-encoding each
/// component independently. Pairs are emitted in the order given.
pub fn encode_query(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k, QUERY_ENCODE_SET),
                utf8_percent_encode(v, QUERY_ENCODE_SET)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodes_spaces_and_special_characters() {
        assert_eq!(encode_query(&[("q", "a b&c")]), "q=a%20b%26c");
    }

    #[test]
    fn test_preserves_unreserved_characters() {
        assert_eq!(encode_query(&[("id", "abc-123_DEF.ghi~")]), "id=abc-123_DEF.ghi~");
    }

    #[test]
    fn test_joins_multiple_pairs_in_order() {
        assert_eq!(encode_query(&[("a", "1"), ("b", "2")]), "a=1&b=2");
    }

    #[test]
    fn test_empty_pairs_yields_empty_string() {
        assert_eq!(encode_query(&[]), "");
    }
}
