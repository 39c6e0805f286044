//! The response handle returned by [`crate::Requestor::send`].
//!
//! The body is read off the wire once, eagerly, and cached; `json()`/
//! `text()` are "lazy" only in the sense that an implementation that never
//! calls them never pays the parse cost, not in the sense that they defer
//! the network read.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("response body is not valid UTF-8")]
    NotUtf8,

    #[error("failed to parse response body as JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// A completed HTTP response: status, multi-valued headers in the order
/// the server sent them, and a cached body.
#[derive(Debug, Clone)]
pub struct ResponseHandle {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseHandle {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self { status, headers, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// All values for a header name, in insertion order (a provider may
    /// send `Link` or `Set-Cookie` more than once).
    pub fn header_values<'a>(&'a self, name: &str) -> Vec<&'a str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).into_iter().next()
    }

    pub fn text(&self) -> Result<&str, BodyError> {
        std::str::from_utf8(&self.body).map_err(|_| BodyError::NotUtf8)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, BodyError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: String,
    }

    #[test]
    fn test_json_parses_cached_body() {
        let resp = ResponseHandle::new(
            200,
            vec![("Content-Type".to_string(), "application/json".to_string())],
            r#"{"id":"abc"}"#.as_bytes().to_vec(),
        );
        assert_eq!(resp.json::<Item>().unwrap(), Item { id: "abc".to_string() });
    }

    #[test]
    fn test_header_values_is_case_insensitive_and_multi_valued() {
        let resp = ResponseHandle::new(
            200,
            vec![("Link".to_string(), "a".to_string()), ("link".to_string(), "b".to_string())],
            Vec::new(),
        );
        assert_eq!(resp.header_values("LINK"), vec!["a", "b"]);
    }

    #[test]
    fn test_is_success() {
        assert!(ResponseHandle::new(204, vec![], Vec::new()).is_success());
        assert!(!ResponseHandle::new(404, vec![], Vec::new()).is_success());
    }
}
