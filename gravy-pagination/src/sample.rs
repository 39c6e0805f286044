//! `ItemSampleResult` (§4.7): the uniform page-result shape every provider
//! operation that lists items returns, regardless of which `Cursor`
//! family backs its pagination.

use serde::{Deserialize, Serialize};

/// A single page of `T` (a provider-specific item shape from C9), framed
/// with enough cursor plumbing for a caller to walk forward, back, or
/// jump to the first page without knowing which `Cursor` variant is in
/// play underneath the opaque strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSampleResult<T> {
    pub items: Vec<T>,
    pub total_count: Option<u64>,
    pub this_sample_cursor: String,
    /// `None` is the canonical terminator: there is no next page.
    pub next_sample_cursor: Option<String>,
    pub prev_sample_cursor: Option<String>,
    pub first_sample_cursor: String,
}

impl<T> ItemSampleResult<T> {
    pub fn is_last_page(&self) -> bool {
        self.next_sample_cursor.is_none()
    }

    pub fn is_first_page(&self) -> bool {
        self.this_sample_cursor == self.first_sample_cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Cursor;

    #[test]
    fn test_last_page_has_no_next_cursor() {
        let first = Cursor::Offset { offset: 0, limit: 20 }.serialize();
        let result = ItemSampleResult::<&str> {
            items: vec!["a", "b"],
            total_count: Some(2),
            this_sample_cursor: first.clone(),
            next_sample_cursor: None,
            prev_sample_cursor: None,
            first_sample_cursor: first,
        };
        assert!(result.is_last_page());
        assert!(result.is_first_page());
    }

    #[test]
    fn test_middle_page_has_both_neighbors() {
        let first = Cursor::Offset { offset: 0, limit: 20 }.serialize();
        let this = Cursor::Offset { offset: 20, limit: 20 }.serialize();
        let next = Cursor::Offset { offset: 40, limit: 20 }.serialize();
        let result = ItemSampleResult::<&str> {
            items: vec!["c"],
            total_count: Some(60),
            this_sample_cursor: this.clone(),
            next_sample_cursor: Some(next),
            prev_sample_cursor: Some(first.clone()),
            first_sample_cursor: first,
        };
        assert!(!result.is_last_page());
        assert!(!result.is_first_page());
    }
}
