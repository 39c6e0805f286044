//! The `Cursor` sum type (§4.7) and its opaque-string wire format.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidCursor {
    #[error("cursor string is empty")]
    Empty,

    #[error("offset cursor must be \"<offset>|<limit>\", got {0:?}")]
    MalformedOffset(String),
}

/// One page position, opaque to callers outside this crate. Every
/// provider implementation converts its native pagination state into one
/// of these two shapes before handing it back as `next_sample_cursor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// A numeric position into a provider's results, for providers whose
    /// API takes a plain `offset`/`limit` pair.
    Offset { offset: u64, limit: u64 },

    /// A provider-issued opaque marker (a continuation token, a `next`
    /// link, a cursor ID) carried through verbatim.
    Marker { opaque_marker: String },
}

impl Cursor {
    /// Encodes the cursor as the opaque string handed to API consumers.
    /// `Offset` serializes as `"<offset>|<limit>"`; `Marker` passes the
    /// provider's own token through unmodified so providers that expect
    /// to see their own marker format back on the next request still can.
    pub fn serialize(&self) -> String {
        match self {
            Self::Offset { offset, limit } => format!("{offset}|{limit}"),
            Self::Marker { opaque_marker } => opaque_marker.clone(),
        }
    }

    /// Parses a cursor previously produced by [`Self::serialize`]. Any
    /// string containing a `|` is interpreted as an offset cursor (no
    /// legitimate provider marker format does); everything else is
    /// treated as an opaque marker.
    pub fn parse(value: &str) -> Result<Self, InvalidCursor> {
        if value.is_empty() {
            return Err(InvalidCursor::Empty);
        }
        if let Some((offset_str, limit_str)) = value.split_once('|') {
            let offset = offset_str.parse::<u64>().map_err(|_| InvalidCursor::MalformedOffset(value.to_string()))?;
            let limit = limit_str.parse::<u64>().map_err(|_| InvalidCursor::MalformedOffset(value.to_string()))?;
            return Ok(Self::Offset { offset, limit });
        }
        Ok(Self::Marker { opaque_marker: value.to_string() })
    }

    /// The cursor for the page immediately after this one, for the
    /// `Offset` family (providers that hand back a marker compute their
    /// own `next` value and never call this).
    pub fn next_offset(&self, total_count: Option<u64>) -> Option<Self> {
        match self {
            Self::Offset { offset, limit } => {
                let next_offset = offset + limit;
                match total_count {
                    Some(total) if next_offset >= total => None,
                    _ => Some(Self::Offset { offset: next_offset, limit: *limit }),
                }
            }
            Self::Marker { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_cursor_round_trips() {
        let cursor = Cursor::Offset { offset: 40, limit: 20 };
        let serialized = cursor.serialize();
        assert_eq!(serialized, "40|20");
        assert_eq!(Cursor::parse(&serialized).unwrap(), cursor);
    }

    #[test]
    fn test_marker_cursor_round_trips() {
        let cursor = Cursor::Marker { opaque_marker: "eyJwYWdlIjoyfQ==".to_string() };
        let serialized = cursor.serialize();
        assert_eq!(Cursor::parse(&serialized).unwrap(), cursor);
    }

    #[test]
    fn test_parse_rejects_empty_string() {
        assert_eq!(Cursor::parse(""), Err(InvalidCursor::Empty));
    }

    #[test]
    fn test_parse_rejects_malformed_offset() {
        assert!(matches!(Cursor::parse("abc|def"), Err(InvalidCursor::MalformedOffset(_))));
    }

    #[test]
    fn test_next_offset_terminates_at_total_count() {
        let cursor = Cursor::Offset { offset: 80, limit: 20 };
        assert_eq!(cursor.next_offset(Some(100)), None);
        assert_eq!(cursor.next_offset(Some(200)), Some(Cursor::Offset { offset: 100, limit: 20 }));
        assert_eq!(cursor.next_offset(None), Some(Cursor::Offset { offset: 100, limit: 20 }));
    }

    #[test]
    fn test_marker_cursor_has_no_computed_next() {
        let cursor = Cursor::Marker { opaque_marker: "tok".to_string() };
        assert_eq!(cursor.next_offset(None), None);
    }
}
