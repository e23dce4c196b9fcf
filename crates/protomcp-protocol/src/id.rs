//! Request identifiers.
//!
//! `RequestId` preserves the JSON-RPC `id` field's logical value and type
//! across encode/decode round-trips: the number `1` and the string `"1"`
//! are never conflated. A request id is never null; a response id may be
//! null only for pre-parse errors, which `ResponseId` models separately.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A JSON-RPC request identifier: either a string or a number.
///
/// `PartialEq`/`Hash` are type-sensitive: the number `1` and the string
/// `"1"` are distinct ids, matching JSON's own type distinction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// A string identifier.
    String(String),
    /// A numeric identifier. Stored as `i64`; MCP peers never emit
    /// fractional request ids.
    Number(i64),
}

impl RequestId {
    /// Build a monotonic numeric id, as used by `protomcp-session`'s
    /// per-session id generator.
    pub fn from_counter(n: u64) -> Self {
        Self::Number(n as i64)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        Self::Number(n as i64)
    }
}

/// The `id` field of a response: `Some` for a normal response, `None` only
/// when the peer could not even parse far enough to recover the request id
/// (a pre-parse `ParseError`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(pub Option<RequestId>);

impl ResponseId {
    /// Wrap a known request id.
    pub fn of(id: RequestId) -> Self {
        Self(Some(id))
    }

    /// The null id used for pre-parse errors.
    pub fn null() -> Self {
        Self(None)
    }

    /// Borrow the inner id, if any.
    pub fn as_request_id(&self) -> Option<&RequestId> {
        self.0.as_ref()
    }

    /// Whether this is the null id.
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_and_number_ids_are_distinct_types() {
        let s = RequestId::String("1".into());
        let n = RequestId::Number(1);
        assert_ne!(s, n);
    }

    #[test]
    fn round_trips_through_json_preserving_type() {
        let n = RequestId::Number(42);
        let encoded = serde_json::to_string(&n).unwrap();
        assert_eq!(encoded, "42");
        let decoded: RequestId = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, n);

        let s = RequestId::String("abc".into());
        let encoded = serde_json::to_string(&s).unwrap();
        assert_eq!(encoded, "\"abc\"");
        let decoded: RequestId = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, s);
    }

    #[test]
    fn null_response_id_round_trips() {
        let id = ResponseId::null();
        let encoded = serde_json::to_string(&id).unwrap();
        assert_eq!(encoded, "null");
        let decoded: ResponseId = serde_json::from_str(&encoded).unwrap();
        assert!(decoded.is_null());
    }
}
