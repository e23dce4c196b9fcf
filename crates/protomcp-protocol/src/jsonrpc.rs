//! The envelope codec.
//!
//! Encodes and decodes JSON-RPC 2.0 envelopes, classifying each as a
//! [`Request`], [`Response`], or [`Notification`]. `params`/`result` are
//! kept as deferred `serde_json::Value`s rather than eagerly parsed into a
//! concrete shape, because the wire shape of those fields is
//! method-dependent and, for `content[]`, is itself polymorphic (see
//! [`crate::content`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, ErrorKind};
use crate::id::{RequestId, ResponseId};
use crate::JSONRPC_VERSION;

/// A JSON-RPC request: expects a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// The request id; echoed back on the matching response.
    pub id: RequestId,
    /// Method name; must be non-empty.
    pub method: String,
    /// Method parameters, kept as a raw value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Build a new request envelope.
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// The mutually-exclusive `result`/`error` payload of a [`Response`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    /// Success: carries the method's result.
    Success {
        /// The result value.
        result: Value,
    },
    /// Failure: carries a JSON-RPC error object.
    Error {
        /// The error object.
        error: JsonRpcError,
    },
}

/// A JSON-RPC response, matching a prior request by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// The request id this responds to, or null for a pre-parse error.
    pub id: ResponseId,
    /// Exactly one of `result`/`error`.
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

impl Response {
    /// Build a success response.
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: ResponseId::of(id),
            payload: ResponsePayload::Success { result },
        }
    }

    /// Build an error response for a known request id.
    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: ResponseId::of(id),
            payload: ResponsePayload::Error { error },
        }
    }

    /// Build an error response for a pre-parse failure (null id).
    pub fn error_without_id(error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: ResponseId::null(),
            payload: ResponsePayload::Error { error },
        }
    }

    /// `Ok(result)` on success, `Err` otherwise.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match self.payload {
            ResponsePayload::Success { result } => Ok(result),
            ResponsePayload::Error { error } => Err(error),
        }
    }
}

/// A JSON-RPC error object, as carried by [`ResponsePayload::Error`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Stable integer code, see `protomcp_protocol::error::ErrorKind::code`.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<&Error> for JsonRpcError {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code(),
            message: err.message.clone(),
            data: err.data.clone(),
        }
    }
}

impl From<Error> for JsonRpcError {
    fn from(err: Error) -> Self {
        (&err).into()
    }
}

/// A JSON-RPC notification: fire-and-forget, never answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Parameters, kept as a raw value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    /// Build a new notification envelope.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// Any of the three envelope kinds, as classified by [`Envelope::decode`].
#[derive(Debug, Clone)]
pub enum Envelope {
    /// A request awaiting a response.
    Request(Request),
    /// A response to a prior request.
    Response(Response),
    /// A fire-and-forget notification.
    Notification(Notification),
}

impl Envelope {
    /// Encode this envelope as a single JSON line (no trailing newline).
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let value = match self {
            Self::Request(r) => serde_json::to_vec(r),
            Self::Response(r) => serde_json::to_vec(r),
            Self::Notification(n) => serde_json::to_vec(n),
        };
        value.map_err(|e| Error::new(ErrorKind::ParseError, format!("encode failed: {e}")))
    }

    /// Decode and classify one envelope from raw bytes.
    ///
    /// Classification is by shape, not by a dedicated tag: the presence of
    /// `id` without `result`/`error` makes it a request; presence of `id`
    /// with `result` or `error` makes it a response; absence of `id` makes
    /// it a notification.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::new(ErrorKind::ParseError, format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Classify an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::new(ErrorKind::InvalidRequest, "envelope must be an object"))?;

        let has_id = obj.contains_key("id");
        let has_result_or_error = obj.contains_key("result") || obj.contains_key("error");

        if has_id && has_result_or_error {
            let response: Response = serde_json::from_value(value).map_err(|e| {
                Error::new(ErrorKind::InvalidRequest, format!("invalid response: {e}"))
            })?;
            return Ok(Self::Response(response));
        }
        if has_id {
            let request: Request = serde_json::from_value(value).map_err(|e| {
                Error::new(ErrorKind::InvalidRequest, format!("invalid request: {e}"))
            })?;
            if request.method.is_empty() {
                return Err(Error::new(ErrorKind::InvalidRequest, "empty method name"));
            }
            return Ok(Self::Request(request));
        }
        let notification: Notification = serde_json::from_value(value).map_err(|e| {
            Error::new(
                ErrorKind::InvalidRequest,
                format!("invalid notification: {e}"),
            )
        })?;
        Ok(Self::Notification(notification))
    }

    /// The envelope's method name, if it has one (requests/notifications).
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(r) => Some(&r.method),
            Self::Notification(n) => Some(&n.method),
            Self::Response(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_request() {
        let bytes = br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
        match Envelope::decode(bytes).unwrap() {
            Envelope::Request(r) => {
                assert_eq!(r.method, "ping");
                assert_eq!(r.id, RequestId::Number(1));
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn classifies_response_with_result() {
        let bytes = br#"{"jsonrpc":"2.0","id":"abc","result":{}}"#;
        match Envelope::decode(bytes).unwrap() {
            Envelope::Response(r) => {
                assert_eq!(r.id, ResponseId::of(RequestId::String("abc".into())));
                assert!(matches!(r.payload, ResponsePayload::Success { .. }));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn classifies_response_with_error_and_null_id() {
        let bytes = br#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"bad"}}"#;
        match Envelope::decode(bytes).unwrap() {
            Envelope::Response(r) => {
                assert!(r.id.is_null());
                assert!(matches!(r.payload, ResponsePayload::Error { .. }));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn classifies_notification() {
        let bytes = br#"{"jsonrpc":"2.0","method":"$/progress","params":{}}"#;
        match Envelope::decode(bytes).unwrap() {
            Envelope::Notification(n) => assert_eq!(n.method, "$/progress"),
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_method_on_request() {
        let bytes = br#"{"jsonrpc":"2.0","id":1,"method":""}"#;
        assert!(Envelope::decode(bytes).is_err());
    }

    #[test]
    fn round_trips_preserving_id_type() {
        let req = Request::new(RequestId::String("xyz".into()), "tools/list", None);
        let envelope = Envelope::Request(req);
        let encoded = envelope.encode().unwrap();
        match Envelope::decode(&encoded).unwrap() {
            Envelope::Request(r) => assert_eq!(r.id, RequestId::String("xyz".into())),
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn result_and_error_never_coexist_on_decode() {
        // If a peer sends both, untagged enum picks `Success` first;
        // the invariant we actually guarantee is we never emit both.
        let resp = Response::success(RequestId::Number(1), json!({"ok": true}));
        let encoded = serde_json::to_value(&resp).unwrap();
        assert!(encoded.get("result").is_some());
        assert!(encoded.get("error").is_none());
    }
}
