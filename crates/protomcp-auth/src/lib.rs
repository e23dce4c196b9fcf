//! Auth hook interface.
//!
//! A pluggable "before handle" interceptor runs exactly once per inbound
//! request (never for notifications) and either attaches a [`Principal`]
//! to the request context or fails the request with
//! `AuthenticationFailed`. JWT/JWKS validation algorithms are an external
//! collaborator, out of scope for this crate; it defines only the
//! interface a concrete validator plugs into.

use std::collections::HashMap;

use async_trait::async_trait;
use protomcp_protocol::error::{Error, ErrorKind};

/// An authenticated identity attached to a request after the auth hook
/// runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// The authenticated subject, e.g. a user or service account id.
    pub subject: String,
    /// Arbitrary claims carried alongside the subject.
    pub claims: HashMap<String, serde_json::Value>,
}

impl Principal {
    /// Build a principal with no extra claims.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            claims: HashMap::new(),
        }
    }
}

/// Per-session metadata available to the auth hook: arbitrary key/value
/// pairs (e.g. an HTTP header map for HTTP-framed transports; empty for
/// transports with no ambient metadata, like stdio).
pub type SessionMetadata = HashMap<String, String>;

/// The "before handle" interceptor. Invoked exactly once per
/// inbound request, never for notifications.
#[async_trait]
pub trait AuthHook: Send + Sync {
    /// Authenticate an inbound request, given its method/params and the
    /// session's ambient metadata. Returns the attached principal, or an
    /// `AuthenticationFailed` error to reject the request.
    async fn authenticate(
        &self,
        method: &str,
        params: Option<&serde_json::Value>,
        metadata: &SessionMetadata,
    ) -> Result<Principal, Error>;
}

/// The optional second hook: a post-authentication permission check.
#[async_trait]
pub trait PermissionHook: Send + Sync {
    /// Check whether `principal` may invoke `method` with `params`.
    /// Returns `Ok(())` to allow, or an `AccessDenied` error to reject.
    async fn check(
        &self,
        principal: &Principal,
        method: &str,
        params: Option<&serde_json::Value>,
    ) -> Result<(), Error>;
}

/// A permission hook that allows everything; the default when no
/// `PermissionHook` is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl PermissionHook for AllowAll {
    async fn check(
        &self,
        _principal: &Principal,
        _method: &str,
        _params: Option<&serde_json::Value>,
    ) -> Result<(), Error> {
        Ok(())
    }
}

/// Build the `AccessDenied` error a [`PermissionHook`] returns on rejection.
pub fn access_denied(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::AccessDenied, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allow_all_never_rejects() {
        let principal = Principal::new("alice");
        let result = AllowAll.check(&principal, "tools/call", None).await;
        assert!(result.is_ok());
    }
}
