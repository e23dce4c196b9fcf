//! Protocol version negotiation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, ErrorKind};

/// One of the two protocol versions this runtime speaks.
///
/// Field names and payload shapes that differ between versions (sampling
/// params/results, log-notification shape, tool result encoding) are
/// selected at the call site by matching on this value; see
/// `protomcp-registry`'s tool-result conversion for the canonical example.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// `2024-11-05` — legacy `content[]` + `isError` tool results.
    #[serde(rename = "2024-11-05")]
    V2024_11_05,
    /// `2025-03-26` — structured `output`/`error` tool results.
    #[serde(rename = "2025-03-26")]
    V2025_03_26,
}

impl ProtocolVersion {
    /// The version a freshly constructed client offers during handshake.
    pub const PREFERRED: Self = Self::V2025_03_26;

    /// All versions this runtime will accept from a peer.
    pub const SUPPORTED: [Self; 2] = [Self::V2024_11_05, Self::V2025_03_26];

    /// Parse a wire version string, rejecting anything not in
    /// [`Self::SUPPORTED`].
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "2024-11-05" => Ok(Self::V2024_11_05),
            "2025-03-26" => Ok(Self::V2025_03_26),
            other => Err(Error::new(
                ErrorKind::UnsupportedProtocolVersion,
                format!("unsupported protocol version '{other}'"),
            )),
        }
    }

    /// The canonical wire string for this version.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V2024_11_05 => "2024-11-05",
            Self::V2025_03_26 => "2025-03-26",
        }
    }

    /// Whether this version uses the legacy `content[]` + `isError` tool
    /// result shape instead of structured `output`/`error`.
    pub fn uses_legacy_tool_result(self) -> bool {
        matches!(self, Self::V2024_11_05)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
