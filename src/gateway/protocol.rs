//! Resolution endpoint protocol types.
//!
//! Defines the JSON messages exchanged between a reviewer frontend and the
//! changegate resolution endpoint over a Unix domain socket, one JSON object
//! per line. Responses carry an HTTP-style status code so HTTP frontends can
//! relay them directly.

use crate::error::ApprovalError;
use serde::{Deserialize, Serialize};

/// A reviewer's decision on a pending request.
/// Sent over the socket as a JSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionRequest {
    /// Session token; resolved to an identity by the configured resolver.
    pub token: String,

    /// The approval request being resolved.
    pub request_id: String,

    /// true = approve (replay the mutation), false = reject (discard it).
    pub approved: bool,

    /// Second-factor code, when the gate requires one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
}

/// The endpoint's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionResponse {
    /// Whether the resolution was accepted and fully carried out.
    pub ok: bool,

    /// HTTP-style status: 200, or 400/401/403/404/500 on failure.
    pub status: u16,

    /// If not ok: what went wrong.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolutionResponse {
    /// Successful resolution.
    pub fn success() -> Self {
        Self {
            ok: true,
            status: 200,
            error: None,
        }
    }

    /// Failure derived from an engine error.
    pub fn from_error(err: &ApprovalError) -> Self {
        Self {
            ok: false,
            status: err.status(),
            error: Some(err.to_string()),
        }
    }

    /// Failure with an explicit status (for protocol-level problems).
    pub fn failure(status: u16, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            status,
            error: Some(error.into()),
        }
    }
}
