//! Types for the resolution audit log.
//!
//! Every resolution attempt gets logged — approved, rejected, or denied.
//! The requests themselves live in the data store; this log answers "who
//! tried to resolve what, and what happened".

use crate::replay::ResolutionDecision;
use crate::request::MutationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single entry in the resolution log.
/// One entry per resolution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionLogEntry {
    /// When the resolution was attempted
    pub timestamp: DateTime<Utc>,

    /// The approval request being resolved (as submitted by the caller)
    pub request_id: String,

    /// The resource the request targets. None when the request was unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// The captured mutation kind. None when the request was unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<MutationKind>,

    /// What the reviewer asked for
    pub decision: ResolutionDecision,

    /// Who attempted the resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,

    /// Who originally requested the mutation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,

    /// Whether the resolution was accepted and carried out
    pub ok: bool,

    /// If not ok: the error that stopped it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// How long the resolution took (microseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_us: Option<u64>,
}
