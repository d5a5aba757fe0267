//! The approval-request data model.
//!
//! One [`ApprovalRequest`] exists per intercepted mutation attempt. It is
//! created pending, transitions exactly once to approved or rejected, and is
//! never deleted by the engine (retention is the host's concern).

use crate::diff::Diff;
use crate::record::FieldMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Create a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The kind of mutation being held for review.
/// Every intercepted call maps to one of these variants; hook chains and
/// replay dispatch by pattern match, never by string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Edit,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Create => write!(f, "create"),
            MutationKind::Edit => write!(f, "edit"),
            MutationKind::Delete => write!(f, "delete"),
        }
    }
}

impl MutationKind {
    /// Parse a kind from a string. Accepts the aliases hosts commonly use.
    pub fn from_str_loose(s: &str) -> Option<MutationKind> {
        match s.to_lowercase().trim() {
            "create" | "insert" | "add" => Some(MutationKind::Create),
            "edit" | "update" | "save" => Some(MutationKind::Edit),
            "delete" | "remove" | "destroy" => Some(MutationKind::Delete),
            _ => None,
        }
    }

    /// The blocked-mutation message shown to the original caller.
    pub fn pending_message(&self) -> &'static str {
        match self {
            MutationKind::Create => "Creation pending approval",
            MutationKind::Edit => "Update pending approval",
            MutationKind::Delete => "Deletion pending approval",
        }
    }
}

/// Lifecycle state of an approval request.
/// Monotonic: pending → approved or rejected, then terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, ApprovalStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "pending"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(format!("unknown approval status '{other}'")),
        }
    }
}

/// One intercepted mutation, held for review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Generated at creation, immutable.
    pub id: RequestId,

    /// The resource type being mutated.
    pub resource_id: String,

    /// Primary key of the affected record. None for not-yet-created records
    /// whose key is assigned at apply time.
    pub record_id: Option<String>,

    /// What the original caller attempted.
    pub action: MutationKind,

    /// Pending until resolved; transitions exactly once.
    pub status: ApprovalStatus,

    /// Changed fields only, backend-only values already redacted.
    pub diff: Diff,

    /// The user who triggered the mutation.
    pub requester_id: String,

    /// The user who resolved the request. None until resolved.
    pub reviewer_id: Option<String>,

    /// UTC creation time, immutable.
    pub created_at: DateTime<Utc>,

    /// Opaque context forwarded from the original call — request metadata
    /// plus the verbatim submitted payload under [`ApprovalRequest::PAYLOAD_KEY`],
    /// needed to faithfully replay the mutation and its hooks.
    pub extra: FieldMap,
}

impl ApprovalRequest {
    /// Key under which the interceptor stashes the submitted payload
    /// inside `extra`. Never part of the reviewer-facing diff.
    pub const PAYLOAD_KEY: &'static str = "payload";

    /// Create a new pending request.
    pub fn pending(
        resource_id: impl Into<String>,
        record_id: Option<String>,
        action: MutationKind,
        diff: Diff,
        requester_id: impl Into<String>,
        extra: FieldMap,
    ) -> Self {
        Self {
            id: RequestId::new(),
            resource_id: resource_id.into(),
            record_id,
            action,
            status: ApprovalStatus::Pending,
            diff,
            requester_id: requester_id.into(),
            reviewer_id: None,
            created_at: Utc::now(),
            extra,
        }
    }

    /// The verbatim submitted payload stored for replay, if present.
    pub fn replay_payload(&self) -> Option<&FieldMap> {
        self.extra.get(Self::PAYLOAD_KEY).and_then(|v| v.as_object())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_roundtrip() {
        let id = RequestId::new();
        let parsed: RequestId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!(MutationKind::from_str_loose("update"), Some(MutationKind::Edit));
        assert_eq!(MutationKind::from_str_loose("REMOVE"), Some(MutationKind::Delete));
        assert_eq!(MutationKind::from_str_loose("upsert"), None);
    }

    #[test]
    fn test_status_is_monotonic_flags() {
        assert!(ApprovalStatus::Pending.is_pending());
        assert!(ApprovalStatus::Approved.is_terminal());
        assert!(ApprovalStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_new_request_is_pending_with_no_reviewer() {
        let request = ApprovalRequest::pending(
            "people",
            Some("p1".to_string()),
            MutationKind::Edit,
            Diff::default(),
            "u1",
            FieldMap::new(),
        );
        assert!(request.status.is_pending());
        assert!(request.reviewer_id.is_none());
        assert!(request.replay_payload().is_none());
    }
}
