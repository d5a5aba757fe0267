//! Error taxonomy for the approval engine.
//!
//! Four families, handled differently:
//! - configuration errors are fatal at setup — a resource refuses to
//!   initialize rather than run half-configured
//! - precondition errors (not found, not pending, unauthorized) are reported
//!   with a specific status and leave no state behind; fully retryable
//! - downstream failures (hook abort, connector error) surface the
//!   triggering message to the caller
//! - interception failures make the original mutation fail — losing track
//!   of a mutation must never happen

use crate::hooks::HookStage;
use crate::request::{ApprovalStatus, RequestId};
use thiserror::Error;

/// All errors the approval engine can produce.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// Fatal setup error — missing primary key column, misconfigured
    /// request table, second factor required without a verifier, etc.
    #[error("configuration error: {0}")]
    Config(String),

    /// No approval request with this id exists.
    #[error("approval request {0} not found")]
    NotFound(RequestId),

    /// The request was already resolved — resolutions are one-shot.
    #[error("approval request {id} is not pending (status: {status})")]
    NotPending { id: RequestId, status: ApprovalStatus },

    /// The actor is not on the reviewer allow-lists.
    #[error("not authorized: {0}")]
    Forbidden(String),

    /// Second-factor verification failed or was not provided.
    /// The request stays pending — the transition can be retried.
    #[error("second factor check failed: {0}")]
    SecondFactor(String),

    /// A backend-only column predicate failed during diff capture.
    /// Aborts the whole interception.
    #[error("backend-only check failed for column '{column}': {message}")]
    Predicate { column: String, message: String },

    /// A replayed hook reported an abort.
    #[error("{stage} hook aborted: {message}")]
    HookAborted { stage: HookStage, message: String },

    /// The underlying data store reported an error.
    #[error("connector error: {0}")]
    Connector(String),

    /// The caller's identity could not be resolved from its token.
    #[error("identity could not be resolved")]
    Unauthenticated,

    /// Anything else — malformed stored rows, predicate plumbing failures.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApprovalError {
    /// HTTP-style status code for the resolution endpoint.
    pub fn status(&self) -> u16 {
        match self {
            ApprovalError::NotFound(_) => 404,
            ApprovalError::NotPending { .. } => 400,
            ApprovalError::Forbidden(_) | ApprovalError::SecondFactor(_) => 403,
            ApprovalError::Unauthenticated => 401,
            ApprovalError::Config(_)
            | ApprovalError::Predicate { .. }
            | ApprovalError::HookAborted { .. }
            | ApprovalError::Connector(_)
            | ApprovalError::Internal(_) => 500,
        }
    }

    /// Whether the caller may retry the same call after fixing the cause.
    /// Precondition and downstream failures leave the request pending.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ApprovalError::NotFound(_) | ApprovalError::NotPending { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ApprovalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let id = RequestId::new();
        assert_eq!(ApprovalError::NotFound(id.clone()).status(), 404);
        assert_eq!(
            ApprovalError::NotPending {
                id,
                status: ApprovalStatus::Approved,
            }
            .status(),
            400
        );
        assert_eq!(ApprovalError::Forbidden("nope".into()).status(), 403);
        assert_eq!(ApprovalError::Unauthenticated.status(), 401);
        assert_eq!(ApprovalError::Connector("down".into()).status(), 500);
    }

    #[test]
    fn test_resolved_requests_are_not_retryable() {
        let err = ApprovalError::NotPending {
            id: RequestId::new(),
            status: ApprovalStatus::Rejected,
        };
        assert!(!err.is_retryable());
        assert!(ApprovalError::SecondFactor("bad code".into()).is_retryable());
    }
}
