//! Changegate — approval gate for record mutations.
//!
//! Intercepts create/edit/delete operations on managed records and holds
//! them for human review instead of applying them. Interception captures a
//! redacted field-level diff and persists a pending approval request; an
//! authorized reviewer later approves (replaying the mutation through the
//! real hook chain and data store) or rejects it.
//!
//! The data store, the host's authentication, and any review UI stay
//! outside: they plug in through the [`connector::Connector`],
//! [`identity::IdentityResolver`], and gateway protocol boundaries.

pub mod audit;
pub mod config;
pub mod connector;
pub mod diff;
pub mod error;
pub mod gateway;
pub mod hooks;
pub mod identity;
pub mod intercept;
pub mod record;
pub mod replay;
pub mod request;
pub mod review;
pub mod schema;

pub use config::{ReviewConfig, RequestFields};
pub use connector::Connector;
pub use diff::{Diff, DiffBuilder};
pub use error::{ApprovalError, Result};
pub use hooks::{HookOutcome, HookStage, MutationContext, MutationHook, ResourceHooks};
pub use identity::{Identity, IdentityResolver};
pub use intercept::{AlwaysReview, Interception, Interceptor, NeverReview, ReviewPredicate};
pub use replay::{ReplayEngine, Resolution, ResolutionDecision};
pub use request::{ApprovalRequest, ApprovalStatus, MutationKind, RequestId, RequestStore};
pub use review::{ReviewGate, SecondFactorVerifier};
pub use schema::{BackendOnly, BackendOnlyCheck, ColumnSchema, ResourceSchema};
