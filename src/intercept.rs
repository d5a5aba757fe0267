//! The interception layer.
//!
//! Sits at the front of a resource's before-mutation hook chains. On any
//! mutating call it builds a redacted diff, persists a pending approval
//! request, and fails the original mutation with a "pending approval"
//! message so the host never applies it.
//!
//! The replay guard comes first, before anything else: a call carrying the
//! replay marker is the replay engine applying an already-approved request
//! and must pass through untouched. Without this check every approval would
//! capture itself again, forever.

use crate::connector::Connector;
use crate::diff::DiffBuilder;
use crate::error::Result;
use crate::hooks::{HookOutcome, MutationContext, MutationHook};
use crate::identity::Identity;
use crate::record::FieldMap;
use crate::request::{ApprovalRequest, MutationKind, RequestId, RequestStore};
use crate::schema::{CheckContext, ResourceSchema};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Outcome of running one mutating call through the interceptor.
#[derive(Debug, Clone)]
pub enum Interception {
    /// A pending request was created; the original mutation must not run.
    Captured { request_id: RequestId },
    /// Not subject to review (replay, or the predicate opted out) —
    /// proceed as a normal mutation.
    Proceed,
}

/// Everything a [`ReviewPredicate`] may look at when deciding whether a
/// mutation needs review.
#[derive(Debug, Clone, Copy)]
pub struct MutationScope<'a> {
    pub resource_id: &'a str,
    pub kind: MutationKind,
    pub data: &'a FieldMap,
    pub actor: &'a Identity,
    pub extra: &'a FieldMap,
}

/// Pluggable opt-out: consulted before a request is created; returning
/// false lets the mutation proceed immediately.
#[async_trait]
pub trait ReviewPredicate: Send + Sync {
    async fn should_review(&self, scope: MutationScope<'_>) -> anyhow::Result<bool>;
}

/// The default predicate — every mutation is reviewed.
pub struct AlwaysReview;

#[async_trait]
impl ReviewPredicate for AlwaysReview {
    async fn should_review(&self, _scope: MutationScope<'_>) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Review nothing. For tests and staged rollouts.
pub struct NeverReview;

#[async_trait]
impl ReviewPredicate for NeverReview {
    async fn should_review(&self, _scope: MutationScope<'_>) -> anyhow::Result<bool> {
        Ok(false)
    }
}

/// The interception layer for one resource. Cheap to clone — all state is
/// shared behind `Arc`s.
#[derive(Clone)]
pub struct Interceptor {
    schema: Arc<ResourceSchema>,
    connector: Arc<dyn Connector>,
    store: Arc<RequestStore>,
    predicate: Arc<dyn ReviewPredicate>,
}

impl Interceptor {
    /// Create the interceptor, validating the schema up front. A resource
    /// without a primary key refuses to initialize here.
    pub fn new(
        schema: Arc<ResourceSchema>,
        connector: Arc<dyn Connector>,
        store: Arc<RequestStore>,
    ) -> Result<Self> {
        schema.validate()?;
        Ok(Self {
            schema,
            connector,
            store,
            predicate: Arc::new(AlwaysReview),
        })
    }

    pub fn with_predicate(mut self, predicate: Arc<dyn ReviewPredicate>) -> Self {
        self.predicate = predicate;
        self
    }

    /// Handle one mutating call.
    ///
    /// Any error — predicate failure, diff failure, store failure — makes
    /// the original mutation fail. A mutation the engine lost track of is
    /// worse than a refused one.
    pub async fn intercept(
        &self,
        ctx: &MutationContext,
        kind: MutationKind,
        data: &FieldMap,
    ) -> Result<Interception> {
        // Replay guard. Checked before everything else.
        if ctx.is_replay() {
            tracing::debug!(
                resource = %self.schema.resource_id,
                action = %kind,
                "replay call, bypassing capture"
            );
            return Ok(Interception::Proceed);
        }

        let scope = MutationScope {
            resource_id: &self.schema.resource_id,
            kind,
            data,
            actor: &ctx.actor,
            extra: &ctx.extra,
        };
        let review = self
            .predicate
            .should_review(scope)
            .await
            .context("should_review predicate failed")?;
        if !review {
            return Ok(Interception::Proceed);
        }

        let check_ctx = CheckContext {
            actor: ctx.actor.clone(),
            resource_id: self.schema.resource_id.clone(),
        };
        let built = DiffBuilder::new(&self.schema, self.connector.as_ref())
            .build(kind, data, &check_ctx)
            .await?;

        // The verbatim payload rides along for replay; the redacted diff is
        // what reviewers see.
        let mut extra = ctx.extra.clone();
        extra.insert(
            ApprovalRequest::PAYLOAD_KEY.to_string(),
            Value::Object(data.clone()),
        );

        let request = ApprovalRequest::pending(
            self.schema.resource_id.clone(),
            built.record_id,
            kind,
            built.diff,
            ctx.actor.id.clone(),
            extra,
        );
        let request_id = request.id.clone();
        self.store.create_pending(&request).await?;

        tracing::info!(
            request = %request_id,
            resource = %self.schema.resource_id,
            action = %kind,
            requester = %ctx.actor.username,
            "mutation captured for review"
        );
        Ok(Interception::Captured { request_id })
    }

    /// Wrap this interceptor as a hook for one mutation kind, to be pushed
    /// to the front of the host's before-chain.
    pub fn as_hook(&self, kind: MutationKind) -> Arc<dyn MutationHook> {
        Arc::new(InterceptHook {
            interceptor: self.clone(),
            kind,
        })
    }
}

/// Hook adapter: turns a capture into an aborting hook outcome carrying the
/// "pending approval" message.
struct InterceptHook {
    interceptor: Interceptor,
    kind: MutationKind,
}

#[async_trait]
impl MutationHook for InterceptHook {
    async fn run(&self, ctx: &MutationContext, record: &FieldMap) -> anyhow::Result<HookOutcome> {
        match self.interceptor.intercept(ctx, self.kind, record).await? {
            Interception::Captured { .. } => Ok(HookOutcome::abort(self.kind.pending_message())),
            Interception::Proceed => Ok(HookOutcome::ok()),
        }
    }
}
