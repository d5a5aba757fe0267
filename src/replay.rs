//! The replay engine — resolving pending requests.
//!
//! Rejection is a pure state transition. Approval replays the captured
//! mutation down the same path the host uses for ordinary writes: the
//! before-hook chain runs first (with the replay marker set so interception
//! stands aside), then the status is committed, then the connector applies
//! the change, then the after-hook chain runs.
//!
//! The pending→approved transition is committed after the before-hooks
//! validate but before the mutation is applied. A crash mid-apply leaves a
//! detectable approved-but-not-applied state instead of letting a second
//! resolver apply the mutation again.

use crate::connector::Connector;
use crate::error::{ApprovalError, Result};
use crate::hooks::{HookStage, MutationContext, ResourceHooks};
use crate::identity::Identity;
use crate::record::{key_string, overlay, values_equal, FieldMap};
use crate::request::{ApprovalRequest, ApprovalStatus, MutationKind, RequestId, RequestStore};
use crate::review::ReviewGate;
use crate::schema::ResourceSchema;
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// What the reviewer asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionDecision {
    Approve,
    Reject,
}

impl fmt::Display for ResolutionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionDecision::Approve => write!(f, "approve"),
            ResolutionDecision::Reject => write!(f, "reject"),
        }
    }
}

/// A completed resolution: the request in its terminal state.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub request: ApprovalRequest,
    pub decision: ResolutionDecision,
}

/// Resolves approval requests for one resource.
pub struct ReplayEngine {
    schema: Arc<ResourceSchema>,
    connector: Arc<dyn Connector>,
    store: Arc<RequestStore>,
    hooks: Arc<ResourceHooks>,
    gate: ReviewGate,
}

impl ReplayEngine {
    /// Create the engine. Schema and gate configuration are validated here,
    /// at setup, not on the first resolution.
    pub fn new(
        schema: Arc<ResourceSchema>,
        connector: Arc<dyn Connector>,
        store: Arc<RequestStore>,
        hooks: Arc<ResourceHooks>,
        gate: ReviewGate,
    ) -> Result<Self> {
        schema.validate()?;
        gate.validate()?;
        Ok(Self {
            schema,
            connector,
            store,
            hooks,
            gate,
        })
    }

    /// Resolve one pending request.
    ///
    /// Precondition failures (unknown request, already resolved, actor not
    /// authorized, bad verification code) leave everything untouched.
    pub async fn resolve(
        &self,
        id: &RequestId,
        decision: ResolutionDecision,
        actor: &Identity,
        verification_code: Option<&str>,
    ) -> Result<Resolution> {
        let request = self.store.get(id).await?;
        if !request.status.is_pending() {
            return Err(ApprovalError::NotPending {
                id: id.clone(),
                status: request.status,
            });
        }
        self.gate.check(actor, verification_code).await?;

        match decision {
            ResolutionDecision::Reject => {
                let request = self
                    .store
                    .transition(id, ApprovalStatus::Rejected, actor)
                    .await?;
                tracing::info!(request = %id, reviewer = %actor.username, "request rejected");
                Ok(Resolution {
                    request,
                    decision,
                })
            }
            ResolutionDecision::Approve => self.approve(request, actor).await,
        }
    }

    async fn approve(&self, request: ApprovalRequest, actor: &Identity) -> Result<Resolution> {
        let payload = request
            .replay_payload()
            .cloned()
            .ok_or_else(|| {
                ApprovalError::Internal(anyhow!(
                    "request {} has no replay payload",
                    request.id
                ))
            })?;

        let ctx = MutationContext::replaying(actor.clone(), request.id.clone())
            .with_extra(request.extra.clone());

        // 1. Before-hooks, with the replay marker set. An abort leaves the
        // request pending so the approval can be retried once the cause is
        // fixed.
        let pre = self
            .hooks
            .chain(request.action, HookStage::Before)
            .run_all(&ctx, &payload)
            .await?;
        if !pre.ok {
            return Err(ApprovalError::HookAborted {
                stage: HookStage::Before,
                message: pre.error.unwrap_or_else(|| "hook aborted".to_string()),
            });
        }

        // 2. Commit pending→approved. After this point a concurrent resolver
        // fails with NotPending; a failure below leaves an approved-but-not-
        // applied request, which is detectable, instead of a double apply.
        let approved = self
            .store
            .transition(&request.id, ApprovalStatus::Approved, actor)
            .await?;

        // 3–4. Apply the mutation and run the after-hooks.
        match self.apply(&approved, payload, pre.new_record_id, &ctx).await {
            Ok(()) => {
                tracing::info!(
                    request = %approved.id,
                    resource = %approved.resource_id,
                    action = %approved.action,
                    reviewer = %actor.username,
                    "request approved and applied"
                );
                Ok(Resolution {
                    request: approved,
                    decision: ResolutionDecision::Approve,
                })
            }
            Err(e) => {
                tracing::error!(
                    request = %approved.id,
                    resource = %approved.resource_id,
                    error = %e,
                    "request approved but not fully applied"
                );
                Err(e)
            }
        }
    }

    /// Apply the approved mutation via the connector, then run after-hooks.
    async fn apply(
        &self,
        request: &ApprovalRequest,
        mut payload: FieldMap,
        new_record_id: Option<String>,
        ctx: &MutationContext,
    ) -> Result<()> {
        let resource = &request.resource_id;
        let pk = self.schema.primary_key_column()?;

        let applied = match request.action {
            MutationKind::Create => {
                if let Some(id) = new_record_id {
                    // A before-hook assigned the key.
                    payload.insert(pk.name.clone(), Value::String(id));
                }
                self.connector
                    .create(resource, payload)
                    .await
                    .map_err(|e| ApprovalError::Connector(e.to_string()))?
            }
            MutationKind::Edit => {
                let id = self.record_key(request, &payload, &pk.name)?;
                let current = self
                    .connector
                    .get_by_key(resource, &id)
                    .await
                    .map_err(|e| ApprovalError::Connector(e.to_string()))?
                    .ok_or_else(|| {
                        ApprovalError::Connector(format!(
                            "record '{id}' no longer exists in '{resource}'"
                        ))
                    })?;

                // Write only what actually differs from the persisted state.
                let changed: FieldMap = payload
                    .iter()
                    .filter(|(name, value)| !values_equal(current.get(name.as_str()), Some(*value)))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                if !changed.is_empty() {
                    self.connector
                        .update(resource, &id, changed)
                        .await
                        .map_err(|e| ApprovalError::Connector(e.to_string()))?;
                }
                overlay(&current, &payload)
            }
            MutationKind::Delete => {
                let id = self.record_key(request, &payload, &pk.name)?;
                // After-delete hooks get the pre-deletion snapshot.
                let snapshot = self
                    .connector
                    .get_by_key(resource, &id)
                    .await
                    .map_err(|e| ApprovalError::Connector(e.to_string()))?
                    .unwrap_or_else(|| payload.clone());
                self.connector
                    .delete(resource, &id)
                    .await
                    .map_err(|e| ApprovalError::Connector(e.to_string()))?;
                snapshot
            }
        };

        let post = self
            .hooks
            .chain(request.action, HookStage::After)
            .run_all(ctx, &applied)
            .await?;
        if !post.ok {
            return Err(ApprovalError::HookAborted {
                stage: HookStage::After,
                message: post.error.unwrap_or_else(|| "hook aborted".to_string()),
            });
        }
        Ok(())
    }

    fn record_key(
        &self,
        request: &ApprovalRequest,
        payload: &FieldMap,
        pk_name: &str,
    ) -> Result<String> {
        request
            .record_id
            .clone()
            .or_else(|| payload.get(pk_name).and_then(key_string))
            .ok_or_else(|| {
                ApprovalError::Internal(anyhow!(
                    "request {} has no record key to apply",
                    request.id
                ))
            })
    }
}
