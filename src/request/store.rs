//! Persistence of approval requests.
//!
//! The store maps [`ApprovalRequest`]s onto plain records in the configured
//! request resource and delegates actual storage to the connector. It also
//! owns the one piece of synchronization in the engine: the conditional
//! status transition. The connector contract has no compare-and-set, so the
//! transition re-reads status inside an in-process critical section — two
//! racing resolutions of the same request can't both pass the pending check.

use crate::config::{RequestFields, ReviewConfig};
use crate::connector::Connector;
use crate::diff::Diff;
use crate::error::{ApprovalError, Result};
use crate::identity::Identity;
use crate::record::FieldMap;
use crate::request::{ApprovalRequest, ApprovalStatus, MutationKind, RequestId};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Creates, reads, and transitions persisted approval requests.
pub struct RequestStore {
    connector: Arc<dyn Connector>,
    resource: String,
    fields: RequestFields,
    transition_lock: Mutex<()>,
}

impl RequestStore {
    pub fn new(connector: Arc<dyn Connector>, config: &ReviewConfig) -> Self {
        Self {
            connector,
            resource: config.request_resource.clone(),
            fields: config.fields.clone(),
            transition_lock: Mutex::new(()),
        }
    }

    /// The resource approval requests are persisted in.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Persist a new pending request. A failure here propagates — the
    /// intercepted mutation must fail rather than slip through untracked.
    pub async fn create_pending(&self, request: &ApprovalRequest) -> Result<()> {
        debug_assert!(request.status.is_pending());
        let record = self.to_record(request)?;
        self.connector
            .create(&self.resource, record)
            .await
            .map_err(|e| ApprovalError::Connector(e.to_string()))?;
        Ok(())
    }

    /// Load a request by id.
    pub async fn get(&self, id: &RequestId) -> Result<ApprovalRequest> {
        let record = self
            .connector
            .get_by_key(&self.resource, &id.to_string())
            .await
            .map_err(|e| ApprovalError::Connector(e.to_string()))?
            .ok_or_else(|| ApprovalError::NotFound(id.clone()))?;
        self.from_record(record)
    }

    /// Atomic conditional transition: pending → `to`, stamping the reviewer.
    /// Fails with NotPending when the request was already resolved — the
    /// loser of a race gets that error instead of a second application.
    pub async fn transition(
        &self,
        id: &RequestId,
        to: ApprovalStatus,
        reviewer: &Identity,
    ) -> Result<ApprovalRequest> {
        debug_assert!(to.is_terminal());
        let _guard = self.transition_lock.lock().await;

        let mut request = self.get(id).await?;
        if !request.status.is_pending() {
            return Err(ApprovalError::NotPending {
                id: id.clone(),
                status: request.status,
            });
        }

        let mut fields = FieldMap::new();
        fields.insert(self.fields.status.clone(), Value::String(to.to_string()));
        fields.insert(
            self.fields.reviewer_id.clone(),
            Value::String(reviewer.id.clone()),
        );
        self.connector
            .update(&self.resource, &id.to_string(), fields)
            .await
            .map_err(|e| ApprovalError::Connector(e.to_string()))?;

        request.status = to;
        request.reviewer_id = Some(reviewer.id.clone());
        Ok(request)
    }

    fn to_record(&self, request: &ApprovalRequest) -> Result<FieldMap> {
        let f = &self.fields;
        let mut record = FieldMap::new();
        record.insert(f.id.clone(), Value::String(request.id.to_string()));
        record.insert(
            f.resource_id.clone(),
            Value::String(request.resource_id.clone()),
        );
        record.insert(
            f.record_id.clone(),
            request
                .record_id
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        record.insert(f.action.clone(), Value::String(request.action.to_string()));
        record.insert(f.status.clone(), Value::String(request.status.to_string()));
        record.insert(
            f.data.clone(),
            serde_json::to_value(&request.diff)
                .map_err(|e| ApprovalError::Internal(anyhow!("diff not serializable: {e}")))?,
        );
        record.insert(
            f.requester_id.clone(),
            Value::String(request.requester_id.clone()),
        );
        record.insert(
            f.reviewer_id.clone(),
            request
                .reviewer_id
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        record.insert(
            f.created_at.clone(),
            Value::String(request.created_at.to_rfc3339()),
        );
        record.insert(f.extra.clone(), Value::Object(request.extra.clone()));
        Ok(record)
    }

    fn from_record(&self, record: FieldMap) -> Result<ApprovalRequest> {
        let f = &self.fields;
        let str_field = |name: &str| -> Result<String> {
            record
                .get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| malformed(name))
        };

        let id: RequestId = str_field(&f.id)?
            .parse()
            .map_err(|_| malformed(&f.id))?;
        let action = MutationKind::from_str_loose(&str_field(&f.action)?)
            .ok_or_else(|| malformed(&f.action))?;
        let status: ApprovalStatus = str_field(&f.status)?
            .parse()
            .map_err(|_| malformed(&f.status))?;
        let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&str_field(&f.created_at)?)
            .map_err(|_| malformed(&f.created_at))?
            .with_timezone(&Utc);
        let diff: Diff = record
            .get(&f.data)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or_else(|| malformed(&f.data))?;

        let opt_str = |name: &str| -> Option<String> {
            record
                .get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        Ok(ApprovalRequest {
            id,
            resource_id: str_field(&f.resource_id)?,
            record_id: opt_str(&f.record_id),
            action,
            status,
            diff,
            requester_id: str_field(&f.requester_id)?,
            reviewer_id: opt_str(&f.reviewer_id),
            created_at,
            extra: record
                .get(&f.extra)
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_default(),
        })
    }
}

fn malformed(field: &str) -> ApprovalError {
    ApprovalError::Internal(anyhow!(
        "stored approval request is malformed: bad or missing field '{field}'"
    ))
}
