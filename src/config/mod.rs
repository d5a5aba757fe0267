//! Per-resource review configuration.
//!
//! Everything that governs one resource's approval flow lives in an explicit
//! [`ReviewConfig`] injected at initialization — which table holds the
//! requests, who may resolve them, whether a second factor is required, and
//! the column names the request record is persisted under. No global mutable
//! state.

pub mod parser;

pub use parser::{parse_config_file, parse_config_str};

use crate::error::{ApprovalError, Result};
use serde::{Deserialize, Serialize};

/// Column names under which an [`crate::request::ApprovalRequest`] is
/// persisted. Names are configurable per deployment; semantics are fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestFields {
    pub id: String,
    pub resource_id: String,
    pub record_id: String,
    pub action: String,
    pub status: String,
    pub data: String,
    pub requester_id: String,
    pub reviewer_id: String,
    pub created_at: String,
    pub extra: String,
}

impl Default for RequestFields {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            resource_id: "resource_id".to_string(),
            record_id: "record_id".to_string(),
            action: "action".to_string(),
            status: "status".to_string(),
            data: "data".to_string(),
            requester_id: "requester_id".to_string(),
            reviewer_id: "reviewer_id".to_string(),
            created_at: "created_at".to_string(),
            extra: "extra".to_string(),
        }
    }
}

impl RequestFields {
    /// All configured names, for duplicate detection.
    fn all(&self) -> [&str; 10] {
        [
            &self.id,
            &self.resource_id,
            &self.record_id,
            &self.action,
            &self.status,
            &self.data,
            &self.requester_id,
            &self.reviewer_id,
            &self.created_at,
            &self.extra,
        ]
    }
}

/// Review configuration for one managed resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Resource (table) where approval requests are persisted.
    pub request_resource: String,

    /// Usernames allowed to approve/reject. Empty plus empty roles means
    /// nobody is authorized — fail closed.
    #[serde(default)]
    pub allowed_users: Vec<String>,

    /// Roles allowed to approve/reject.
    #[serde(default)]
    pub allowed_roles: Vec<String>,

    /// When set, a verification code must pass the configured verifier
    /// before any resolution is accepted.
    #[serde(default)]
    pub require_second_factor: bool,

    /// Column names for the persisted request record.
    #[serde(default)]
    pub fields: RequestFields,
}

impl ReviewConfig {
    pub fn new(request_resource: impl Into<String>) -> Self {
        Self {
            request_resource: request_resource.into(),
            allowed_users: Vec::new(),
            allowed_roles: Vec::new(),
            require_second_factor: false,
            fields: RequestFields::default(),
        }
    }

    pub fn allow_user(mut self, username: impl Into<String>) -> Self {
        self.allowed_users.push(username.into());
        self
    }

    pub fn allow_role(mut self, role: impl Into<String>) -> Self {
        self.allowed_roles.push(role.into());
        self
    }

    pub fn require_second_factor(mut self) -> Self {
        self.require_second_factor = true;
        self
    }

    pub fn with_fields(mut self, fields: RequestFields) -> Self {
        self.fields = fields;
        self
    }

    /// Setup-time validation, fatal on failure.
    pub fn validate(&self) -> Result<()> {
        if self.request_resource.trim().is_empty() {
            return Err(ApprovalError::Config(
                "request_resource must be non-empty".to_string(),
            ));
        }
        let names = self.fields.all();
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ApprovalError::Config(
                    "request field names must be non-empty".to_string(),
                ));
            }
            if names[..i].contains(name) {
                return Err(ApprovalError::Config(format!(
                    "request field name '{name}' is used twice"
                )));
            }
        }
        if self.allowed_users.is_empty() && self.allowed_roles.is_empty() {
            // Legal, but nobody will ever be able to resolve a request.
            tracing::warn!(
                request_resource = %self.request_resource,
                "both reviewer allow-lists are empty; all resolutions will be denied"
            );
        }
        Ok(())
    }
}
