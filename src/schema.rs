//! Resource schemas — the per-resource column model the engine works from.
//!
//! A schema names the columns of a managed resource, designates the primary
//! key, and annotates columns that are backend-only: their values must never
//! reach a reviewer in full. Backend-only can be declared statically or via
//! an async per-column predicate evaluated with the capture context.
//!
//! Schemas are validated once, at setup. A resource without a usable primary
//! key refuses to initialize — that is a configuration error, never a
//! request-time surprise.

use crate::error::{ApprovalError, Result};
use crate::identity::Identity;
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Context handed to backend-only predicates: who triggered the capture and
/// which resource it is for.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub actor: Identity,
    pub resource_id: String,
}

/// Async per-column visibility predicate.
#[async_trait]
pub trait BackendOnlyCheck: Send + Sync {
    async fn check(&self, ctx: &CheckContext) -> AnyResult<bool>;
}

/// Whether a column is hidden from reviewers.
#[derive(Clone, Default)]
pub enum BackendOnly {
    /// Visible to reviewers.
    #[default]
    Never,
    /// Always hidden.
    Always,
    /// Decided per capture by an async predicate.
    When(Arc<dyn BackendOnlyCheck>),
}

impl BackendOnly {
    /// Evaluate the annotation for one capture.
    pub async fn evaluate(&self, ctx: &CheckContext) -> AnyResult<bool> {
        match self {
            BackendOnly::Never => Ok(false),
            BackendOnly::Always => Ok(true),
            BackendOnly::When(check) => check.check(ctx).await,
        }
    }

    /// True when evaluation may involve a predicate call.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, BackendOnly::When(_))
    }
}

impl fmt::Debug for BackendOnly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendOnly::Never => write!(f, "Never"),
            BackendOnly::Always => write!(f, "Always"),
            BackendOnly::When(_) => write!(f, "When(<predicate>)"),
        }
    }
}

/// One column of a managed resource.
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub name: String,
    pub primary_key: bool,
    pub backend_only: BackendOnly,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: false,
            backend_only: BackendOnly::Never,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn backend_only(mut self) -> Self {
        self.backend_only = BackendOnly::Always;
        self
    }

    pub fn backend_only_when(mut self, check: Arc<dyn BackendOnlyCheck>) -> Self {
        self.backend_only = BackendOnly::When(check);
        self
    }
}

/// The column model for one managed resource.
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_id: String,
    pub columns: Vec<ColumnSchema>,
}

impl ResourceSchema {
    pub fn new(resource_id: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            resource_id: resource_id.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The designated primary-key column. Missing one is a setup error.
    pub fn primary_key_column(&self) -> Result<&ColumnSchema> {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .ok_or_else(|| {
                ApprovalError::Config(format!(
                    "resource '{}' has no primary key column",
                    self.resource_id
                ))
            })
    }

    /// Setup-time validation. Refuses duplicate column names, an empty
    /// resource id, and a missing primary key.
    pub fn validate(&self) -> Result<()> {
        if self.resource_id.trim().is_empty() {
            return Err(ApprovalError::Config(
                "resource id must be non-empty".to_string(),
            ));
        }
        if self.columns.is_empty() {
            return Err(ApprovalError::Config(format!(
                "resource '{}' declares no columns",
                self.resource_id
            )));
        }
        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(ApprovalError::Config(format!(
                    "resource '{}' declares column '{}' twice",
                    self.resource_id, col.name
                )));
            }
        }
        self.primary_key_column()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people_schema() -> ResourceSchema {
        ResourceSchema::new(
            "people",
            vec![
                ColumnSchema::new("id").primary_key(),
                ColumnSchema::new("name"),
                ColumnSchema::new("salary").backend_only(),
            ],
        )
    }

    #[test]
    fn test_validate_ok() {
        assert!(people_schema().validate().is_ok());
        assert_eq!(
            people_schema().primary_key_column().unwrap().name,
            "id"
        );
    }

    #[test]
    fn test_missing_primary_key_is_config_error() {
        let schema = ResourceSchema::new("people", vec![ColumnSchema::new("name")]);
        let err = schema.validate().unwrap_err();
        assert!(matches!(err, ApprovalError::Config(_)));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let schema = ResourceSchema::new(
            "people",
            vec![
                ColumnSchema::new("id").primary_key(),
                ColumnSchema::new("name"),
                ColumnSchema::new("name"),
            ],
        );
        assert!(schema.validate().is_err());
    }

    #[tokio::test]
    async fn test_static_backend_only_evaluation() {
        let ctx = CheckContext {
            actor: Identity::new("u1", "alice"),
            resource_id: "people".to_string(),
        };
        assert!(!BackendOnly::Never.evaluate(&ctx).await.unwrap());
        assert!(BackendOnly::Always.evaluate(&ctx).await.unwrap());
    }
}
