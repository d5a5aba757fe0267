//! Diff construction — the capture side of the approval flow.
//!
//! Builds the old/new snapshot pair for an intercepted mutation, trims
//! fields whose values didn't change, then hands the remainder to the
//! redactor. Trimming runs first for all three actions: a backend-only
//! column that didn't change is gone before its predicate would ever be
//! evaluated.

use crate::connector::Connector;
use crate::diff::redact::redact;
use crate::diff::Diff;
use crate::error::{ApprovalError, Result};
use crate::record::{key_string, overlay, values_equal, FieldMap};
use crate::request::MutationKind;
use crate::schema::{CheckContext, ResourceSchema};
use anyhow::anyhow;

/// A built diff plus the record key it resolved, if any.
/// The key may be absent for creates whose store assigns it later.
#[derive(Debug, Clone)]
pub struct BuiltDiff {
    pub diff: Diff,
    pub record_id: Option<String>,
}

/// Builds review diffs for one resource.
pub struct DiffBuilder<'a> {
    schema: &'a ResourceSchema,
    connector: &'a dyn Connector,
}

impl<'a> DiffBuilder<'a> {
    pub fn new(schema: &'a ResourceSchema, connector: &'a dyn Connector) -> Self {
        Self { schema, connector }
    }

    /// Build the diff for one mutation attempt.
    ///
    /// `data` is the submitted payload: the full record for create, the
    /// updated fields for edit (must include the primary key), and the
    /// record being removed for delete.
    pub async fn build(
        &self,
        kind: MutationKind,
        data: &FieldMap,
        ctx: &CheckContext,
    ) -> Result<BuiltDiff> {
        let pk = self.schema.primary_key_column()?;
        let record_id = data.get(&pk.name).and_then(key_string);

        let (mut old_record, mut new_record) = match kind {
            MutationKind::Create => (FieldMap::new(), data.clone()),
            MutationKind::Edit => {
                let current = self.fetch_current(&record_id, &pk.name).await?;
                let candidate = overlay(&current, data);
                (current, candidate)
            }
            MutationKind::Delete => {
                let current = self.fetch_current(&record_id, &pk.name).await?;
                (current, FieldMap::new())
            }
        };

        // No-op fields never appear in the diff.
        for column in &self.schema.columns {
            if values_equal(old_record.get(&column.name), new_record.get(&column.name)) {
                old_record.remove(&column.name);
                new_record.remove(&column.name);
            }
        }

        redact(
            &self.schema.columns,
            ctx,
            kind,
            &mut old_record,
            &mut new_record,
        )
        .await?;

        Ok(BuiltDiff {
            diff: Diff::new(old_record, new_record),
            record_id,
        })
    }

    /// The pre-mutation record, fetched by primary key.
    async fn fetch_current(&self, record_id: &Option<String>, pk_name: &str) -> Result<FieldMap> {
        let id = record_id.as_deref().ok_or_else(|| {
            ApprovalError::Internal(anyhow!(
                "primary key '{}' missing from submitted data for '{}'",
                pk_name,
                self.schema.resource_id
            ))
        })?;
        self.connector
            .get_by_key(&self.schema.resource_id, id)
            .await
            .map_err(|e| ApprovalError::Connector(e.to_string()))?
            .ok_or_else(|| {
                ApprovalError::Connector(format!(
                    "record '{}' not found in '{}'",
                    id, self.schema.resource_id
                ))
            })
    }
}
