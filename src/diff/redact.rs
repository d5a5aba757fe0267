//! Backend-only redaction.
//!
//! Decides which fields of a captured diff a reviewer may see. A changed
//! backend-only field is replaced by a fixed placeholder on both sides; an
//! unchanged one is dropped from both snapshots entirely, so its presence
//! can't leak anything either.
//!
//! Per-column predicates have no ordering dependency and share no mutable
//! state, so they are evaluated concurrently. A predicate failure aborts
//! the whole capture.

use crate::diff::{HIDDEN_AFTER, HIDDEN_BEFORE};
use crate::error::{ApprovalError, Result};
use crate::record::{values_equal, FieldMap};
use crate::request::MutationKind;
use crate::schema::{BackendOnly, CheckContext, ColumnSchema};
use futures_util::future;
use serde_json::Value;

/// Apply backend-only redaction to a pair of snapshots, in place.
///
/// Only columns that actually appear in either snapshot are considered, so
/// predicates for untouched columns are never evaluated.
pub async fn redact(
    columns: &[ColumnSchema],
    ctx: &CheckContext,
    kind: MutationKind,
    old_record: &mut FieldMap,
    new_record: &mut FieldMap,
) -> Result<()> {
    let relevant: Vec<&ColumnSchema> = columns
        .iter()
        .filter(|c| !matches!(c.backend_only, BackendOnly::Never))
        .filter(|c| old_record.contains_key(&c.name) || new_record.contains_key(&c.name))
        .collect();

    if relevant.is_empty() {
        return Ok(());
    }

    let checks = relevant.iter().map(|column| {
        let name = column.name.clone();
        async move {
            let hidden = column.backend_only.evaluate(ctx).await.map_err(|e| {
                ApprovalError::Predicate {
                    column: name.clone(),
                    message: e.to_string(),
                }
            })?;
            Ok::<_, ApprovalError>((name, hidden))
        }
    });
    let results = future::try_join_all(checks).await?;

    for (name, hidden) in results {
        if !hidden {
            continue;
        }
        if values_equal(old_record.get(&name), new_record.get(&name)) {
            // Unchanged: carries no information, must not leak via presence.
            old_record.remove(&name);
            new_record.remove(&name);
        } else {
            if kind != MutationKind::Delete {
                new_record.insert(name.clone(), Value::String(HIDDEN_AFTER.to_string()));
            }
            if kind != MutationKind::Create {
                old_record.insert(name, Value::String(HIDDEN_BEFORE.to_string()));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::schema::BackendOnlyCheck;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    fn ctx() -> CheckContext {
        CheckContext {
            actor: Identity::new("u1", "alice"),
            resource_id: "people".to_string(),
        }
    }

    fn record(pairs: &[(&str, Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_changed_backend_only_field_is_masked_both_ways() {
        let columns = vec![ColumnSchema::new("salary").backend_only()];
        let mut old = record(&[("salary", json!(100))]);
        let mut new = record(&[("salary", json!(200))]);

        redact(&columns, &ctx(), MutationKind::Edit, &mut old, &mut new)
            .await
            .unwrap();

        assert_eq!(old.get("salary"), Some(&json!(HIDDEN_BEFORE)));
        assert_eq!(new.get("salary"), Some(&json!(HIDDEN_AFTER)));
    }

    #[tokio::test]
    async fn test_unchanged_backend_only_field_is_dropped() {
        let columns = vec![ColumnSchema::new("salary").backend_only()];
        let mut old = record(&[("salary", json!(100))]);
        let mut new = record(&[("salary", json!(100))]);

        redact(&columns, &ctx(), MutationKind::Edit, &mut old, &mut new)
            .await
            .unwrap();

        assert!(old.get("salary").is_none());
        assert!(new.get("salary").is_none());
    }

    #[tokio::test]
    async fn test_create_masks_only_new_side() {
        let columns = vec![ColumnSchema::new("salary").backend_only()];
        let mut old = FieldMap::new();
        let mut new = record(&[("salary", json!(200))]);

        redact(&columns, &ctx(), MutationKind::Create, &mut old, &mut new)
            .await
            .unwrap();

        assert!(old.get("salary").is_none());
        assert_eq!(new.get("salary"), Some(&json!(HIDDEN_AFTER)));
    }

    #[tokio::test]
    async fn test_delete_masks_only_old_side() {
        let columns = vec![ColumnSchema::new("salary").backend_only()];
        let mut old = record(&[("salary", json!(200))]);
        let mut new = FieldMap::new();

        redact(&columns, &ctx(), MutationKind::Delete, &mut old, &mut new)
            .await
            .unwrap();

        assert_eq!(old.get("salary"), Some(&json!(HIDDEN_BEFORE)));
        assert!(new.get("salary").is_none());
    }

    struct Failing;

    #[async_trait]
    impl BackendOnlyCheck for Failing {
        async fn check(&self, _ctx: &CheckContext) -> anyhow::Result<bool> {
            Err(anyhow!("directory service unreachable"))
        }
    }

    #[tokio::test]
    async fn test_predicate_error_aborts_capture() {
        let columns = vec![ColumnSchema::new("salary").backend_only_when(Arc::new(Failing))];
        let mut old = record(&[("salary", json!(100))]);
        let mut new = record(&[("salary", json!(200))]);

        let err = redact(&columns, &ctx(), MutationKind::Edit, &mut old, &mut new)
            .await
            .unwrap_err();
        match err {
            ApprovalError::Predicate { column, .. } => assert_eq!(column, "salary"),
            other => panic!("expected Predicate error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_predicate_not_evaluated_for_absent_column() {
        // The failing predicate belongs to a column not present in either
        // snapshot, so it must never run.
        let columns = vec![
            ColumnSchema::new("salary").backend_only_when(Arc::new(Failing)),
            ColumnSchema::new("name"),
        ];
        let mut old = record(&[("name", json!("Bob"))]);
        let mut new = record(&[("name", json!("Rob"))]);

        redact(&columns, &ctx(), MutationKind::Edit, &mut old, &mut new)
            .await
            .unwrap();
        assert_eq!(new.get("name"), Some(&json!("Rob")));
    }
}
