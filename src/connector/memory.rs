//! In-memory connector — a HashMap per resource, keyed by primary key.
//!
//! Used by the test suite and usable for single-process deployments where
//! the host keeps records in memory anyway. Each resource must be registered
//! with its primary-key column before use so `create` knows how to key new
//! records (and can assign a UUID when the submitted record has no key).

use crate::connector::Connector;
use crate::record::{key_string, FieldMap};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A registered resource: its rows and its primary-key column.
struct Table {
    key_column: String,
    rows: HashMap<String, FieldMap>,
}

/// In-memory implementation of [`Connector`].
pub struct MemoryConnector {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Register a resource and its primary-key column.
    pub fn with_resource(
        mut self,
        resource: impl Into<String>,
        key_column: impl Into<String>,
    ) -> Self {
        self.tables.get_mut().insert(
            resource.into(),
            Table {
                key_column: key_column.into(),
                rows: HashMap::new(),
            },
        );
        self
    }

    /// Register a resource on an already-shared connector.
    pub async fn register(&self, resource: impl Into<String>, key_column: impl Into<String>) {
        self.tables.write().await.insert(
            resource.into(),
            Table {
                key_column: key_column.into(),
                rows: HashMap::new(),
            },
        );
    }

    /// Seed a record directly, bypassing interception. For test fixtures.
    pub async fn seed(&self, resource: &str, record: FieldMap) -> Result<FieldMap> {
        self.create(resource, record).await
    }

    /// Number of rows in a resource.
    pub async fn len(&self, resource: &str) -> usize {
        self.tables
            .read()
            .await
            .get(resource)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn get_by_key(&self, resource: &str, id: &str) -> Result<Option<FieldMap>> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(resource) else {
            bail!("unknown resource '{resource}'");
        };
        Ok(table.rows.get(id).cloned())
    }

    async fn create(&self, resource: &str, mut record: FieldMap) -> Result<FieldMap> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(resource) else {
            bail!("unknown resource '{resource}'");
        };

        let key = match record.get(&table.key_column).and_then(key_string) {
            Some(key) => key,
            None => {
                // No usable key submitted — assign one, like a store with
                // generated primary keys would.
                let key = Uuid::new_v4().to_string();
                record.insert(table.key_column.clone(), Value::String(key.clone()));
                key
            }
        };

        if table.rows.contains_key(&key) {
            bail!("duplicate key '{key}' in resource '{resource}'");
        }
        table.rows.insert(key, record.clone());
        Ok(record)
    }

    async fn update(&self, resource: &str, id: &str, fields: FieldMap) -> Result<()> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(resource) else {
            bail!("unknown resource '{resource}'");
        };
        let Some(row) = table.rows.get_mut(id) else {
            bail!("record '{id}' not found in resource '{resource}'");
        };
        for (k, v) in fields {
            row.insert(k, v);
        }
        Ok(())
    }

    async fn delete(&self, resource: &str, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(resource) else {
            bail!("unknown resource '{resource}'");
        };
        if table.rows.remove(id).is_none() {
            bail!("record '{id}' not found in resource '{resource}'");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let connector = MemoryConnector::new();
        connector.register("people", "id").await;

        let created = connector
            .create("people", record(&[("id", json!("p1")), ("name", json!("Bob"))]))
            .await
            .unwrap();
        assert_eq!(created.get("id"), Some(&json!("p1")));

        connector
            .update("people", "p1", record(&[("name", json!("Rob"))]))
            .await
            .unwrap();
        let fetched = connector.get_by_key("people", "p1").await.unwrap().unwrap();
        assert_eq!(fetched.get("name"), Some(&json!("Rob")));

        connector.delete("people", "p1").await.unwrap();
        assert!(connector.get_by_key("people", "p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_assigns_missing_key() {
        let connector = MemoryConnector::new();
        connector.register("people", "id").await;

        let created = connector
            .create("people", record(&[("name", json!("Ann"))]))
            .await
            .unwrap();
        let key = created.get("id").and_then(key_string).unwrap();
        assert!(connector.get_by_key("people", &key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_resource_errors() {
        let connector = MemoryConnector::new();
        assert!(connector.get_by_key("nope", "x").await.is_err());
        assert!(connector.delete("nope", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_update_missing_record_errors() {
        let connector = MemoryConnector::new();
        connector.register("people", "id").await;
        let result = connector
            .update("people", "ghost", record(&[("name", json!("x"))]))
            .await;
        assert!(result.is_err());
    }
}
