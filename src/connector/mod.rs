//! The data-store boundary.
//!
//! The engine never talks to a database directly — all record CRUD goes
//! through this trait, implemented by the host for whatever store it uses.
//! [`memory::MemoryConnector`] is the in-crate implementation for tests and
//! single-process deployments.

pub mod memory;

pub use memory::MemoryConnector;

use crate::record::FieldMap;
use anyhow::Result;
use async_trait::async_trait;

/// CRUD access to the underlying record store.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Fetch a record by primary key. Ok(None) when it doesn't exist.
    async fn get_by_key(&self, resource: &str, id: &str) -> Result<Option<FieldMap>>;

    /// Insert a record; returns the record as persisted (with any
    /// store-assigned fields filled in).
    async fn create(&self, resource: &str, record: FieldMap) -> Result<FieldMap>;

    /// Update only the given fields of an existing record.
    async fn update(&self, resource: &str, id: &str, fields: FieldMap) -> Result<()>;

    /// Delete a record by primary key.
    async fn delete(&self, resource: &str, id: &str) -> Result<()>;
}
