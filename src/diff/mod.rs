//! Field-level diffs — the artifact a reviewer decides on.
//!
//! A diff holds only the fields whose values differ between the pre- and
//! post-mutation snapshots, after backend-only redaction. Serialized field
//! names (`oldRecord` / `newRecord`) match the persisted request shape.

pub mod builder;
pub mod redact;

pub use builder::{BuiltDiff, DiffBuilder};

use crate::record::FieldMap;
use serde::{Deserialize, Serialize};

/// Placeholder stored in `old_record` for a changed backend-only field.
pub const HIDDEN_BEFORE: &str = "<hidden value before>";
/// Placeholder stored in `new_record` for a changed backend-only field.
pub const HIDDEN_AFTER: &str = "<hidden value after>";

/// The changed-field payload persisted with an approval request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    #[serde(rename = "oldRecord")]
    pub old_record: FieldMap,
    #[serde(rename = "newRecord")]
    pub new_record: FieldMap,
}

impl Diff {
    pub fn new(old_record: FieldMap, new_record: FieldMap) -> Self {
        Self {
            old_record,
            new_record,
        }
    }

    /// A diff with nothing in it — the mutation was a no-op.
    pub fn is_empty(&self) -> bool {
        self.old_record.is_empty() && self.new_record.is_empty()
    }

    /// Names of fields appearing on either side.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.old_record.keys().map(String::as_str).collect();
        for name in self.new_record.keys() {
            if !self.old_record.contains_key(name) {
                names.push(name);
            }
        }
        names
    }
}
