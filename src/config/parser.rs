//! YAML loader for per-resource review configuration.
//!
//! Deployments keep review policy next to their other config files:
//!
//! ```yaml
//! request_resource: approval_requests
//! allowed_roles: [admin, compliance]
//! allowed_users: alice
//! require_second_factor: true
//! fields:
//!   status: approval_status
//! ```
//!
//! Single-string and list forms are both accepted for the allow-lists.

use crate::config::{RequestFields, ReviewConfig};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Raw YAML representation before conversion to [`ReviewConfig`].
#[derive(Debug, Deserialize)]
struct RawConfig {
    request_resource: String,
    #[serde(default)]
    allowed_users: Option<StringOrVec>,
    #[serde(default)]
    allowed_roles: Option<StringOrVec>,
    #[serde(default)]
    require_second_factor: bool,
    #[serde(default)]
    fields: Option<RawFields>,
}

/// Partial field-name overrides; anything omitted keeps its default.
#[derive(Debug, Default, Deserialize)]
struct RawFields {
    id: Option<String>,
    resource_id: Option<String>,
    record_id: Option<String>,
    action: Option<String>,
    status: Option<String>,
    data: Option<String>,
    requester_id: Option<String>,
    reviewer_id: Option<String>,
    created_at: Option<String>,
    extra: Option<String>,
}

/// Allows YAML fields to be either a single string or a list of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrVec {
    Single(String),
    Multiple(Vec<String>),
}

impl StringOrVec {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringOrVec::Single(s) => vec![s],
            StringOrVec::Multiple(v) => v,
        }
    }
}

/// Parse a review config from a file path.
pub fn parse_config_file(path: impl AsRef<Path>) -> Result<ReviewConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read review config: {}", path.display()))?;
    parse_config_str(&content)
        .with_context(|| format!("Failed to parse review config: {}", path.display()))
}

/// Parse a review config from a YAML string.
pub fn parse_config_str(yaml: &str) -> Result<ReviewConfig> {
    let raw: RawConfig =
        serde_yaml::from_str(yaml).context("Invalid YAML syntax in review config")?;

    let mut fields = RequestFields::default();
    if let Some(overrides) = raw.fields {
        apply(&mut fields.id, overrides.id);
        apply(&mut fields.resource_id, overrides.resource_id);
        apply(&mut fields.record_id, overrides.record_id);
        apply(&mut fields.action, overrides.action);
        apply(&mut fields.status, overrides.status);
        apply(&mut fields.data, overrides.data);
        apply(&mut fields.requester_id, overrides.requester_id);
        apply(&mut fields.reviewer_id, overrides.reviewer_id);
        apply(&mut fields.created_at, overrides.created_at);
        apply(&mut fields.extra, overrides.extra);
    }

    let config = ReviewConfig {
        request_resource: raw.request_resource,
        allowed_users: raw.allowed_users.map(StringOrVec::into_vec).unwrap_or_default(),
        allowed_roles: raw.allowed_roles.map(StringOrVec::into_vec).unwrap_or_default(),
        require_second_factor: raw.require_second_factor,
        fields,
    };
    config.validate()?;
    Ok(config)
}

fn apply(slot: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let config = parse_config_str("request_resource: approval_requests").unwrap();
        assert_eq!(config.request_resource, "approval_requests");
        assert!(config.allowed_users.is_empty());
        assert!(!config.require_second_factor);
    }

    #[test]
    fn test_parse_full() {
        let yaml = r#"
request_resource: approval_requests
allowed_roles: [admin, compliance]
allowed_users: alice
require_second_factor: true
fields:
  status: approval_status
  data: diff
"#;
        let config = parse_config_str(yaml).unwrap();
        assert_eq!(config.allowed_roles, vec!["admin", "compliance"]);
        assert_eq!(config.allowed_users, vec!["alice"]);
        assert!(config.require_second_factor);
        assert_eq!(config.fields.status, "approval_status");
        assert_eq!(config.fields.data, "diff");
        // untouched names keep their defaults
        assert_eq!(config.fields.reviewer_id, "reviewer_id");
    }

    #[test]
    fn test_reject_missing_request_resource() {
        assert!(parse_config_str("allowed_users: [alice]").is_err());
        assert!(parse_config_str("request_resource: \"\"").is_err());
    }

    #[test]
    fn test_reject_invalid_yaml() {
        assert!(parse_config_str("request_resource: [unterminated").is_err());
    }

    #[test]
    fn test_reject_colliding_field_overrides() {
        let yaml = r#"
request_resource: approval_requests
fields:
  reviewer_id: status
"#;
        assert!(parse_config_str(yaml).is_err());
    }
}
