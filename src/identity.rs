//! Caller identities and the session-token boundary.
//!
//! Authentication itself is external — the engine only consumes a resolved
//! identity. The gateway resolves session tokens through an
//! [`IdentityResolver`] so any host auth system can plug in.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A resolved user identity — requester or reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id (primary key in the host's user store).
    pub id: String,
    /// Login name, matched against the reviewer user allow-list.
    pub username: String,
    /// Role names, matched against the reviewer role allow-list.
    pub roles: Vec<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }
}

/// Resolves a session token to an identity.
/// Returns Ok(None) when the token is unknown or expired.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Option<Identity>>;
}

/// Fixed token→identity table. For tests and single-process deployments
/// where sessions are provisioned out of band.
pub struct StaticTokens {
    tokens: HashMap<String, Identity>,
}

impl StaticTokens {
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }
}

impl Default for StaticTokens {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityResolver for StaticTokens {
    async fn resolve(&self, token: &str) -> Result<Option<Identity>> {
        Ok(self.tokens.get(token).cloned())
    }
}
