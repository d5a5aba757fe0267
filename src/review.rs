//! The review gate — who may resolve a pending request.
//!
//! Authorization is an allow-list check over usernames and roles, and it
//! fails closed: with both lists empty, nobody is authorized. Rejection
//! needs exactly the same authorization as approval — there is no
//! "anyone may reject their own request" privilege.
//!
//! An optional second factor routes a verification code through an external
//! verifier. A failed or missing code denies the transition without
//! consuming the pending request.

use crate::config::ReviewConfig;
use crate::error::{ApprovalError, Result};
use crate::identity::Identity;
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use std::sync::Arc;

/// External verification-code check (TOTP, SMS, hardware token — the
/// engine doesn't care).
#[async_trait]
pub trait SecondFactorVerifier: Send + Sync {
    /// Ok(true) when the code is valid for this actor.
    async fn verify(&self, actor: &Identity, code: &str) -> AnyResult<bool>;
}

/// Gate in front of every resolution.
pub struct ReviewGate {
    allowed_users: Vec<String>,
    allowed_roles: Vec<String>,
    require_second_factor: bool,
    verifier: Option<Arc<dyn SecondFactorVerifier>>,
}

impl ReviewGate {
    pub fn from_config(config: &ReviewConfig) -> Self {
        Self {
            allowed_users: config.allowed_users.clone(),
            allowed_roles: config.allowed_roles.clone(),
            require_second_factor: config.require_second_factor,
            verifier: None,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn SecondFactorVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Setup-time validation: a required second factor without a verifier
    /// is a configuration error, caught before the first resolution.
    pub fn validate(&self) -> Result<()> {
        if self.require_second_factor && self.verifier.is_none() {
            return Err(ApprovalError::Config(
                "second factor is required but no verifier is configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Allow-list check. Fail-closed when nothing is configured.
    pub fn authorize(&self, actor: &Identity) -> Result<()> {
        if self.allowed_users.is_empty() && self.allowed_roles.is_empty() {
            return Err(ApprovalError::Forbidden(
                "no reviewers are configured for this resource".to_string(),
            ));
        }
        if self.allowed_users.iter().any(|u| u == &actor.username) {
            return Ok(());
        }
        if actor
            .roles
            .iter()
            .any(|r| self.allowed_roles.iter().any(|allowed| allowed == r))
        {
            return Ok(());
        }
        Err(ApprovalError::Forbidden(format!(
            "user '{}' may not resolve approval requests",
            actor.username
        )))
    }

    /// Full gate: allow-list, then the second factor when required.
    pub async fn check(&self, actor: &Identity, code: Option<&str>) -> Result<()> {
        self.authorize(actor)?;

        if !self.require_second_factor {
            return Ok(());
        }
        let verifier = self.verifier.as_ref().ok_or_else(|| {
            ApprovalError::Config(
                "second factor is required but no verifier is configured".to_string(),
            )
        })?;
        let code = code.ok_or_else(|| {
            ApprovalError::SecondFactor("verification code required".to_string())
        })?;
        let valid = verifier
            .verify(actor, code)
            .await
            .map_err(|e| ApprovalError::SecondFactor(e.to_string()))?;
        if !valid {
            return Err(ApprovalError::SecondFactor(
                "verification code rejected".to_string(),
            ));
        }
        Ok(())
    }
}
