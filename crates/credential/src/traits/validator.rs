//! Credential liveness check

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::{Credential, ValidatorError};

/// Proves a credential works by performing one read-only action with it.
///
/// Used as the mandatory gate in `testSecret` and by the advisory
/// [`ValidationSweep`](crate::validation::ValidationSweep).
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Authenticates as `credential` and exercises the target resource.
    async fn validate(&self, credential: &Credential) -> Result<ValidationReport, ValidatorError>;
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Action performed, e.g. `s3:GetObject app-bot-test-bucket/test`.
    pub method: String,
    /// Human-readable detail.
    pub message: String,
    /// Time spent on the action.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl ValidationReport {
    /// Creates a report.
    pub fn new(method: impl Into<String>, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            method: method.into(),
            message: message.into(),
            duration,
        }
    }
}
