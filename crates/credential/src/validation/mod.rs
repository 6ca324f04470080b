//! Advisory validation sweep
//!
//! Exercises the `CURRENT` credential of every eligible secret. Unlike
//! `testSecret` nothing is gated on the result: failures are reported and
//! the sweep moves on.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::config::RotationConfig;
use crate::core::deadline::bounded;
use crate::core::{KeyId, SecretId, StageLabel, StoreError, ValidatorError};
use crate::services::Services;
use crate::traits::ValidationReport;

/// Why a secret could not be validated.
#[derive(Debug, Error)]
pub enum SmokeError {
    /// Current credential could not be read
    #[error("read current version: {0}")]
    Store(#[source] StoreError),

    /// Current credential was rejected or the check failed
    #[error("validate key '{key_id}': {source}")]
    Validator {
        key_id: KeyId,
        #[source]
        source: ValidatorError,
    },
}

/// A credential that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmokePass {
    pub secret_id: SecretId,
    pub key_id: KeyId,
    pub report: ValidationReport,
}

/// A secret whose credential failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmokeFailure {
    pub secret_id: SecretId,
    pub error: String,
}

/// Result of a validation sweep, ordered by secret id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SmokeReport {
    pub passed: Vec<SmokePass>,
    pub failed: Vec<SmokeFailure>,
}

impl SmokeReport {
    /// Returns `true` if every credential passed.
    pub fn all_passed(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Validates the current credential of eligible secrets.
#[derive(Debug)]
pub struct ValidationSweep {
    services: Arc<Services>,
    config: RotationConfig,
}

impl ValidationSweep {
    pub fn new(services: Arc<Services>, config: RotationConfig) -> Self {
        Self { services, config }
    }

    /// Validates every eligible secret.
    ///
    /// # Errors
    ///
    /// Only a failure to list the eligible secrets is returned.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> Result<SmokeReport, StoreError> {
        let secret_ids = bounded(
            "list eligible secrets",
            self.config.call_timeout,
            self.services.store.list_eligible(&self.config.eligibility),
        )
        .await?;

        let results: Vec<_> = stream::iter(secret_ids)
            .map(|secret_id| async move {
                let result = self.check_secret(&secret_id).await;
                (secret_id, result)
            })
            .buffer_unordered(self.config.sweep_concurrency)
            .collect()
            .await;

        let mut report = SmokeReport::default();
        for (secret_id, result) in results {
            match result {
                Ok(pass) => report.passed.push(pass),
                Err(e) => report.failed.push(SmokeFailure {
                    secret_id,
                    error: e.to_string(),
                }),
            }
        }
        report.passed.sort_by(|a, b| a.secret_id.cmp(&b.secret_id));
        report.failed.sort_by(|a, b| a.secret_id.cmp(&b.secret_id));

        tracing::info!(
            passed = report.passed.len(),
            failed = report.failed.len(),
            "Validation sweep finished"
        );
        Ok(report)
    }

    /// Validates the current credential of one secret.
    #[tracing::instrument(skip(self, secret_id), fields(secret = %secret_id))]
    pub async fn check_secret(&self, secret_id: &SecretId) -> Result<SmokePass, SmokeError> {
        let current = bounded(
            "get version",
            self.config.call_timeout,
            self.services.store.get_version(secret_id, StageLabel::Current),
        )
        .await
        .map_err(SmokeError::Store)?;

        let key_id = current.credential.key_id().clone();
        match bounded(
            "validate credential",
            self.config.call_timeout,
            self.services.validator.validate(&current.credential),
        )
        .await
        {
            Ok(report) => {
                tracing::info!(key_id = %key_id, method = %report.method, "Credential is valid");
                Ok(SmokePass {
                    secret_id: secret_id.clone(),
                    key_id,
                    report,
                })
            }
            Err(source) => {
                tracing::error!(key_id = %key_id, error = %source, "Credential failed validation");
                Err(SmokeError::Validator { key_id, source })
            }
        }
    }
}
