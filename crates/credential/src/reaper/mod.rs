//! Inactivity reaper
//!
//! Cleans up after rotation in two passes per secret:
//!
//! 1. **Purge**: every `Inactive` key of the owning principal is deleted
//! 2. **Demotion**: the key of the `PREVIOUS` version is set `Inactive` once
//!    it has been idle for at least the inactivity threshold
//!
//! A key demoted by one sweep is therefore deleted by the next one.

mod report;

pub use report::{Demotion, SecretReport, SweepFailure, SweepReport};

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;

use crate::config::RotationConfig;
use crate::core::deadline::bounded;
use crate::core::{
    DirectoryError, KeyId, KeyRecord, KeyStatus, Principal, SecretId, StageLabel, StoreError,
};
use crate::services::Services;

/// Reaper errors, tagged with the step that failed.
#[derive(Debug, Error)]
pub enum ReapError {
    /// Secret store call failed
    #[error("{step}: {source}")]
    Store {
        step: &'static str,
        #[source]
        source: StoreError,
    },

    /// Identity directory call failed
    #[error("{step}: {source}")]
    Directory {
        step: &'static str,
        #[source]
        source: DirectoryError,
    },
}

/// Demotes idle previous keys and purges inactive ones.
#[derive(Debug)]
pub struct Reaper {
    services: Arc<Services>,
    config: RotationConfig,
}

impl Reaper {
    /// Creates a reaper.
    pub fn new(services: Arc<Services>, config: RotationConfig) -> Self {
        Self { services, config }
    }

    /// Reaps every secret carrying the eligibility tag.
    ///
    /// Secrets are processed concurrently up to `sweep_concurrency`. A failing
    /// secret is logged and recorded in the report; it never stops the sweep.
    ///
    /// # Errors
    ///
    /// Only a failure to list the eligible secrets is returned.
    #[tracing::instrument(skip(self), fields(tag = %self.config.eligibility.key))]
    pub async fn sweep(&self) -> Result<SweepReport, ReapError> {
        let secret_ids = bounded(
            "list eligible secrets",
            self.config.call_timeout,
            self.services.store.list_eligible(&self.config.eligibility),
        )
        .await
        .map_err(|source| ReapError::Store {
            step: "list eligible secrets",
            source,
        })?;

        tracing::info!(secrets = secret_ids.len(), "Starting reaper sweep");

        let results: Vec<_> = stream::iter(secret_ids)
            .map(|secret_id| async move {
                let result = self.reap_secret(&secret_id).await;
                (secret_id, result)
            })
            .buffer_unordered(self.config.sweep_concurrency)
            .collect()
            .await;

        let mut report = SweepReport::default();
        for (secret_id, result) in results {
            match result {
                Ok(secret) => report.secrets.push(secret),
                Err(e) => {
                    tracing::error!(secret = %secret_id, error = %e, "Failed to reap secret");
                    report.failures.push(SweepFailure {
                        secret_id,
                        error: e.to_string(),
                    });
                }
            }
        }
        report.sort();

        tracing::info!(
            reaped = report.secrets.len(),
            failed = report.failures.len(),
            "Reaper sweep finished"
        );
        Ok(report)
    }

    /// Reaps a single secret.
    ///
    /// Demotion runs even when the purge hit an error; the first error of the
    /// two passes is returned afterwards.
    #[tracing::instrument(skip(self, secret_id), fields(secret = %secret_id))]
    pub async fn reap_secret(&self, secret_id: &SecretId) -> Result<SecretReport, ReapError> {
        let current = bounded(
            "get version",
            self.config.call_timeout,
            self.services.store.get_version(secret_id, StageLabel::Current),
        )
        .await
        .map_err(|source| ReapError::Store {
            step: "read current version",
            source,
        })?;
        let principal = current.credential.principal().clone();

        let keys = self.list_keys(&principal).await?;

        let mut first_error = None;

        let (purged, purge_error) = self.purge_inactive(&principal, &keys).await;
        if let Some(e) = purge_error {
            first_error.get_or_insert(e);
        }

        let remaining: Vec<&KeyRecord> = keys.iter().filter(|k| !purged.contains(&k.key_id)).collect();
        let demotion = match self
            .demote_previous(secret_id, &principal, current.credential.key_id(), &remaining)
            .await
        {
            Ok(demotion) => Some(demotion),
            Err(e) => {
                first_error.get_or_insert(e);
                None
            }
        };

        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(SecretReport {
            secret_id: secret_id.clone(),
            principal,
            purged,
            demotion,
        })
    }

    async fn list_keys(&self, principal: &Principal) -> Result<Vec<KeyRecord>, ReapError> {
        bounded(
            "list keys",
            self.config.call_timeout,
            self.services.directory.list_keys(principal),
        )
        .await
        .map_err(|source| ReapError::Directory {
            step: "list keys",
            source,
        })
    }

    /// Deletes every inactive key, continuing past individual failures.
    async fn purge_inactive(&self, principal: &Principal, keys: &[KeyRecord]) -> (Vec<KeyId>, Option<ReapError>) {
        let mut purged = Vec::new();
        let mut first_error = None;

        for key in keys.iter().filter(|k| !k.is_active()) {
            let deleted = bounded(
                "delete key",
                self.config.call_timeout,
                self.services.directory.delete_key(principal, &key.key_id),
            )
            .await;

            match deleted {
                Ok(()) => {
                    tracing::info!(principal = %principal, key_id = %key.key_id, "Deleted inactive key");
                    purged.push(key.key_id.clone());
                }
                Err(DirectoryError::KeyNotFound { .. }) => {
                    tracing::debug!(key_id = %key.key_id, "Inactive key already deleted");
                    purged.push(key.key_id.clone());
                }
                Err(source) => {
                    tracing::warn!(
                        principal = %principal,
                        key_id = %key.key_id,
                        error = %source,
                        "Failed to delete inactive key"
                    );
                    first_error.get_or_insert(ReapError::Directory {
                        step: "purge inactive keys",
                        source,
                    });
                }
            }
        }

        (purged, first_error)
    }

    async fn demote_previous(
        &self,
        secret_id: &SecretId,
        principal: &Principal,
        current_key: &KeyId,
        keys: &[&KeyRecord],
    ) -> Result<Demotion, ReapError> {
        let previous = match bounded(
            "get version",
            self.config.call_timeout,
            self.services.store.get_version(secret_id, StageLabel::Previous),
        )
        .await
        {
            Ok(previous) => previous,
            Err(e) if e.is_stage_not_found() => {
                tracing::debug!("No previous version");
                return Ok(Demotion::NoPreviousVersion);
            }
            Err(source) => {
                return Err(ReapError::Store {
                    step: "read previous version",
                    source,
                });
            }
        };

        let key_id = previous.credential.key_id().clone();

        if &key_id == current_key {
            tracing::warn!(key_id = %key_id, "Previous version holds the current key, leaving it alone");
            return Ok(Demotion::SameAsCurrent { key_id });
        }

        if !keys.iter().any(|k| k.key_id == key_id) {
            tracing::debug!(key_id = %key_id, "Previous key already removed");
            return Ok(Demotion::AlreadyRemoved { key_id });
        }

        let last_used = bounded(
            "get last used",
            self.config.call_timeout,
            self.services.directory.last_used(&key_id),
        )
        .await
        .map_err(|source| ReapError::Directory {
            step: "read last used",
            source,
        })?;

        let Some(last_used) = last_used else {
            tracing::info!(key_id = %key_id, "Previous key never used, keeping it active");
            return Ok(Demotion::NeverUsed { key_id });
        };

        let idle_for = self.services.clock.now() - last_used;
        let idle = idle_for.to_std().unwrap_or_default();

        if idle_for < self.config.inactivity_threshold_signed() {
            tracing::info!(
                key_id = %key_id,
                idle_secs = idle.as_secs(),
                "Previous key within grace period"
            );
            return Ok(Demotion::WithinGrace { key_id, idle });
        }

        bounded(
            "set key status",
            self.config.call_timeout,
            self.services
                .directory
                .set_key_status(principal, &key_id, KeyStatus::Inactive),
        )
        .await
        .map_err(|source| ReapError::Directory {
            step: "deactivate previous key",
            source,
        })?;

        tracing::info!(
            principal = %principal,
            key_id = %key_id,
            idle_secs = idle.as_secs(),
            "Deactivated idle previous key"
        );
        Ok(Demotion::Deactivated { key_id, idle })
    }
}
