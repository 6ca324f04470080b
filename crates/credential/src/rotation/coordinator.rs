//! Rotation coordinator
//!
//! Runs one phase of a rotation cycle per call. Every phase is safe to
//! redeliver: it first checks whether its effect is already visible in the
//! store and, if so, returns a no-op outcome.

use serde::Serialize;
use std::sync::Arc;

use crate::config::RotationConfig;
use crate::core::deadline::bounded;
use crate::core::{
    Credential, DirectoryError, KeyId, Principal, SecretId, StageConflict, StageLabel, StageMap,
    StoreError, StoredCredential, VersionId,
};
use crate::services::Services;
use crate::traits::ValidationReport;

use super::error::{RotationError, RotationResult};
use super::lock::SecretLocks;
use super::phase::{Phase, RotationRequest};

/// What a phase call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PhaseOutcome {
    /// A new key was issued and stored as the pending version.
    Created { version: VersionId, key_id: KeyId },
    /// A pending version already existed, nothing was issued.
    AlreadyPending { version: VersionId },
    /// The token's version is already stored, nothing was issued.
    AlreadyWritten { version: VersionId },
    /// The token's version was written concurrently; the key issued by this
    /// call was revoked again.
    DuplicateDelivery { version: VersionId, revoked: KeyId },
    /// Nothing to install downstream.
    NothingToInstall,
    /// The pending credential passed validation.
    Validated {
        version: VersionId,
        key_id: KeyId,
        report: ValidationReport,
    },
    /// The pending version became current; the old one is retained as previous.
    Promoted {
        version: VersionId,
        previous: VersionId,
    },
    /// The token's version is already current and nothing is pending.
    AlreadyPromoted { version: VersionId },
    /// Current had already moved; the leftover pending label was removed.
    CompletedPartialPromotion { version: VersionId },
}

/// Drives the four rotation phases against the injected [`Services`].
///
/// # Example
///
/// ```no_run
/// # async fn run(services: std::sync::Arc<keyturn_credential::Services>) -> Result<(), Box<dyn std::error::Error>> {
/// use keyturn_credential::rotation::{Phase, RotationCoordinator, RotationRequest};
/// use keyturn_credential::RotationConfig;
///
/// let coordinator = RotationCoordinator::new(services, RotationConfig::default());
/// let outcome = coordinator
///     .handle(&RotationRequest::new("svc/bot", "token-1", Phase::CreateSecret))
///     .await?;
/// println!("{outcome:?}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RotationCoordinator {
    services: Arc<Services>,
    config: RotationConfig,
    locks: SecretLocks,
}

impl RotationCoordinator {
    /// Creates a coordinator.
    pub fn new(services: Arc<Services>, config: RotationConfig) -> Self {
        Self {
            services,
            config,
            locks: SecretLocks::new(),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// Runs the requested phase.
    ///
    /// Calls for the same secret are serialised within this coordinator.
    ///
    /// # Errors
    ///
    /// Returns a phase-prefixed [`RotationError`]; use
    /// [`RotationError::is_retryable`] to decide whether to redeliver.
    #[tracing::instrument(
        skip(self, request),
        fields(secret = %request.secret_id, token = %request.token, step = %request.phase)
    )]
    pub async fn handle(&self, request: &RotationRequest) -> RotationResult<PhaseOutcome> {
        let _guard = self.locks.acquire(&request.secret_id).await;

        let outcome = match request.phase {
            Phase::CreateSecret => self.create_secret(&request.secret_id, &request.token).await,
            Phase::SetSecret => Ok(PhaseOutcome::NothingToInstall),
            Phase::TestSecret => self.test_secret(&request.secret_id, &request.token).await,
            Phase::FinishSecret => self.finish_secret(&request.secret_id, &request.token).await,
        };

        match &outcome {
            Ok(outcome) => tracing::info!(?outcome, "Rotation phase completed"),
            Err(e) => tracing::error!(error = %e, retryable = e.is_retryable(), "Rotation phase failed"),
        }

        outcome
    }

    async fn create_secret(&self, secret_id: &SecretId, token: &VersionId) -> RotationResult<PhaseOutcome> {
        let phase = Phase::CreateSecret;

        match self.read_stage(secret_id, StageLabel::Pending).await {
            Ok(pending) => {
                tracing::info!(
                    pending = %pending.version,
                    "Pending version already exists, skipping key creation"
                );
                return Ok(PhaseOutcome::AlreadyPending {
                    version: pending.version,
                });
            }
            Err(e) if e.is_stage_not_found() => {}
            Err(source) => return Err(store_error(phase, "read pending version", source)),
        }

        // A version stored under the token has already served this cycle,
        // whatever labels it holds now.
        match self.describe_stages(secret_id).await {
            Ok(stages) if stages.contains(token) => {
                tracing::info!("Version already written for token, skipping key creation");
                return Ok(PhaseOutcome::AlreadyWritten { version: token.clone() });
            }
            Ok(_) | Err(StoreError::SecretNotFound { .. }) => {}
            Err(source) => return Err(store_error(phase, "describe stages", source)),
        }

        let current = self
            .read_stage(secret_id, StageLabel::Current)
            .await
            .map_err(|source| match source {
                StoreError::StageNotFound { .. } => RotationError::MissingStage {
                    phase,
                    secret_id: secret_id.clone(),
                    label: StageLabel::Current,
                },
                source => store_error(phase, "read current version", source),
            })?;
        let principal = current.credential.principal().clone();

        let keys = bounded(
            "list keys",
            self.config.call_timeout,
            self.services.directory.list_keys(&principal),
        )
        .await
        .map_err(|source| directory_error(phase, "list keys", source))?;

        if keys.len() >= self.config.max_keys_per_principal {
            tracing::error!(
                principal = %principal,
                keys = keys.len(),
                max = self.config.max_keys_per_principal,
                "Key quota exhausted"
            );
            return Err(RotationError::QuotaExhausted { phase, principal });
        }

        let issued = bounded(
            "create key",
            self.config.call_timeout,
            self.services.directory.create_key(&principal),
        )
        .await
        .map_err(|source| match source {
            DirectoryError::QuotaExceeded { principal } => RotationError::QuotaExhausted { phase, principal },
            source => directory_error(phase, "create key", source),
        })?;
        let key_id = issued.key_id.clone();
        tracing::debug!(principal = %principal, key_id = %key_id, "Issued new key");

        let credential = Credential::new(issued.key_id, issued.secret, principal.clone());
        let written = bounded(
            "put version",
            self.config.call_timeout,
            self.services
                .store
                .put_version(secret_id, token, &credential, StageLabel::Pending),
        )
        .await;

        match written {
            Ok(()) => Ok(PhaseOutcome::Created {
                version: token.clone(),
                key_id,
            }),
            Err(StoreError::VersionExists { .. }) => {
                tracing::warn!(
                    key_id = %key_id,
                    "Version already written by an earlier delivery, revoking duplicate key"
                );
                self.revoke(&principal, &key_id).await;
                Ok(PhaseOutcome::DuplicateDelivery {
                    version: token.clone(),
                    revoked: key_id,
                })
            }
            Err(source) => {
                self.revoke(&principal, &key_id).await;
                Err(store_error(phase, "write pending version", source))
            }
        }
    }

    async fn test_secret(&self, secret_id: &SecretId, token: &VersionId) -> RotationResult<PhaseOutcome> {
        let phase = Phase::TestSecret;

        let pending = self
            .read_stage(secret_id, StageLabel::Pending)
            .await
            .map_err(|source| match source {
                StoreError::StageNotFound { .. } => RotationError::MissingStage {
                    phase,
                    secret_id: secret_id.clone(),
                    label: StageLabel::Pending,
                },
                source => store_error(phase, "read pending version", source),
            })?;

        if &pending.version != token {
            tracing::warn!(pending = %pending.version, "Pending version does not match token");
        }

        let key_id = pending.credential.key_id().clone();
        let report = bounded(
            "validate credential",
            self.config.call_timeout,
            self.services.validator.validate(&pending.credential),
        )
        .await
        .map_err(|source| RotationError::Validation {
            phase,
            key_id: key_id.clone(),
            source,
        })?;

        Ok(PhaseOutcome::Validated {
            version: pending.version,
            key_id,
            report,
        })
    }

    async fn finish_secret(&self, secret_id: &SecretId, token: &VersionId) -> RotationResult<PhaseOutcome> {
        let phase = Phase::FinishSecret;

        let (current, pending) = match self.settled_stages(phase, secret_id).await? {
            Ok(holders) => holders,
            Err(conflict) => {
                tracing::debug!(label = %conflict.label, "Label in transition, reading stages again");
                self.settled_stages(phase, secret_id)
                    .await?
                    .map_err(|conflict| RotationError::StageInTransition {
                        phase,
                        secret_id: secret_id.clone(),
                        label: conflict.label,
                        holders: conflict.holders,
                    })?
            }
        };

        let missing = |label| RotationError::MissingStage {
            phase,
            secret_id: secret_id.clone(),
            label,
        };

        let (pending, current) = match (pending, current) {
            (None, Some(current)) if &current == token => {
                return Ok(PhaseOutcome::AlreadyPromoted { version: current });
            }
            (None, _) => return Err(missing(StageLabel::Pending)),
            (Some(_), None) => return Err(missing(StageLabel::Current)),
            (Some(pending), Some(current)) => (pending, current),
        };

        if &pending != token {
            tracing::warn!(pending = %pending, "Pending version does not match token");
        }

        if pending == current {
            tracing::info!(version = %pending, "Current already moved, clearing leftover pending label");
            self.move_stage(phase, secret_id, StageLabel::Pending, Some(&pending), None)
                .await?;
            return Ok(PhaseOutcome::CompletedPartialPromotion { version: pending });
        }

        self.move_stage(phase, secret_id, StageLabel::Current, Some(&current), Some(&pending))
            .await?;
        self.move_stage(phase, secret_id, StageLabel::Pending, Some(&pending), None)
            .await?;

        tracing::info!(version = %pending, previous = %current, "Promoted pending version");
        Ok(PhaseOutcome::Promoted {
            version: pending,
            previous: current,
        })
    }

    /// Single holders of `CURRENT` and `PENDING`, or the label caught on two
    /// versions.
    async fn settled_stages(
        &self,
        phase: Phase,
        secret_id: &SecretId,
    ) -> RotationResult<Result<(Option<VersionId>, Option<VersionId>), StageConflict>> {
        let stages = self
            .describe_stages(secret_id)
            .await
            .map_err(|source| store_error(phase, "describe stages", source))?;

        let holders = stages.sole_holder(StageLabel::Current).and_then(|current| {
            let pending = stages.sole_holder(StageLabel::Pending)?;
            Ok((current.cloned(), pending.cloned()))
        });
        Ok(holders)
    }

    async fn describe_stages(&self, secret_id: &SecretId) -> Result<StageMap, StoreError> {
        bounded(
            "describe stages",
            self.config.call_timeout,
            self.services.store.describe_stages(secret_id),
        )
        .await
    }

    async fn read_stage(&self, secret_id: &SecretId, label: StageLabel) -> Result<StoredCredential, StoreError> {
        bounded(
            "get version",
            self.config.call_timeout,
            self.services.store.get_version(secret_id, label),
        )
        .await
    }

    async fn move_stage(
        &self,
        phase: Phase,
        secret_id: &SecretId,
        label: StageLabel,
        from: Option<&VersionId>,
        to: Option<&VersionId>,
    ) -> RotationResult<()> {
        bounded(
            "move stage",
            self.config.call_timeout,
            self.services.store.move_stage(secret_id, label, from, to),
        )
        .await
        .map_err(|source| store_error(phase, "move stage", source))
    }

    /// Deletes a key this call issued but could not store. Failure is logged only.
    async fn revoke(&self, principal: &Principal, key_id: &KeyId) {
        let deleted = bounded(
            "delete key",
            self.config.call_timeout,
            self.services.directory.delete_key(principal, key_id),
        )
        .await;

        if let Err(e) = deleted {
            tracing::warn!(
                principal = %principal,
                key_id = %key_id,
                error = %e,
                "Failed to revoke orphaned key"
            );
        }
    }
}

fn store_error(phase: Phase, step: &'static str, source: StoreError) -> RotationError {
    RotationError::Store { phase, step, source }
}

fn directory_error(phase: Phase, step: &'static str, source: DirectoryError) -> RotationError {
    RotationError::Directory { phase, step, source }
}
