//! Rotation-specific error types
//!
//! Every variant except [`RotationError::UnknownPhase`] carries the phase it
//! was raised in and prints as `"<phase>: ..."`.

use thiserror::Error;

use crate::core::{DirectoryError, KeyId, Principal, SecretId, StageLabel, StoreError, ValidatorError, VersionId};

use super::phase::Phase;

/// Errors that can occur during credential rotation
#[derive(Debug, Error)]
pub enum RotationError {
    /// Principal already holds the maximum number of keys
    #[error("{phase}: rotation blocked: key quota exhausted for principal '{principal}'")]
    QuotaExhausted { phase: Phase, principal: Principal },

    /// A stage the phase depends on is absent
    #[error("{phase}: secret '{secret_id}' has no {label} version")]
    MissingStage {
        phase: Phase,
        secret_id: SecretId,
        label: StageLabel,
    },

    /// A label is held by more than one version while a move is in flight
    #[error("{phase}: {label} of secret '{secret_id}' is held by {holders:?}")]
    StageInTransition {
        phase: Phase,
        secret_id: SecretId,
        label: StageLabel,
        holders: Vec<VersionId>,
    },

    /// Secret store call failed
    #[error("{phase}: {step}: {source}")]
    Store {
        phase: Phase,
        step: &'static str,
        #[source]
        source: StoreError,
    },

    /// Identity directory call failed
    #[error("{phase}: {step}: {source}")]
    Directory {
        phase: Phase,
        step: &'static str,
        #[source]
        source: DirectoryError,
    },

    /// Pending credential failed validation
    #[error("{phase}: validation of key '{key_id}' failed: {source}")]
    Validation {
        phase: Phase,
        key_id: KeyId,
        #[source]
        source: ValidatorError,
    },

    /// Host sent a step this coordinator does not know
    #[error("unknown rotation step '{step}'")]
    UnknownPhase { step: String },
}

impl RotationError {
    /// Phase the error was raised in, `None` for an unknown step.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::QuotaExhausted { phase, .. }
            | Self::MissingStage { phase, .. }
            | Self::StageInTransition { phase, .. }
            | Self::Store { phase, .. }
            | Self::Directory { phase, .. }
            | Self::Validation { phase, .. } => Some(*phase),
            Self::UnknownPhase { .. } => None,
        }
    }

    /// Returns `true` if the host may redeliver the same phase and expect a
    /// different outcome.
    ///
    /// State-consistency failures (quota, missing stage, unknown step) are
    /// fatal for the cycle.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StageInTransition { .. } | Self::Validation { .. } => true,
            Self::Store { source, .. } => source.is_transient(),
            Self::Directory { source, .. } => source.is_transient(),
            Self::QuotaExhausted { .. } | Self::MissingStage { .. } | Self::UnknownPhase { .. } => {
                false
            }
        }
    }
}

/// Result type for rotation operations
pub type RotationResult<T> = Result<T, RotationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn messages_are_phase_prefixed() {
        let err = RotationError::QuotaExhausted {
            phase: Phase::CreateSecret,
            principal: Principal::new("svc-bot"),
        };
        assert_eq!(
            err.to_string(),
            "createSecret: rotation blocked: key quota exhausted for principal 'svc-bot'"
        );
        assert_eq!(err.phase(), Some(Phase::CreateSecret));
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_store_failure_is_retryable() {
        let err = RotationError::Store {
            phase: Phase::FinishSecret,
            step: "describe stages",
            source: StoreError::Timeout {
                operation: "describe stages",
                after: Duration::from_secs(30),
            },
        };
        assert!(err.is_retryable());
        assert!(err.to_string().starts_with("finishSecret: describe stages:"));
    }

    #[test]
    fn malformed_secret_is_fatal() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = RotationError::Store {
            phase: Phase::TestSecret,
            step: "read pending",
            source: StoreError::Malformed {
                secret_id: SecretId::new("svc/bot"),
                source,
            },
        };
        assert!(!err.is_retryable());
    }
}
