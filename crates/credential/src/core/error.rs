//! Error types for the external collaborators
//!
//! Each external seam has its own error enum:
//! - [`StoreError`]: secret store reads, writes and label moves
//! - [`DirectoryError`]: identity-directory key management
//! - [`ValidatorError`]: proving a credential against the target service
//!
//! The rotation and reaper layers wrap these with the phase or step that
//! issued the call.

use std::time::Duration;

use thiserror::Error;

use super::id::{KeyId, Principal, SecretId, VersionId};
use super::stage::StageLabel;

/// Secret store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Secret does not exist.
    #[error("secret '{secret_id}' not found")]
    SecretNotFound {
        /// Secret that was looked up
        secret_id: SecretId,
    },

    /// No version of the secret carries the requested label.
    #[error("secret '{secret_id}' has no {label} version")]
    StageNotFound {
        /// Secret that was looked up
        secret_id: SecretId,
        /// Label that was requested
        label: StageLabel,
    },

    /// A version with this id already exists.
    #[error("version '{version}' of secret '{secret_id}' already exists")]
    VersionExists {
        /// Secret that was written
        secret_id: SecretId,
        /// Version id (idempotency token) that collided
        version: VersionId,
    },

    /// Stored value is not a valid credential document.
    #[error("secret '{secret_id}' holds a malformed credential: {source}")]
    Malformed {
        /// Secret that was decoded
        secret_id: SecretId,
        /// Decoding failure
        #[source]
        source: serde_json::Error,
    },

    /// Call did not complete in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Store operation
        operation: &'static str,
        /// Configured limit
        after: Duration,
    },

    /// Any other backend failure (network, throttling, permissions).
    #[error("{operation} failed: {message}")]
    Backend {
        /// Store operation
        operation: &'static str,
        /// Backend message
        message: String,
    },
}

impl StoreError {
    /// Returns `true` if the error only says "nothing carries that label".
    pub fn is_stage_not_found(&self) -> bool {
        matches!(self, Self::StageNotFound { .. })
    }

    /// Returns `true` if re-running the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Backend { .. })
    }
}

/// Identity-directory errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Principal already holds the maximum number of keys.
    #[error("principal '{principal}' already holds the maximum number of keys")]
    QuotaExceeded {
        /// Principal whose quota is exhausted
        principal: Principal,
    },

    /// Principal does not exist.
    #[error("principal '{principal}' not found")]
    PrincipalNotFound {
        /// Principal that was looked up
        principal: Principal,
    },

    /// Key does not exist.
    #[error("key '{key_id}' not found")]
    KeyNotFound {
        /// Key that was looked up
        key_id: KeyId,
    },

    /// Call did not complete in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Directory operation
        operation: &'static str,
        /// Configured limit
        after: Duration,
    },

    /// Any other backend failure.
    #[error("{operation} failed: {message}")]
    Backend {
        /// Directory operation
        operation: &'static str,
        /// Backend message
        message: String,
    },
}

impl DirectoryError {
    /// Returns `true` if re-running the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Backend { .. })
    }
}

/// Validator errors.
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// Target service refused the credential.
    #[error("target service rejected key '{key_id}': {reason}")]
    Rejected {
        /// Key that was exercised
        key_id: KeyId,
        /// Reason reported by the target service
        reason: String,
    },

    /// Validation did not complete in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Validation step
        operation: &'static str,
        /// Configured limit
        after: Duration,
    },

    /// Validator could not reach the target service.
    #[error("{operation} failed: {message}")]
    Backend {
        /// Validation step
        operation: &'static str,
        /// Backend message
        message: String,
    },
}

/// Errors that can represent an expired call deadline.
pub(crate) trait DeadlineExceeded {
    fn deadline_exceeded(operation: &'static str, after: Duration) -> Self;
}

impl DeadlineExceeded for StoreError {
    fn deadline_exceeded(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }
}

impl DeadlineExceeded for DirectoryError {
    fn deadline_exceeded(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }
}

impl DeadlineExceeded for ValidatorError {
    fn deadline_exceeded(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }
}
