//! Secret store contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{Credential, SecretId, StageLabel, StageMap, StoreError, StoredCredential, VersionId};

/// Tag that marks a secret as in scope for the reaper and validation sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityTag {
    /// Tag key.
    pub key: String,
    /// Required tag value.
    pub value: String,
}

impl EligibilityTag {
    /// Creates a tag selector.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Returns `true` if a secret tagged `key = value` matches.
    pub fn matches(&self, key: &str, value: &str) -> bool {
        self.key == key && self.value == value
    }
}

impl Default for EligibilityTag {
    fn default() -> Self {
        Self::new("Rotatable", "true")
    }
}

/// Versioned secret storage with mutable stage labels.
///
/// # Postconditions
///
/// Moving [`StageLabel::Current`] from version `A` to version `B` must leave
/// `A` labelled [`StageLabel::Previous`], after removing `Previous` from any
/// other version. The coordinator relies on this to keep the superseded
/// credential available to the reaper.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Reads the credential of the version holding `label`.
    ///
    /// Returns [`StoreError::StageNotFound`] when no version holds the label.
    async fn get_version(
        &self,
        secret_id: &SecretId,
        label: StageLabel,
    ) -> Result<StoredCredential, StoreError>;

    /// Writes `credential` as a new version `token` labelled `label`.
    ///
    /// Returns [`StoreError::VersionExists`] when a version with this token
    /// is already stored.
    async fn put_version(
        &self,
        secret_id: &SecretId,
        token: &VersionId,
        credential: &Credential,
        label: StageLabel,
    ) -> Result<(), StoreError>;

    /// Returns the version → labels map of the secret.
    async fn describe_stages(&self, secret_id: &SecretId) -> Result<StageMap, StoreError>;

    /// Moves `label` off `from` and onto `to`.
    ///
    /// With `to` unset the label is only removed from `from`.
    async fn move_stage(
        &self,
        secret_id: &SecretId,
        label: StageLabel,
        from: Option<&VersionId>,
        to: Option<&VersionId>,
    ) -> Result<(), StoreError>;

    /// Lists every secret carrying the eligibility tag.
    async fn list_eligible(&self, tag: &EligibilityTag) -> Result<Vec<SecretId>, StoreError>;
}
