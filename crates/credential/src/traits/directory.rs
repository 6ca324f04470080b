//! Identity directory contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::{DirectoryError, IssuedKey, KeyId, KeyRecord, KeyStatus, Principal};

/// Issues, lists and retires access keys for principals.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Issues a new active key for `principal`.
    ///
    /// Returns [`DirectoryError::QuotaExceeded`] when the principal already
    /// holds the maximum number of keys.
    async fn create_key(&self, principal: &Principal) -> Result<IssuedKey, DirectoryError>;

    /// Lists all keys of `principal`, active or not.
    async fn list_keys(&self, principal: &Principal) -> Result<Vec<KeyRecord>, DirectoryError>;

    /// Deletes a key outright.
    async fn delete_key(&self, principal: &Principal, key_id: &KeyId) -> Result<(), DirectoryError>;

    /// Flips a key between active and inactive.
    async fn set_key_status(
        &self,
        principal: &Principal,
        key_id: &KeyId,
        status: KeyStatus,
    ) -> Result<(), DirectoryError>;

    /// When the key last authenticated a request, `None` if never.
    async fn last_used(&self, key_id: &KeyId) -> Result<Option<DateTime<Utc>>, DirectoryError>;
}
