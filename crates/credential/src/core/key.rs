//! Identity-directory key records

use serde::{Deserialize, Serialize};
use std::fmt;

use super::credential::KeySecret;
use super::id::KeyId;

/// Status of an access key in the identity directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyStatus {
    /// Key authenticates requests.
    Active,
    /// Key is disabled and will be deleted by the next reaper sweep.
    Inactive,
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("Active"),
            Self::Inactive => f.write_str("Inactive"),
        }
    }
}

/// One key as listed for a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Access key identifier.
    pub key_id: KeyId,
    /// Current status.
    pub status: KeyStatus,
}

impl KeyRecord {
    /// Creates a key record.
    pub fn new(key_id: KeyId, status: KeyStatus) -> Self {
        Self { key_id, status }
    }

    /// Returns `true` if the key is active.
    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }
}

/// Freshly issued key pair, returned once by the directory.
#[derive(Debug, Clone)]
pub struct IssuedKey {
    /// Access key identifier.
    pub key_id: KeyId,
    /// Secret access key. The directory never returns it again.
    pub secret: KeySecret,
}
