//! Reaper results

use serde::Serialize;
use std::time::Duration;

use crate::core::{KeyId, Principal, SecretId};

/// What happened to the previous-version key of a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Demotion {
    /// The secret has no previous version.
    NoPreviousVersion,
    /// The key is no longer listed for the principal.
    AlreadyRemoved { key_id: KeyId },
    /// The previous version holds the current key.
    SameAsCurrent { key_id: KeyId },
    /// The key has never authenticated a request and stays active.
    NeverUsed { key_id: KeyId },
    /// The key was used recently and stays active.
    WithinGrace {
        key_id: KeyId,
        #[serde(with = "humantime_serde")]
        idle: Duration,
    },
    /// The key was set inactive.
    Deactivated {
        key_id: KeyId,
        #[serde(with = "humantime_serde")]
        idle: Duration,
    },
}

/// Result of reaping one secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretReport {
    pub secret_id: SecretId,
    pub principal: Principal,
    /// Inactive keys deleted by the purge pass.
    pub purged: Vec<KeyId>,
    pub demotion: Option<Demotion>,
}

/// A secret the sweep could not reap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub secret_id: SecretId,
    pub error: String,
}

/// Result of a full sweep, ordered by secret id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub secrets: Vec<SecretReport>,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    /// Returns `true` if every secret was reaped.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Report entry for `secret_id`, if it was reaped.
    pub fn secret(&self, secret_id: &SecretId) -> Option<&SecretReport> {
        self.secrets.iter().find(|s| &s.secret_id == secret_id)
    }

    pub(crate) fn sort(&mut self) {
        self.secrets.sort_by(|a, b| a.secret_id.cmp(&b.secret_id));
        self.failures.sort_by(|a, b| a.secret_id.cmp(&b.secret_id));
    }
}
