//! Shared fixtures for the integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use keyturn_credential::core::{KeyRecord, KeyStatus, ManualClock, StageMap};
use keyturn_credential::prelude::*;

pub const SECRET: &str = "svc/bot";
pub const PRINCIPAL: &str = "svc-bot";
pub const CURRENT_KEY: &str = "K1";
pub const CURRENT_VERSION: &str = "v0";
pub const ELIGIBLE: &[(&str, &str)] = &[("Rotatable", "true")];

/// Fixed start instant so idle times are exact.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
}

pub fn credential(key_id: &str, principal: &str) -> Credential {
    Credential::new(
        KeyId::new(key_id),
        KeySecret::new(format!("{key_id}-secret")),
        Principal::new(principal),
    )
}

/// In-memory collaborators wired into [`Services`] with a manual clock.
pub struct Harness {
    pub store: Arc<MemorySecretStore>,
    pub directory: Arc<MemoryIdentityDirectory>,
    pub validator: Arc<MemoryValidator>,
    pub clock: Arc<ManualClock>,
    pub services: Arc<Services>,
    pub config: RotationConfig,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemorySecretStore::new());
        let directory = Arc::new(MemoryIdentityDirectory::new());
        let clock = Arc::new(ManualClock::new(start()));
        let validator = Arc::new(MemoryValidator::new(
            Arc::clone(&directory),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));

        let services = Services::new(
            Arc::clone(&store) as Arc<dyn SecretStore>,
            Arc::clone(&directory) as Arc<dyn IdentityDirectory>,
            Arc::clone(&validator) as Arc<dyn CredentialValidator>,
        )
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);

        Self {
            store,
            directory,
            validator,
            clock,
            services: Arc::new(services),
            config: RotationConfig::default(),
        }
    }

    /// `svc/bot` holding active key `K1` as its current version, last used 2h ago.
    pub fn with_bot() -> Self {
        let harness = Self::new();
        harness.seed_secret(SECRET, PRINCIPAL, CURRENT_KEY, Some(Duration::hours(2)));
        harness
    }

    /// Seeds an eligible secret whose current version holds an active `key_id`.
    pub fn seed_secret(&self, secret: &str, principal: &str, key_id: &str, idle: Option<Duration>) {
        let credential = credential(key_id, principal);
        self.store
            .insert_secret(secret, CURRENT_VERSION, &credential, ELIGIBLE)
            .unwrap();
        self.seed_key(principal, key_id, KeyStatus::Active, idle);
    }

    /// Seeds a secret that already went through one rotation: `previous_key`
    /// on version `v0` labelled PREVIOUS, `current_key` on `v1` labelled CURRENT.
    pub fn seed_rotated(
        &self,
        secret: &str,
        principal: &str,
        previous_key: &str,
        current_key: &str,
        previous_idle: Option<Duration>,
    ) {
        let previous = credential(previous_key, principal).to_json().unwrap();
        let current = credential(current_key, principal).to_json().unwrap();
        self.store
            .insert_raw(secret, "v0", previous, &[StageLabel::Previous], ELIGIBLE);
        self.store
            .insert_raw(secret, "v1", current, &[StageLabel::Current], ELIGIBLE);

        self.seed_key(principal, previous_key, KeyStatus::Active, previous_idle);
        self.seed_key(principal, current_key, KeyStatus::Active, Some(Duration::minutes(5)));
    }

    /// Seeds a key whose last use lies `idle` before now, `None` if never used.
    pub fn seed_key(&self, principal: &str, key_id: &str, status: KeyStatus, idle: Option<Duration>) {
        let last_used = idle.map(|idle| self.clock.now() - idle);
        self.directory.seed_key(
            principal,
            key_id,
            format!("{key_id}-secret"),
            status,
            last_used,
        );
    }

    pub fn coordinator(&self) -> RotationCoordinator {
        RotationCoordinator::new(Arc::clone(&self.services), self.config.clone())
    }

    /// Coordinator reading and writing through `store` instead of the memory store.
    pub fn coordinator_with_store(&self, store: Arc<dyn SecretStore>) -> RotationCoordinator {
        let services = Services::new(
            store,
            Arc::clone(&self.directory) as Arc<dyn IdentityDirectory>,
            Arc::clone(&self.validator) as Arc<dyn CredentialValidator>,
        )
        .with_clock(Arc::clone(&self.clock) as Arc<dyn Clock>);
        RotationCoordinator::new(Arc::new(services), self.config.clone())
    }

    pub fn reaper(&self) -> Reaper {
        Reaper::new(Arc::clone(&self.services), self.config.clone())
    }

    pub fn sweep(&self) -> ValidationSweep {
        ValidationSweep::new(Arc::clone(&self.services), self.config.clone())
    }

    pub fn stages(&self, secret: &str) -> StageMap {
        self.store.stages(&SecretId::new(secret)).unwrap()
    }

    pub fn keys(&self, principal: &str) -> Vec<KeyRecord> {
        self.directory.keys(&Principal::new(principal))
    }

    pub fn key_ids(&self, principal: &str) -> Vec<String> {
        self.keys(principal)
            .into_iter()
            .map(|k| k.key_id.into_inner())
            .collect()
    }

    pub fn status(&self, key_id: &str) -> Option<KeyStatus> {
        self.directory.key_status(&KeyId::new(key_id))
    }
}

pub fn request(token: &str, phase: Phase) -> RotationRequest {
    RotationRequest::new(SECRET, token, phase)
}
