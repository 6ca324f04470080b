//! In-memory collaborators
//!
//! Behave like the AWS services they stand in for, including the
//! `PREVIOUS` retention rule of the secret store and the per-principal key
//! quota of the directory. Used by tests and dry runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::core::{
    Clock, Credential, DirectoryError, IssuedKey, KeyId, KeySecret, KeyRecord, KeyStatus, Principal,
    SecretId, StageLabel, StageMap, StoreError, StoredCredential, ValidatorError, VersionId,
};
use crate::traits::{
    CredentialValidator, EligibilityTag, IdentityDirectory, SecretStore, ValidationReport,
};

/// Operations that can be made to fail on demand.
#[derive(Debug, Default)]
struct Faults(Mutex<HashSet<&'static str>>);

impl Faults {
    fn insert(&self, operation: &'static str) {
        self.0.lock().insert(operation);
    }

    fn clear(&self) {
        self.0.lock().clear();
    }

    fn check(&self, operation: &'static str) -> Option<String> {
        self.0
            .lock()
            .contains(operation)
            .then(|| format!("injected failure for {operation}"))
    }
}

// ── Secret store ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct StoredVersion {
    value: String,
    labels: BTreeSet<StageLabel>,
}

#[derive(Debug, Default)]
struct StoredSecret {
    tags: HashMap<String, String>,
    versions: BTreeMap<VersionId, StoredVersion>,
}

impl StoredSecret {
    fn holder(&self, label: StageLabel) -> Option<&VersionId> {
        self.versions
            .iter()
            .find(|(_, v)| v.labels.contains(&label))
            .map(|(id, _)| id)
    }

    fn detach(&mut self, label: StageLabel) {
        for version in self.versions.values_mut() {
            version.labels.remove(&label);
        }
    }

    /// Attaches `label` to `version` only, keeping the displaced current
    /// version as previous.
    fn attach(&mut self, label: StageLabel, version: &VersionId) {
        if label == StageLabel::Current {
            if let Some(displaced) = self.holder(StageLabel::Current).cloned() {
                if &displaced != version {
                    self.detach(StageLabel::Previous);
                    if let Some(v) = self.versions.get_mut(&displaced) {
                        v.labels.insert(StageLabel::Previous);
                    }
                }
            }
        }

        self.detach(label);
        if let Some(v) = self.versions.get_mut(version) {
            v.labels.insert(label);
        }
    }

    fn stage_map(&self) -> StageMap {
        let mut map = StageMap::new();
        for (id, version) in &self.versions {
            map.insert_unlabelled(id.clone());
            for label in &version.labels {
                map.insert(id.clone(), *label);
            }
        }
        map
    }
}

/// In-memory [`SecretStore`].
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: RwLock<BTreeMap<SecretId, StoredSecret>>,
    faults: Faults,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a secret with `credential` as its current version.
    pub fn insert_secret(
        &self,
        secret_id: impl Into<SecretId>,
        version: impl Into<VersionId>,
        credential: &Credential,
        tags: &[(&str, &str)],
    ) -> Result<(), serde_json::Error> {
        let value = credential.to_json()?;
        self.insert_raw(secret_id, version, value, &[StageLabel::Current], tags);
        Ok(())
    }

    /// Seeds a version with an arbitrary value and labels.
    ///
    /// Labels are added without removing them from other versions, which
    /// allows reproducing a label caught mid-move.
    pub fn insert_raw(
        &self,
        secret_id: impl Into<SecretId>,
        version: impl Into<VersionId>,
        value: impl Into<String>,
        labels: &[StageLabel],
        tags: &[(&str, &str)],
    ) {
        let mut secrets = self.secrets.write();
        let secret = secrets.entry(secret_id.into()).or_default();
        for (key, value) in tags {
            secret.tags.insert((*key).to_owned(), (*value).to_owned());
        }
        secret.versions.insert(
            version.into(),
            StoredVersion {
                value: value.into(),
                labels: labels.iter().copied().collect(),
            },
        );
    }

    /// Current version → labels map, `None` if the secret does not exist.
    pub fn stages(&self, secret_id: &SecretId) -> Option<StageMap> {
        self.secrets.read().get(secret_id).map(StoredSecret::stage_map)
    }

    /// Number of versions stored for the secret.
    pub fn version_count(&self, secret_id: &SecretId) -> usize {
        self.secrets
            .read()
            .get(secret_id)
            .map_or(0, |s| s.versions.len())
    }

    /// Makes every later call of `operation` fail with a backend error.
    ///
    /// Operations: `get version`, `put version`, `describe stages`,
    /// `move stage`, `list eligible`.
    pub fn fail_operation(&self, operation: &'static str) {
        self.faults.insert(operation);
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        self.faults.clear();
    }

    fn fault(&self, operation: &'static str) -> Result<(), StoreError> {
        match self.faults.check(operation) {
            Some(message) => Err(StoreError::Backend { operation, message }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get_version(
        &self,
        secret_id: &SecretId,
        label: StageLabel,
    ) -> Result<StoredCredential, StoreError> {
        self.fault("get version")?;

        let secrets = self.secrets.read();
        let secret = secrets.get(secret_id).ok_or_else(|| StoreError::SecretNotFound {
            secret_id: secret_id.clone(),
        })?;
        let version = secret.holder(label).ok_or_else(|| StoreError::StageNotFound {
            secret_id: secret_id.clone(),
            label,
        })?;

        let value = &secret.versions[version].value;
        let credential = Credential::from_json(value).map_err(|source| StoreError::Malformed {
            secret_id: secret_id.clone(),
            source,
        })?;

        Ok(StoredCredential {
            version: version.clone(),
            credential,
        })
    }

    async fn put_version(
        &self,
        secret_id: &SecretId,
        token: &VersionId,
        credential: &Credential,
        label: StageLabel,
    ) -> Result<(), StoreError> {
        self.fault("put version")?;

        let value = credential.to_json().map_err(|e| StoreError::Backend {
            operation: "put version",
            message: e.to_string(),
        })?;

        let mut secrets = self.secrets.write();
        let secret = secrets.get_mut(secret_id).ok_or_else(|| StoreError::SecretNotFound {
            secret_id: secret_id.clone(),
        })?;

        if secret.versions.contains_key(token) {
            return Err(StoreError::VersionExists {
                secret_id: secret_id.clone(),
                version: token.clone(),
            });
        }

        secret.versions.insert(
            token.clone(),
            StoredVersion {
                value,
                labels: BTreeSet::new(),
            },
        );
        secret.attach(label, token);
        Ok(())
    }

    async fn describe_stages(&self, secret_id: &SecretId) -> Result<StageMap, StoreError> {
        self.fault("describe stages")?;

        self.stages(secret_id).ok_or_else(|| StoreError::SecretNotFound {
            secret_id: secret_id.clone(),
        })
    }

    async fn move_stage(
        &self,
        secret_id: &SecretId,
        label: StageLabel,
        from: Option<&VersionId>,
        to: Option<&VersionId>,
    ) -> Result<(), StoreError> {
        self.fault("move stage")?;

        let mut secrets = self.secrets.write();
        let secret = secrets.get_mut(secret_id).ok_or_else(|| StoreError::SecretNotFound {
            secret_id: secret_id.clone(),
        })?;

        for version in from.into_iter().chain(to) {
            if !secret.versions.contains_key(version) {
                return Err(StoreError::Backend {
                    operation: "move stage",
                    message: format!("version '{version}' does not exist"),
                });
            }
        }

        if let Some(from) = from {
            if !secret.versions[from].labels.contains(&label) {
                return Err(StoreError::Backend {
                    operation: "move stage",
                    message: format!("{label} is not attached to version '{from}'"),
                });
            }
        }

        match to {
            Some(to) => secret.attach(label, to),
            None => {
                if let Some(v) = from.and_then(|from| secret.versions.get_mut(from)) {
                    v.labels.remove(&label);
                }
            }
        }
        Ok(())
    }

    async fn list_eligible(&self, tag: &EligibilityTag) -> Result<Vec<SecretId>, StoreError> {
        self.fault("list eligible")?;

        Ok(self
            .secrets
            .read()
            .iter()
            .filter(|(_, s)| s.tags.iter().any(|(k, v)| tag.matches(k, v)))
            .map(|(id, _)| id.clone())
            .collect())
    }
}

// ── Identity directory ──────────────────────────────────────────────────────

#[derive(Debug)]
struct KeyEntry {
    secret: KeySecret,
    status: KeyStatus,
    last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    principals: HashMap<Principal, BTreeMap<KeyId, KeyEntry>>,
    issued: u64,
}

impl DirectoryState {
    fn entry_mut(&mut self, key_id: &KeyId) -> Option<&mut KeyEntry> {
        self.principals.values_mut().find_map(|keys| keys.get_mut(key_id))
    }

    fn entry(&self, key_id: &KeyId) -> Option<&KeyEntry> {
        self.principals.values().find_map(|keys| keys.get(key_id))
    }
}

/// In-memory [`IdentityDirectory`] with a per-principal key quota.
#[derive(Debug)]
pub struct MemoryIdentityDirectory {
    state: RwLock<DirectoryState>,
    max_keys: usize,
    faults: Faults,
}

impl Default for MemoryIdentityDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityDirectory {
    /// Creates a directory allowing two keys per principal.
    pub fn new() -> Self {
        Self::with_max_keys(2)
    }

    /// Creates a directory with a custom key quota.
    pub fn with_max_keys(max_keys: usize) -> Self {
        Self {
            state: RwLock::new(DirectoryState::default()),
            max_keys,
            faults: Faults::default(),
        }
    }

    /// Registers a principal without keys.
    pub fn add_principal(&self, principal: impl Into<Principal>) {
        self.state.write().principals.entry(principal.into()).or_default();
    }

    /// Seeds a key, registering the principal if needed.
    pub fn seed_key(
        &self,
        principal: impl Into<Principal>,
        key_id: impl Into<KeyId>,
        secret: impl Into<String>,
        status: KeyStatus,
        last_used: Option<DateTime<Utc>>,
    ) {
        self.state
            .write()
            .principals
            .entry(principal.into())
            .or_default()
            .insert(
                key_id.into(),
                KeyEntry {
                    secret: KeySecret::new(secret),
                    status,
                    last_used,
                },
            );
    }

    /// Records that `key_id` authenticated a request at `at`.
    pub fn record_usage(&self, key_id: &KeyId, at: DateTime<Utc>) -> Result<(), DirectoryError> {
        let mut state = self.state.write();
        let entry = state.entry_mut(key_id).ok_or_else(|| DirectoryError::KeyNotFound {
            key_id: key_id.clone(),
        })?;
        entry.last_used = Some(at);
        Ok(())
    }

    /// Status of a key, `None` if it does not exist.
    pub fn key_status(&self, key_id: &KeyId) -> Option<KeyStatus> {
        self.state.read().entry(key_id).map(|e| e.status)
    }

    /// Keys of a principal, ordered by id.
    pub fn keys(&self, principal: &Principal) -> Vec<KeyRecord> {
        self.state
            .read()
            .principals
            .get(principal)
            .map(|keys| {
                keys.iter()
                    .map(|(id, e)| KeyRecord::new(id.clone(), e.status))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Checks a key pair the way the target service would.
    pub fn authenticate(&self, key_id: &KeyId, secret: &KeySecret) -> Result<(), String> {
        let state = self.state.read();
        let entry = state.entry(key_id).ok_or("unknown access key")?;
        if entry.status != KeyStatus::Active {
            return Err("access key is inactive".into());
        }
        if &entry.secret != secret {
            return Err("signature does not match".into());
        }
        Ok(())
    }

    /// Makes every later call of `operation` fail with a backend error.
    ///
    /// Operations: `create key`, `list keys`, `delete key`,
    /// `set key status`, `get last used`.
    pub fn fail_operation(&self, operation: &'static str) {
        self.faults.insert(operation);
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        self.faults.clear();
    }

    fn fault(&self, operation: &'static str) -> Result<(), DirectoryError> {
        match self.faults.check(operation) {
            Some(message) => Err(DirectoryError::Backend { operation, message }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IdentityDirectory for MemoryIdentityDirectory {
    async fn create_key(&self, principal: &Principal) -> Result<IssuedKey, DirectoryError> {
        self.fault("create key")?;

        let mut state = self.state.write();
        let held = state
            .principals
            .get(principal)
            .map(BTreeMap::len)
            .ok_or_else(|| DirectoryError::PrincipalNotFound {
                principal: principal.clone(),
            })?;
        if held >= self.max_keys {
            return Err(DirectoryError::QuotaExceeded {
                principal: principal.clone(),
            });
        }

        state.issued += 1;
        let key_id = KeyId::new(format!("AKIA{:016}", state.issued));
        let secret = KeySecret::new(uuid::Uuid::new_v4().simple().to_string());
        state.principals.entry(principal.clone()).or_default().insert(
            key_id.clone(),
            KeyEntry {
                secret: secret.clone(),
                status: KeyStatus::Active,
                last_used: None,
            },
        );

        Ok(IssuedKey { key_id, secret })
    }

    async fn list_keys(&self, principal: &Principal) -> Result<Vec<KeyRecord>, DirectoryError> {
        self.fault("list keys")?;

        if !self.state.read().principals.contains_key(principal) {
            return Err(DirectoryError::PrincipalNotFound {
                principal: principal.clone(),
            });
        }
        Ok(self.keys(principal))
    }

    async fn delete_key(&self, principal: &Principal, key_id: &KeyId) -> Result<(), DirectoryError> {
        self.fault("delete key")?;

        let mut state = self.state.write();
        let keys = state
            .principals
            .get_mut(principal)
            .ok_or_else(|| DirectoryError::PrincipalNotFound {
                principal: principal.clone(),
            })?;
        keys.remove(key_id)
            .map(|_| ())
            .ok_or_else(|| DirectoryError::KeyNotFound {
                key_id: key_id.clone(),
            })
    }

    async fn set_key_status(
        &self,
        principal: &Principal,
        key_id: &KeyId,
        status: KeyStatus,
    ) -> Result<(), DirectoryError> {
        self.fault("set key status")?;

        let mut state = self.state.write();
        let entry = state
            .principals
            .get_mut(principal)
            .and_then(|keys| keys.get_mut(key_id))
            .ok_or_else(|| DirectoryError::KeyNotFound {
                key_id: key_id.clone(),
            })?;
        entry.status = status;
        Ok(())
    }

    async fn last_used(&self, key_id: &KeyId) -> Result<Option<DateTime<Utc>>, DirectoryError> {
        self.fault("get last used")?;

        self.state
            .read()
            .entry(key_id)
            .map(|e| e.last_used)
            .ok_or_else(|| DirectoryError::KeyNotFound {
                key_id: key_id.clone(),
            })
    }
}

// ── Validator ───────────────────────────────────────────────────────────────

/// In-memory [`CredentialValidator`] backed by a [`MemoryIdentityDirectory`].
///
/// A credential passes when its key exists, is active and the secret
/// matches. A passing check counts as key usage.
#[derive(Clone)]
pub struct MemoryValidator {
    directory: Arc<MemoryIdentityDirectory>,
    clock: Arc<dyn Clock>,
    rejected: Arc<Mutex<HashSet<KeyId>>>,
}

impl MemoryValidator {
    pub fn new(directory: Arc<MemoryIdentityDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            directory,
            clock,
            rejected: Arc::default(),
        }
    }

    /// Makes the target service refuse `key_id` from now on.
    pub fn reject(&self, key_id: impl Into<KeyId>) {
        self.rejected.lock().insert(key_id.into());
    }
}

impl std::fmt::Debug for MemoryValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryValidator")
            .field("rejected", &self.rejected.lock().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialValidator for MemoryValidator {
    async fn validate(&self, credential: &Credential) -> Result<ValidationReport, ValidatorError> {
        let started = Instant::now();
        let key_id = credential.key_id();

        if self.rejected.lock().contains(key_id) {
            return Err(ValidatorError::Rejected {
                key_id: key_id.clone(),
                reason: "access denied".into(),
            });
        }

        self.directory
            .authenticate(key_id, credential.secret())
            .map_err(|reason| ValidatorError::Rejected {
                key_id: key_id.clone(),
                reason,
            })?;

        self.directory
            .record_usage(key_id, self.clock.now())
            .map_err(|e| ValidatorError::Backend {
                operation: "record usage",
                message: e.to_string(),
            })?;

        Ok(ValidationReport::new(
            "memory:authenticate",
            format!("key '{key_id}' authenticated"),
            started.elapsed(),
        ))
    }
}
