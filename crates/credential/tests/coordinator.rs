//! Integration tests for the rotation coordinator
//!
//! Each phase is exercised against the in-memory collaborators, including
//! redelivery of the same `(token, phase)` pair.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use common::{CURRENT_KEY, CURRENT_VERSION, ELIGIBLE, Harness, PRINCIPAL, SECRET, credential, request};
use keyturn_credential::core::{
    DirectoryError, IssuedKey, KeyRecord, KeyStatus, StageMap, StoreError, StoredCredential,
    ValidatorError,
};
use keyturn_credential::prelude::*;
use keyturn_credential::rotation::RotationEvent;

fn version(id: &str) -> VersionId {
    VersionId::new(id)
}

#[tokio::test]
async fn test_create_secret_stores_pending_version() {
    // GIVEN: svc/bot with current key K1 and no pending version
    let harness = Harness::with_bot();
    let coordinator = harness.coordinator();

    // WHEN: createSecret runs with token T1
    let outcome = coordinator
        .handle(&request("T1", Phase::CreateSecret))
        .await
        .unwrap();

    // THEN: a new key was issued and stored as version T1 labelled PENDING
    let PhaseOutcome::Created { version: created, key_id } = outcome else {
        panic!("expected Created");
    };
    assert_eq!(created, version("T1"));
    assert!(harness.stages(SECRET).has(&version("T1"), StageLabel::Pending));
    assert!(harness.stages(SECRET).has(&version(CURRENT_VERSION), StageLabel::Current));

    let pending = harness
        .store
        .get_version(&SecretId::new(SECRET), StageLabel::Pending)
        .await
        .unwrap();
    assert_eq!(pending.credential.key_id(), &key_id);
    assert_eq!(pending.credential.principal().as_str(), PRINCIPAL);
    assert_eq!(harness.keys(PRINCIPAL).len(), 2);
}

#[tokio::test]
async fn test_create_secret_twice_issues_one_key() {
    // GIVEN: a first createSecret already ran for T1
    let harness = Harness::with_bot();
    let coordinator = harness.coordinator();
    coordinator
        .handle(&request("T1", Phase::CreateSecret))
        .await
        .unwrap();

    // WHEN: the same phase is delivered again
    let outcome = coordinator
        .handle(&request("T1", Phase::CreateSecret))
        .await
        .unwrap();

    // THEN: nothing new is issued or written
    assert_eq!(outcome, PhaseOutcome::AlreadyPending { version: version("T1") });
    assert_eq!(harness.keys(PRINCIPAL).len(), 2);
    assert_eq!(harness.store.version_count(&SecretId::new(SECRET)), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_create_deliveries_issue_one_key() {
    // GIVEN: one coordinator receiving two deliveries of the same phase at once
    let harness = Harness::with_bot();
    let coordinator = Arc::new(harness.coordinator());

    // WHEN: both run concurrently
    let first = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.handle(&request("T1", Phase::CreateSecret)).await })
    };
    let second = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.handle(&request("T1", Phase::CreateSecret)).await })
    };
    let outcomes = [first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];

    // THEN: exactly one of them issued a key
    let created = outcomes
        .iter()
        .filter(|o| matches!(o, PhaseOutcome::Created { .. }))
        .count();
    assert_eq!(created, 1);
    assert_eq!(harness.keys(PRINCIPAL).len(), 2);
}

#[tokio::test]
async fn test_create_secret_blocked_by_key_quota() {
    // GIVEN: the principal already holds two active keys
    let harness = Harness::with_bot();
    harness.seed_key(PRINCIPAL, "K0", KeyStatus::Active, None);

    // WHEN: createSecret runs
    let err = harness
        .coordinator()
        .handle(&request("T1", Phase::CreateSecret))
        .await
        .unwrap_err();

    // THEN: the cycle is blocked and nothing was created
    assert!(matches!(err, RotationError::QuotaExhausted { .. }));
    assert!(!err.is_retryable());
    assert!(err.to_string().starts_with("createSecret: rotation blocked: key quota exhausted"));
    assert_eq!(harness.keys(PRINCIPAL).len(), 2);
    assert!(harness.stages(SECRET).holders(StageLabel::Pending).is_empty());
}

#[tokio::test]
async fn test_directory_quota_answer_maps_to_quota_exhausted() {
    // GIVEN: a directory that allows a single key while the coordinator allows two
    let mut harness = Harness::with_bot();
    harness.config.max_keys_per_principal = 3;
    let directory = Arc::new(MemoryIdentityDirectory::with_max_keys(1));
    directory.seed_key(PRINCIPAL, CURRENT_KEY, "K1-secret", KeyStatus::Active, None);
    let services = Services::new(
        Arc::clone(&harness.store) as Arc<dyn SecretStore>,
        directory as Arc<dyn IdentityDirectory>,
        Arc::clone(&harness.validator) as Arc<dyn CredentialValidator>,
    );
    let coordinator = RotationCoordinator::new(Arc::new(services), harness.config.clone());

    // WHEN: createSecret runs
    let err = coordinator
        .handle(&request("T1", Phase::CreateSecret))
        .await
        .unwrap_err();

    // THEN: the directory refusal surfaces as the same fatal quota error
    assert!(matches!(err, RotationError::QuotaExhausted { ref principal, .. } if principal.as_str() == PRINCIPAL));
}

#[tokio::test]
async fn test_create_secret_for_written_version_issues_nothing() {
    // GIVEN: version T1 already written by an earlier delivery, with its label moved away
    let harness = Harness::with_bot();
    harness.store.insert_raw(
        SECRET,
        "T1",
        credential("K9", PRINCIPAL).to_json().unwrap(),
        &[],
        ELIGIBLE,
    );

    // WHEN: createSecret runs for T1
    let outcome = harness
        .coordinator()
        .handle(&request("T1", Phase::CreateSecret))
        .await
        .unwrap();

    // THEN: it succeeds without issuing a key
    assert_eq!(outcome, PhaseOutcome::AlreadyWritten { version: version("T1") });
    assert_eq!(harness.key_ids(PRINCIPAL), vec![CURRENT_KEY.to_owned()]);
}

#[tokio::test]
async fn test_create_secret_after_completed_cycle_succeeds() {
    // GIVEN: a full cycle for T1 left the principal at its key quota
    let harness = Harness::with_bot();
    let coordinator = harness.coordinator();
    for phase in [Phase::CreateSecret, Phase::SetSecret, Phase::TestSecret, Phase::FinishSecret] {
        coordinator.handle(&request("T1", phase)).await.unwrap();
    }
    assert_eq!(harness.keys(PRINCIPAL).len(), 2);

    // WHEN: createSecret for T1 is delivered again
    let outcome = coordinator
        .handle(&request("T1", Phase::CreateSecret))
        .await
        .unwrap();

    // THEN: it is a no-op success and T1 stays current
    assert_eq!(outcome, PhaseOutcome::AlreadyWritten { version: version("T1") });
    assert_eq!(harness.keys(PRINCIPAL).len(), 2);
    assert_eq!(harness.stages(SECRET).holders(StageLabel::Current), vec![&version("T1")]);
}

#[tokio::test]
async fn test_concurrent_write_revokes_new_key() {
    // GIVEN: T1 is stored, but the stage listing was taken before it landed
    let harness = Harness::with_bot();
    harness.store.insert_raw(
        SECRET,
        "T1",
        credential("K9", PRINCIPAL).to_json().unwrap(),
        &[],
        ELIGIBLE,
    );
    let store = ScriptedStore::new(&harness, [StageMap::new()]);
    let coordinator = harness.coordinator_with_store(store);

    // WHEN: createSecret runs for T1
    let outcome = coordinator
        .handle(&request("T1", Phase::CreateSecret))
        .await
        .unwrap();

    // THEN: the write collides and the key it issued no longer holds a quota slot
    let PhaseOutcome::DuplicateDelivery { revoked, .. } = outcome else {
        panic!("expected DuplicateDelivery");
    };
    assert_eq!(harness.status(revoked.as_str()), None);
    assert_eq!(harness.key_ids(PRINCIPAL), vec![CURRENT_KEY.to_owned()]);
}

#[tokio::test]
async fn test_failed_write_revokes_new_key() {
    // GIVEN: the store rejects writes
    let harness = Harness::with_bot();
    harness.store.fail_operation("put version");

    // WHEN: createSecret runs
    let err = harness
        .coordinator()
        .handle(&request("T1", Phase::CreateSecret))
        .await
        .unwrap_err();

    // THEN: the failure is wrapped, retryable, and the orphaned key is gone
    assert!(matches!(
        err,
        RotationError::Store {
            step: "write pending version",
            source: StoreError::Backend { .. },
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(harness.key_ids(PRINCIPAL), vec![CURRENT_KEY.to_owned()]);
}

#[tokio::test]
async fn test_create_secret_surfaces_read_failure() {
    // GIVEN: reads fail for a reason other than a missing stage
    let harness = Harness::with_bot();
    harness.store.fail_operation("get version");

    // WHEN: createSecret runs
    let err = harness
        .coordinator()
        .handle(&request("T1", Phase::CreateSecret))
        .await
        .unwrap_err();

    // THEN: the read failure is not mistaken for "no pending version"
    assert!(matches!(err, RotationError::Store { step: "read pending version", .. }));
    assert_eq!(harness.keys(PRINCIPAL).len(), 1);
}

#[tokio::test]
async fn test_set_secret_is_noop() {
    let harness = Harness::with_bot();

    let outcome = harness
        .coordinator()
        .handle(&request("T1", Phase::SetSecret))
        .await
        .unwrap();

    assert_eq!(outcome, PhaseOutcome::NothingToInstall);
}

#[tokio::test]
async fn test_test_secret_validates_pending_key() {
    // GIVEN: a pending version created by createSecret
    let harness = Harness::with_bot();
    let coordinator = harness.coordinator();
    coordinator
        .handle(&request("T1", Phase::CreateSecret))
        .await
        .unwrap();

    // WHEN: testSecret runs
    let outcome = coordinator
        .handle(&request("T1", Phase::TestSecret))
        .await
        .unwrap();

    // THEN: the pending key authenticated and its use was recorded
    let PhaseOutcome::Validated { version: tested, key_id, .. } = outcome else {
        panic!("expected Validated");
    };
    assert_eq!(tested, version("T1"));
    assert_eq!(
        harness.directory.last_used(&key_id).await.unwrap(),
        Some(harness.clock.now())
    );
}

#[tokio::test]
async fn test_test_secret_rejection_is_retryable() {
    // GIVEN: the target service refuses the new key
    let harness = Harness::with_bot();
    let coordinator = harness.coordinator();
    let PhaseOutcome::Created { key_id, .. } = coordinator
        .handle(&request("T1", Phase::CreateSecret))
        .await
        .unwrap()
    else {
        panic!("expected Created");
    };
    harness.validator.reject(key_id.clone());

    // WHEN: testSecret runs
    let err = coordinator
        .handle(&request("T1", Phase::TestSecret))
        .await
        .unwrap_err();

    // THEN: the phase fails with a retryable validation error
    assert!(matches!(
        err,
        RotationError::Validation { source: ValidatorError::Rejected { .. }, .. }
    ));
    assert!(err.is_retryable());
    assert!(err.to_string().starts_with("testSecret: validation of key"));
}

#[tokio::test]
async fn test_test_secret_without_pending_is_fatal() {
    let harness = Harness::with_bot();

    let err = harness
        .coordinator()
        .handle(&request("T1", Phase::TestSecret))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RotationError::MissingStage { label: StageLabel::Pending, .. }
    ));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_finish_secret_promotes_pending_version() {
    // GIVEN: a created and tested pending version
    let harness = Harness::with_bot();
    let coordinator = harness.coordinator();
    for phase in [Phase::CreateSecret, Phase::SetSecret, Phase::TestSecret] {
        coordinator.handle(&request("T1", phase)).await.unwrap();
    }

    // WHEN: finishSecret runs
    let outcome = coordinator
        .handle(&request("T1", Phase::FinishSecret))
        .await
        .unwrap();

    // THEN: T1 is current, nothing is pending and v0 is retained as previous
    assert_eq!(
        outcome,
        PhaseOutcome::Promoted {
            version: version("T1"),
            previous: version(CURRENT_VERSION),
        }
    );
    let stages = harness.stages(SECRET);
    assert_eq!(stages.holders(StageLabel::Current), vec![&version("T1")]);
    assert!(stages.holders(StageLabel::Pending).is_empty());
    assert_eq!(stages.holders(StageLabel::Previous), vec![&version(CURRENT_VERSION)]);
}

#[tokio::test]
async fn test_finish_secret_redelivery_succeeds() {
    // GIVEN: a completed promotion
    let harness = Harness::with_bot();
    let coordinator = harness.coordinator();
    for phase in [Phase::CreateSecret, Phase::TestSecret, Phase::FinishSecret] {
        coordinator.handle(&request("T1", phase)).await.unwrap();
    }

    // WHEN: finishSecret is delivered again
    let outcome = coordinator
        .handle(&request("T1", Phase::FinishSecret))
        .await
        .unwrap();

    // THEN: it is a no-op success
    assert_eq!(outcome, PhaseOutcome::AlreadyPromoted { version: version("T1") });
    assert_eq!(
        harness.stages(SECRET).holders(StageLabel::Previous),
        vec![&version(CURRENT_VERSION)]
    );
}

#[tokio::test]
async fn test_finish_secret_completes_partial_promotion() {
    // GIVEN: CURRENT already moved to T1 but PENDING was never cleared
    let harness = Harness::with_bot();
    let coordinator = harness.coordinator();
    coordinator
        .handle(&request("T1", Phase::CreateSecret))
        .await
        .unwrap();
    harness
        .store
        .move_stage(
            &SecretId::new(SECRET),
            StageLabel::Current,
            Some(&version(CURRENT_VERSION)),
            Some(&version("T1")),
        )
        .await
        .unwrap();

    // WHEN: finishSecret is redelivered
    let outcome = coordinator
        .handle(&request("T1", Phase::FinishSecret))
        .await
        .unwrap();

    // THEN: only the leftover pending label is removed
    assert_eq!(
        outcome,
        PhaseOutcome::CompletedPartialPromotion { version: version("T1") }
    );
    let stages = harness.stages(SECRET);
    assert_eq!(stages.labels(&version("T1")).collect::<Vec<_>>(), vec![StageLabel::Current]);
    assert_eq!(stages.holders(StageLabel::Previous), vec![&version(CURRENT_VERSION)]);
}

#[tokio::test]
async fn test_finish_secret_label_in_transition_is_retryable() {
    // GIVEN: CURRENT observed on two versions at once
    let harness = Harness::with_bot();
    harness.store.insert_raw(
        SECRET,
        "T1",
        credential("K2", PRINCIPAL).to_json().unwrap(),
        &[StageLabel::Current, StageLabel::Pending],
        ELIGIBLE,
    );

    // WHEN: finishSecret runs
    let err = harness
        .coordinator()
        .handle(&request("T1", Phase::FinishSecret))
        .await
        .unwrap_err();

    // THEN: the host is told to retry
    let RotationError::StageInTransition { label, holders, .. } = &err else {
        panic!("expected StageInTransition, got {err:?}");
    };
    assert_eq!(*label, StageLabel::Current);
    assert_eq!(holders.len(), 2);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_finish_secret_settles_brief_label_overlap() {
    // GIVEN: a tested T1, and a first stage listing that catches CURRENT on two versions
    let harness = Harness::with_bot();
    let coordinator = harness.coordinator();
    for phase in [Phase::CreateSecret, Phase::TestSecret] {
        coordinator.handle(&request("T1", phase)).await.unwrap();
    }
    let overlap: StageMap = [
        (version(CURRENT_VERSION), StageLabel::Current),
        (version("T1"), StageLabel::Current),
        (version("T1"), StageLabel::Pending),
    ]
    .into_iter()
    .collect();
    let store = ScriptedStore::new(&harness, [overlap]);

    // WHEN: finishSecret runs
    let outcome = harness
        .coordinator_with_store(store)
        .handle(&request("T1", Phase::FinishSecret))
        .await
        .unwrap();

    // THEN: the second listing is settled and the promotion goes through
    assert_eq!(
        outcome,
        PhaseOutcome::Promoted {
            version: version("T1"),
            previous: version(CURRENT_VERSION),
        }
    );
}

#[tokio::test]
async fn test_finish_secret_without_pending_is_fatal() {
    let harness = Harness::with_bot();

    let err = harness
        .coordinator()
        .handle(&request("T9", Phase::FinishSecret))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RotationError::MissingStage { label: StageLabel::Pending, .. }
    ));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_transient_store_failure_is_phase_prefixed() {
    let harness = Harness::with_bot();
    harness.store.fail_operation("describe stages");

    let err = harness
        .coordinator()
        .handle(&request("T1", Phase::FinishSecret))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(err.phase(), Some(Phase::FinishSecret));
    assert!(err.to_string().starts_with("finishSecret: describe stages:"));
}

/// Store that answers `describe_stages` from a script before delegating.
struct ScriptedStore {
    inner: Arc<MemorySecretStore>,
    describes: Mutex<VecDeque<StageMap>>,
}

impl ScriptedStore {
    fn new(harness: &Harness, describes: impl IntoIterator<Item = StageMap>) -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::clone(&harness.store),
            describes: Mutex::new(describes.into_iter().collect()),
        })
    }
}

#[async_trait]
impl SecretStore for ScriptedStore {
    async fn get_version(&self, secret_id: &SecretId, label: StageLabel) -> Result<StoredCredential, StoreError> {
        self.inner.get_version(secret_id, label).await
    }

    async fn put_version(
        &self,
        secret_id: &SecretId,
        token: &VersionId,
        credential: &Credential,
        label: StageLabel,
    ) -> Result<(), StoreError> {
        self.inner.put_version(secret_id, token, credential, label).await
    }

    async fn describe_stages(&self, secret_id: &SecretId) -> Result<StageMap, StoreError> {
        let scripted = self.describes.lock().pop_front();
        match scripted {
            Some(stages) => Ok(stages),
            None => self.inner.describe_stages(secret_id).await,
        }
    }

    async fn move_stage(
        &self,
        secret_id: &SecretId,
        label: StageLabel,
        from: Option<&VersionId>,
        to: Option<&VersionId>,
    ) -> Result<(), StoreError> {
        self.inner.move_stage(secret_id, label, from, to).await
    }

    async fn list_eligible(&self, tag: &EligibilityTag) -> Result<Vec<SecretId>, StoreError> {
        self.inner.list_eligible(tag).await
    }
}

/// Directory whose calls never complete.
struct StalledDirectory;

#[async_trait]
impl IdentityDirectory for StalledDirectory {
    async fn create_key(&self, _: &Principal) -> Result<IssuedKey, DirectoryError> {
        std::future::pending().await
    }

    async fn list_keys(&self, _: &Principal) -> Result<Vec<KeyRecord>, DirectoryError> {
        std::future::pending().await
    }

    async fn delete_key(&self, _: &Principal, _: &KeyId) -> Result<(), DirectoryError> {
        std::future::pending().await
    }

    async fn set_key_status(&self, _: &Principal, _: &KeyId, _: KeyStatus) -> Result<(), DirectoryError> {
        std::future::pending().await
    }

    async fn last_used(&self, _: &KeyId) -> Result<Option<DateTime<Utc>>, DirectoryError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_stalled_directory_times_out() {
    // GIVEN: a directory that never answers and a 5s call timeout
    let mut harness = Harness::with_bot();
    harness.config.call_timeout = Duration::from_secs(5);
    let services = Services::new(
        Arc::clone(&harness.store) as Arc<dyn SecretStore>,
        Arc::new(StalledDirectory),
        Arc::clone(&harness.validator) as Arc<dyn CredentialValidator>,
    );
    let coordinator = RotationCoordinator::new(Arc::new(services), harness.config.clone());

    // WHEN: createSecret runs
    let err = coordinator
        .handle(&request("T1", Phase::CreateSecret))
        .await
        .unwrap_err();

    // THEN: the call is abandoned with a retryable timeout
    assert!(matches!(
        err,
        RotationError::Directory {
            step: "list keys",
            source: DirectoryError::Timeout { .. },
            ..
        }
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unknown_step_is_rejected() {
    let event = RotationEvent {
        client_request_token: "T1".into(),
        secret_id: SECRET.into(),
        step: "rollbackSecret".into(),
    };

    let err = RotationRequest::try_from(event).unwrap_err();

    assert!(matches!(err, RotationError::UnknownPhase { .. }));
    assert_eq!(err.phase(), None);
}
