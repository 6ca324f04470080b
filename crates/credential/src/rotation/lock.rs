//! In-process advisory lock per secret

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core::SecretId;

/// Serialises phase calls for the same secret within one process.
///
/// Cross-process safety still comes from the idempotency checks in each
/// phase; this only removes the in-process race between two deliveries.
#[derive(Debug, Default)]
pub struct SecretLocks {
    locks: DashMap<SecretId, Arc<Mutex<()>>>,
}

impl SecretLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and takes the lock of `secret_id`.
    ///
    /// The entry is dropped from the table with the last guard or waiter.
    pub async fn acquire(&self, secret_id: &SecretId) -> SecretGuard<'_> {
        let lock = self
            .locks
            .entry(secret_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        SecretGuard {
            guard: Some(lock.lock_owned().await),
            locks: &self.locks,
            secret_id: secret_id.clone(),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Holds the lock of one secret until dropped.
#[derive(Debug)]
pub struct SecretGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a DashMap<SecretId, Arc<Mutex<()>>>,
    secret_id: SecretId,
}

impl Drop for SecretGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold a clone of the Arc, so the entry survives while anyone queues on it.
        self.locks
            .remove_if(&self.secret_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
