//! Credential rotation
//!
//! A rotation cycle is four phases delivered by the host scheduler under one
//! idempotency token:
//!
//! 1. `createSecret` issues a key and stores it as the `PENDING` version
//! 2. `setSecret` has nothing to install and succeeds
//! 3. `testSecret` validates the pending credential
//! 4. `finishSecret` moves `CURRENT` to the pending version
//!
//! The store keeps the displaced version as `PREVIOUS`, which the
//! [`Reaper`](crate::reaper::Reaper) later deactivates.

mod coordinator;
mod error;
mod lock;
mod phase;

pub use coordinator::{PhaseOutcome, RotationCoordinator};
pub use error::{RotationError, RotationResult};
pub use lock::{SecretGuard, SecretLocks};
pub use phase::{Phase, RotationEvent, RotationRequest};
