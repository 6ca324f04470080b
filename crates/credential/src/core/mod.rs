//! Core types shared by the coordinator, reaper and backends

mod clock;
mod credential;
pub(crate) mod deadline;
mod error;
mod id;
mod key;
mod stage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::{Credential, KeySecret, StoredCredential};
pub use error::{DirectoryError, StoreError, ValidatorError};
pub use id::{KeyId, Principal, SecretId, VersionId};
pub use key::{IssuedKey, KeyRecord, KeyStatus};
pub use stage::{StageConflict, StageLabel, StageMap, UnknownStageLabel};
