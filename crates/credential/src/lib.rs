//! Keyturn Credential - access key rotation and cleanup
//!
//! Rotates the access key stored in a versioned secret and retires the key it
//! replaced once nobody uses it anymore.
//!
//! # Components
//!
//! - **[`RotationCoordinator`]** - runs the four rotation phases
//!   (`createSecret`, `setSecret`, `testSecret`, `finishSecret`), each safe to
//!   redeliver
//! - **[`Reaper`]** - deactivates idle previous keys and deletes inactive ones
//! - **[`ValidationSweep`]** - advisory liveness check of every current key
//!
//! All three talk to the outside world only through the traits in
//! [`traits`], bundled in [`Services`]. The [`providers`] module ships
//! in-memory implementations and, behind the `aws` feature, Secrets Manager,
//! IAM and S3 ones.
#![forbid(unsafe_code)]

/// Configuration for rotation and cleanup
pub mod config;
/// Identifiers, credentials, stage labels and collaborator errors
pub mod core;
/// Collaborator implementations
pub mod providers;
/// Previous-key demotion and inactive-key purge
pub mod reaper;
/// Rotation phases and the coordinator
pub mod rotation;
/// Collaborator bundle
pub mod services;
/// Seams to the secret store, identity directory and validator
pub mod traits;
/// Advisory validation sweep
pub mod validation;

// ── Root re-exports ─────────────────────────────────────────────────────────
// Commonly-used types available directly as `keyturn_credential::TypeName`.

pub use crate::config::{ConfigError, RotationConfig, ValidationTarget};
pub use crate::core::{
    Clock, Credential, DirectoryError, KeyId, KeySecret, ManualClock, Principal, SecretId,
    StageLabel, StoreError, SystemClock, ValidatorError, VersionId,
};
pub use crate::reaper::{ReapError, Reaper, SweepReport};
pub use crate::rotation::{
    Phase, PhaseOutcome, RotationCoordinator, RotationError, RotationEvent, RotationRequest,
    RotationResult,
};
pub use crate::services::Services;
pub use crate::validation::{SmokeReport, ValidationSweep};

/// Commonly used types and traits
pub mod prelude {
    pub use crate::config::RotationConfig;
    pub use crate::core::{
        Clock, Credential, KeyId, KeySecret, KeyStatus, Principal, SecretId, StageLabel,
        VersionId,
    };
    pub use crate::providers::{MemoryIdentityDirectory, MemorySecretStore, MemoryValidator};
    pub use crate::reaper::{Demotion, Reaper};
    pub use crate::rotation::{Phase, PhaseOutcome, RotationCoordinator, RotationError, RotationRequest};
    pub use crate::services::Services;
    pub use crate::traits::{CredentialValidator, EligibilityTag, IdentityDirectory, SecretStore};
    pub use crate::validation::ValidationSweep;

    #[cfg(feature = "aws")]
    pub use crate::providers::{AwsConfig, AwsServices};
}
