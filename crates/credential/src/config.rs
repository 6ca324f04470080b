//! Rotation and cleanup configuration
//!
//! Values are supplied once at startup (file, environment or CLI flags) and
//! are not reloaded while a handler runs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::traits::EligibilityTag;

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Missing required configuration
    #[error("Missing required configuration: {field}")]
    MissingRequired { field: String },
}

/// Resource the validator reads to prove a credential is live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationTarget {
    /// Bucket holding the probe object.
    pub bucket: String,
    /// Key of the probe object.
    pub object: String,
}

impl Default for ValidationTarget {
    fn default() -> Self {
        Self {
            bucket: "app-bot-test-bucket".into(),
            object: "test".into(),
        }
    }
}

impl ValidationTarget {
    /// Short `bucket/object` form for logs.
    pub fn resource(&self) -> String {
        format!("{}/{}", self.bucket, self.object)
    }
}

/// Configuration shared by the coordinator, the reaper and the validation sweep.
///
/// # Example
///
/// ```
/// use keyturn_credential::RotationConfig;
/// use std::time::Duration;
///
/// let config = RotationConfig {
///     inactivity_threshold: Duration::from_secs(12 * 3600),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Minimum idle time before a previous key is deactivated.
    #[serde(with = "humantime_serde")]
    pub inactivity_threshold: Duration,

    /// Upper bound for every store, directory and validator call.
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,

    /// Keys a principal may hold at once.
    pub max_keys_per_principal: usize,

    /// Secrets processed concurrently by the reaper and validation sweep.
    pub sweep_concurrency: usize,

    /// Tag selecting secrets for the reaper and validation sweep.
    pub eligibility: EligibilityTag,

    /// Resource exercised by the validator.
    pub validation: ValidationTarget,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            inactivity_threshold: Duration::from_secs(86_400),
            call_timeout: Duration::from_secs(30),
            max_keys_per_principal: 2,
            sweep_concurrency: 4,
            eligibility: EligibilityTag::default(),
            validation: ValidationTarget::default(),
        }
    }
}

impl RotationConfig {
    /// Checks all values before any handler is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inactivity_threshold.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "inactivity_threshold".into(),
                reason: "must be greater than zero".into(),
            });
        }

        if chrono::Duration::from_std(self.inactivity_threshold).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "inactivity_threshold".into(),
                reason: "out of range".into(),
            });
        }

        if self.call_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "call_timeout".into(),
                reason: "must be greater than zero".into(),
            });
        }

        if self.max_keys_per_principal == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_keys_per_principal".into(),
                reason: "must allow at least one key".into(),
            });
        }

        if self.sweep_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sweep_concurrency".into(),
                reason: "must be at least 1".into(),
            });
        }

        if self.eligibility.key.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "eligibility.key".into(),
            });
        }

        if self.validation.bucket.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "validation.bucket".into(),
            });
        }

        if self.validation.object.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "validation.object".into(),
            });
        }

        Ok(())
    }

    /// Inactivity threshold as a signed duration for timestamp arithmetic.
    pub(crate) fn inactivity_threshold_signed(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.inactivity_threshold).unwrap_or(chrono::Duration::MAX)
    }
}
