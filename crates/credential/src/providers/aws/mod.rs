//! AWS collaborators
//!
//! - [`SecretsManagerStore`]: AWS Secrets Manager, staging labels
//!   `AWSCURRENT` / `AWSPENDING` / `AWSPREVIOUS`
//! - [`IamDirectory`]: IAM access keys
//! - [`S3ObjectValidator`]: `s3:GetObject` on a probe object
//!
//! All clients are built once from a single SDK configuration by
//! [`AwsServices::load`].
//!
//! # Configuration
//!
//! ```rust,ignore
//! use keyturn_credential::providers::aws::{AwsConfig, AwsServices};
//! use keyturn_credential::RotationConfig;
//!
//! let aws = AwsConfig {
//!     region: Some("us-east-1".into()),
//!     endpoint_url: Some("http://localhost:4566".into()),
//! };
//! let services = AwsServices::load(&aws, &RotationConfig::default()).await;
//! ```

mod iam;
mod s3;
mod secrets_manager;

pub use iam::IamDirectory;
pub use s3::S3ObjectValidator;
pub use secrets_manager::SecretsManagerStore;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::RotationConfig;
use crate::services::Services;

/// Connection settings shared by all AWS clients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// AWS region (auto-detected from environment if None)
    ///
    /// Checked in order:
    /// 1. This config value
    /// 2. AWS_REGION environment variable
    /// 3. AWS_DEFAULT_REGION environment variable
    /// 4. Shared config profile
    pub region: Option<String>,

    /// Custom endpoint URL (for LocalStack or other AWS-compatible services)
    pub endpoint_url: Option<String>,
}

/// Builder for AWS-backed [`Services`].
#[derive(Debug)]
pub struct AwsServices;

impl AwsServices {
    /// Loads the SDK configuration and builds every client from it.
    ///
    /// Credentials come from the default provider chain (environment,
    /// shared profile, instance or task role).
    pub async fn load(aws: &AwsConfig, rotation: &RotationConfig) -> Services {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &aws.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }

        if let Some(endpoint) = &aws.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;

        tracing::info!(
            provider = "AWS",
            region = ?sdk_config.region().map(ToString::to_string),
            endpoint = ?aws.endpoint_url,
            "Initialized AWS clients"
        );

        let store = SecretsManagerStore::new(aws_sdk_secretsmanager::Client::new(&sdk_config));
        let directory = IamDirectory::new(aws_sdk_iam::Client::new(&sdk_config));
        let validator = S3ObjectValidator::new(
            rotation.validation.clone(),
            sdk_config.region().cloned(),
            aws.endpoint_url.clone(),
        );

        Services::new(Arc::new(store), Arc::new(directory), Arc::new(validator))
    }
}
