//! Collaborator implementations
//!
//! - [`memory`]: in-process store, directory and validator
//! - `aws` (feature `aws`): Secrets Manager, IAM and S3

pub mod memory;

#[cfg(feature = "aws")]
pub mod aws;

pub use memory::{MemoryIdentityDirectory, MemorySecretStore, MemoryValidator};

#[cfg(feature = "aws")]
pub use aws::{AwsConfig, AwsServices, IamDirectory, S3ObjectValidator, SecretsManagerStore};
