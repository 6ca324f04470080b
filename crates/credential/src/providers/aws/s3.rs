//! S3 probe-object validator

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use std::time::Instant;

use crate::config::ValidationTarget;
use crate::core::{Credential, ValidatorError};
use crate::traits::{CredentialValidator, ValidationReport};

/// [`CredentialValidator`] that reads a probe object from S3.
///
/// A fresh client is built for every check so the request is signed with the
/// credential under test, never with the ambient one.
#[derive(Clone, Debug)]
pub struct S3ObjectValidator {
    target: ValidationTarget,
    region: Option<Region>,
    endpoint_url: Option<String>,
}

impl S3ObjectValidator {
    pub fn new(target: ValidationTarget, region: Option<Region>, endpoint_url: Option<String>) -> Self {
        Self {
            target,
            region,
            endpoint_url,
        }
    }

    fn client_for(&self, credential: &Credential) -> aws_sdk_s3::Client {
        let credentials = Credentials::new(
            credential.key_id().as_str(),
            credential.secret().expose(),
            None,
            None,
            "keyturn-validator",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(self.region.clone());

        if let Some(endpoint) = &self.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        aws_sdk_s3::Client::from_conf(builder.build())
    }
}

#[async_trait]
impl CredentialValidator for S3ObjectValidator {
    #[tracing::instrument(
        skip(self, credential),
        fields(provider = "AWS", key_id = %credential.key_id(), resource = %self.target.resource())
    )]
    async fn validate(&self, credential: &Credential) -> Result<ValidationReport, ValidatorError> {
        let started = Instant::now();
        let client = self.client_for(credential);

        let output = client
            .get_object()
            .bucket(&self.target.bucket)
            .key(&self.target.object)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some() {
                    ValidatorError::Rejected {
                        key_id: credential.key_id().clone(),
                        reason: DisplayErrorContext(&e).to_string(),
                    }
                } else {
                    ValidatorError::Backend {
                        operation: "get object",
                        message: DisplayErrorContext(&e).to_string(),
                    }
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| ValidatorError::Backend {
                operation: "read object body",
                message: DisplayErrorContext(&e).to_string(),
            })?
            .into_bytes()
            .len();

        tracing::debug!(bytes, "Read probe object");
        Ok(ValidationReport::new(
            format!("s3:GetObject {}", self.target.resource()),
            format!("read {bytes} bytes"),
            started.elapsed(),
        ))
    }
}
