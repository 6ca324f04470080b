//! AWS Secrets Manager secret store

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use aws_sdk_secretsmanager::error::DisplayErrorContext;

use crate::core::{Credential, SecretId, StageLabel, StageMap, StoreError, StoredCredential, VersionId};
use crate::traits::{EligibilityTag, SecretStore};

/// Secrets Manager staging label for `label`.
fn staging_label(label: StageLabel) -> &'static str {
    match label {
        StageLabel::Current => "AWSCURRENT",
        StageLabel::Pending => "AWSPENDING",
        StageLabel::Previous => "AWSPREVIOUS",
    }
}

/// Stage label for a Secrets Manager staging label, `None` for custom labels.
fn stage_label(staging: &str) -> Option<StageLabel> {
    match staging {
        "AWSCURRENT" => Some(StageLabel::Current),
        "AWSPENDING" => Some(StageLabel::Pending),
        "AWSPREVIOUS" => Some(StageLabel::Previous),
        _ => None,
    }
}

fn backend(operation: &'static str, err: impl std::error::Error) -> StoreError {
    StoreError::Backend {
        operation,
        message: DisplayErrorContext(err).to_string(),
    }
}

/// [`SecretStore`] backed by AWS Secrets Manager.
///
/// Secrets Manager moves `AWSPREVIOUS` itself whenever `AWSCURRENT` moves,
/// which satisfies the store's previous-retention postcondition.
#[derive(Clone, Debug)]
pub struct SecretsManagerStore {
    client: SecretsManagerClient,
}

impl SecretsManagerStore {
    pub fn new(client: SecretsManagerClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    #[tracing::instrument(skip(self, secret_id), fields(provider = "AWS", secret = %secret_id, label = %label))]
    async fn get_version(
        &self,
        secret_id: &SecretId,
        label: StageLabel,
    ) -> Result<StoredCredential, StoreError> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id.as_str())
            .version_stage(staging_label(label))
            .send()
            .await
            .map_err(|e| {
                // Secrets Manager answers a missing secret and a missing
                // staging label with the same exception.
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception())
                {
                    StoreError::StageNotFound {
                        secret_id: secret_id.clone(),
                        label,
                    }
                } else {
                    backend("get version", e)
                }
            })?;

        let version = output.version_id().ok_or_else(|| StoreError::Backend {
            operation: "get version",
            message: "response carries no version id".into(),
        })?;
        let value = output.secret_string().ok_or_else(|| StoreError::Backend {
            operation: "get version",
            message: "secret does not contain string data".into(),
        })?;

        let credential = Credential::from_json(value).map_err(|source| StoreError::Malformed {
            secret_id: secret_id.clone(),
            source,
        })?;

        Ok(StoredCredential {
            version: VersionId::new(version),
            credential,
        })
    }

    #[tracing::instrument(
        skip(self, secret_id, token, credential),
        fields(provider = "AWS", secret = %secret_id, token = %token, label = %label)
    )]
    async fn put_version(
        &self,
        secret_id: &SecretId,
        token: &VersionId,
        credential: &Credential,
        label: StageLabel,
    ) -> Result<(), StoreError> {
        let value = credential.to_json().map_err(|e| backend("put version", e))?;

        self.client
            .put_secret_value()
            .secret_id(secret_id.as_str())
            .client_request_token(token.as_str())
            .secret_string(value)
            .version_stages(staging_label(label))
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_resource_exists_exception() => StoreError::VersionExists {
                    secret_id: secret_id.clone(),
                    version: token.clone(),
                },
                Some(se) if se.is_resource_not_found_exception() => StoreError::SecretNotFound {
                    secret_id: secret_id.clone(),
                },
                _ => backend("put version", e),
            })?;

        tracing::debug!("Stored new secret version");
        Ok(())
    }

    #[tracing::instrument(skip(self, secret_id), fields(provider = "AWS", secret = %secret_id))]
    async fn describe_stages(&self, secret_id: &SecretId) -> Result<StageMap, StoreError> {
        let output = self
            .client
            .describe_secret()
            .secret_id(secret_id.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception())
                {
                    StoreError::SecretNotFound {
                        secret_id: secret_id.clone(),
                    }
                } else {
                    backend("describe stages", e)
                }
            })?;

        let mut stages = StageMap::new();
        for (version, labels) in output.version_ids_to_stages().into_iter().flatten() {
            let version = VersionId::new(version.as_str());
            stages.insert_unlabelled(version.clone());
            for label in labels.iter().filter_map(|l| stage_label(l)) {
                stages.insert(version.clone(), label);
            }
        }

        Ok(stages)
    }

    #[tracing::instrument(skip(self, secret_id, from, to), fields(provider = "AWS", secret = %secret_id, label = %label))]
    async fn move_stage(
        &self,
        secret_id: &SecretId,
        label: StageLabel,
        from: Option<&VersionId>,
        to: Option<&VersionId>,
    ) -> Result<(), StoreError> {
        self.client
            .update_secret_version_stage()
            .secret_id(secret_id.as_str())
            .version_stage(staging_label(label))
            .set_remove_from_version_id(from.map(|v| v.as_str().to_owned()))
            .set_move_to_version_id(to.map(|v| v.as_str().to_owned()))
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception())
                {
                    StoreError::SecretNotFound {
                        secret_id: secret_id.clone(),
                    }
                } else {
                    backend("move stage", e)
                }
            })?;

        tracing::debug!(from = ?from, to = ?to, "Moved staging label");
        Ok(())
    }

    #[tracing::instrument(skip(self, tag), fields(provider = "AWS", tag = %tag.key))]
    async fn list_eligible(&self, tag: &EligibilityTag) -> Result<Vec<SecretId>, StoreError> {
        let mut secret_ids = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_secrets()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| backend("list eligible", e))?;

            for secret in output.secret_list() {
                let tagged = secret.tags().iter().any(|t| {
                    matches!((t.key(), t.value()), (Some(k), Some(v)) if tag.matches(k, v))
                });
                if let (true, Some(name)) = (tagged, secret.name()) {
                    secret_ids.push(SecretId::new(name));
                }
            }

            match output.next_token() {
                Some(token) => next_token = Some(token.to_owned()),
                None => break,
            }
        }

        secret_ids.sort();
        tracing::debug!(count = secret_ids.len(), "Listed eligible secrets");
        Ok(secret_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_labels_map_both_ways() {
        for label in StageLabel::ALL {
            assert_eq!(stage_label(staging_label(label)), Some(label));
        }
        assert_eq!(stage_label("CUSTOM"), None);
    }
}
