//! IAM identity directory

use async_trait::async_trait;
use aws_sdk_iam::Client as IamClient;
use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_iam::types::StatusType;
use chrono::{DateTime, Utc};

use crate::core::{DirectoryError, IssuedKey, KeyId, KeyRecord, KeySecret, KeyStatus, Principal};
use crate::traits::IdentityDirectory;

fn backend(operation: &'static str, err: impl std::error::Error) -> DirectoryError {
    DirectoryError::Backend {
        operation,
        message: DisplayErrorContext(err).to_string(),
    }
}

fn status_type(status: KeyStatus) -> StatusType {
    match status {
        KeyStatus::Active => StatusType::Active,
        KeyStatus::Inactive => StatusType::Inactive,
    }
}

/// [`IdentityDirectory`] backed by IAM users and their access keys.
///
/// The principal is the IAM user name.
#[derive(Clone, Debug)]
pub struct IamDirectory {
    client: IamClient,
}

impl IamDirectory {
    pub fn new(client: IamClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityDirectory for IamDirectory {
    #[tracing::instrument(skip(self, principal), fields(provider = "AWS", principal = %principal))]
    async fn create_key(&self, principal: &Principal) -> Result<IssuedKey, DirectoryError> {
        let output = self
            .client
            .create_access_key()
            .user_name(principal.as_str())
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_limit_exceeded_exception() => DirectoryError::QuotaExceeded {
                    principal: principal.clone(),
                },
                Some(se) if se.is_no_such_entity_exception() => DirectoryError::PrincipalNotFound {
                    principal: principal.clone(),
                },
                _ => backend("create key", e),
            })?;

        let key = output.access_key().ok_or_else(|| DirectoryError::Backend {
            operation: "create key",
            message: "response carries no access key".into(),
        })?;

        tracing::debug!(key_id = key.access_key_id(), "Created access key");
        Ok(IssuedKey {
            key_id: KeyId::new(key.access_key_id()),
            secret: KeySecret::new(key.secret_access_key()),
        })
    }

    #[tracing::instrument(skip(self, principal), fields(provider = "AWS", principal = %principal))]
    async fn list_keys(&self, principal: &Principal) -> Result<Vec<KeyRecord>, DirectoryError> {
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_access_keys()
                .user_name(principal.as_str())
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| match e.as_service_error() {
                    Some(se) if se.is_no_such_entity_exception() => DirectoryError::PrincipalNotFound {
                        principal: principal.clone(),
                    },
                    _ => backend("list keys", e),
                })?;

            for metadata in output.access_key_metadata() {
                let Some(key_id) = metadata.access_key_id() else {
                    continue;
                };
                let status = match metadata.status() {
                    Some(StatusType::Active) => KeyStatus::Active,
                    Some(StatusType::Inactive) => KeyStatus::Inactive,
                    other => {
                        tracing::warn!(key_id, status = ?other, "Skipping key with unrecognised status");
                        continue;
                    }
                };
                keys.push(KeyRecord::new(KeyId::new(key_id), status));
            }

            match (output.is_truncated(), output.marker()) {
                (true, Some(next)) => marker = Some(next.to_owned()),
                _ => break,
            }
        }

        Ok(keys)
    }

    #[tracing::instrument(skip(self, principal, key_id), fields(provider = "AWS", principal = %principal, key_id = %key_id))]
    async fn delete_key(&self, principal: &Principal, key_id: &KeyId) -> Result<(), DirectoryError> {
        self.client
            .delete_access_key()
            .user_name(principal.as_str())
            .access_key_id(key_id.as_str())
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_no_such_entity_exception() => DirectoryError::KeyNotFound {
                    key_id: key_id.clone(),
                },
                _ => backend("delete key", e),
            })?;

        tracing::debug!("Deleted access key");
        Ok(())
    }

    #[tracing::instrument(
        skip(self, principal, key_id),
        fields(provider = "AWS", principal = %principal, key_id = %key_id, status = %status)
    )]
    async fn set_key_status(
        &self,
        principal: &Principal,
        key_id: &KeyId,
        status: KeyStatus,
    ) -> Result<(), DirectoryError> {
        self.client
            .update_access_key()
            .user_name(principal.as_str())
            .access_key_id(key_id.as_str())
            .status(status_type(status))
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_no_such_entity_exception() => DirectoryError::KeyNotFound {
                    key_id: key_id.clone(),
                },
                _ => backend("set key status", e),
            })?;

        tracing::debug!("Updated access key status");
        Ok(())
    }

    #[tracing::instrument(skip(self, key_id), fields(provider = "AWS", key_id = %key_id))]
    async fn last_used(&self, key_id: &KeyId) -> Result<Option<DateTime<Utc>>, DirectoryError> {
        let output = self
            .client
            .get_access_key_last_used()
            .access_key_id(key_id.as_str())
            .send()
            .await
            .map_err(|e| backend("get last used", e))?;

        let Some(date) = output
            .access_key_last_used()
            .and_then(|used| used.last_used_date())
        else {
            return Ok(None);
        };

        DateTime::from_timestamp(date.secs(), date.subsec_nanos())
            .map(Some)
            .ok_or_else(|| DirectoryError::Backend {
                operation: "get last used",
                message: format!("last-used date out of range: {date:?}"),
            })
    }
}
