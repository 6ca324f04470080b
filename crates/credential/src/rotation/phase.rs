//! Rotation phases and the host event that triggers them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::{SecretId, VersionId};

use super::error::RotationError;

/// One step of a rotation cycle.
///
/// The host drives the phases in declaration order, keyed by the same
/// idempotency token, and may redeliver any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// Issue a new key and store it as the pending version.
    CreateSecret,
    /// Install the pending credential in downstream systems.
    SetSecret,
    /// Prove the pending credential works.
    TestSecret,
    /// Promote the pending version to current.
    FinishSecret,
}

impl Phase {
    /// Step name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateSecret => "createSecret",
            Self::SetSecret => "setSecret",
            Self::TestSecret => "testSecret",
            Self::FinishSecret => "finishSecret",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = RotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createSecret" => Ok(Self::CreateSecret),
            "setSecret" => Ok(Self::SetSecret),
            "testSecret" => Ok(Self::TestSecret),
            "finishSecret" => Ok(Self::FinishSecret),
            other => Err(RotationError::UnknownPhase {
                step: other.to_owned(),
            }),
        }
    }
}

/// Rotation event as delivered by the host scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationEvent {
    /// Idempotency token, doubles as the pending version id.
    #[serde(rename = "ClientRequestToken")]
    pub client_request_token: String,
    /// Secret being rotated.
    #[serde(rename = "SecretId")]
    pub secret_id: String,
    /// Step name, e.g. `createSecret`.
    #[serde(rename = "Step")]
    pub step: String,
}

/// Validated rotation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationRequest {
    /// Idempotency token and pending version id.
    pub token: VersionId,
    /// Secret being rotated.
    pub secret_id: SecretId,
    /// Phase to run.
    pub phase: Phase,
}

impl RotationRequest {
    /// Creates a request.
    pub fn new(secret_id: impl Into<SecretId>, token: impl Into<VersionId>, phase: Phase) -> Self {
        Self {
            token: token.into(),
            secret_id: secret_id.into(),
            phase,
        }
    }
}

impl TryFrom<RotationEvent> for RotationRequest {
    type Error = RotationError;

    fn try_from(event: RotationEvent) -> Result<Self, Self::Error> {
        let phase = event.step.parse()?;
        Ok(Self {
            token: VersionId::new(event.client_request_token),
            secret_id: SecretId::new(event.secret_id),
            phase,
        })
    }
}
