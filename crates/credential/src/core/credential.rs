//! The key-pair credential stored as a secret value

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::id::{KeyId, Principal, VersionId};

/// Secret half of an access key pair.
///
/// Held in a [`SecretString`] so the material is zeroed on drop and never
/// shows up in `Debug` output.
pub struct KeySecret(SecretString);

impl KeySecret {
    /// Wraps raw secret material.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(SecretString::from(secret.into()))
    }

    /// Exposes the secret material.
    ///
    /// The returned reference must not be logged or stored.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for KeySecret {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl PartialEq for KeySecret {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for KeySecret {}

impl fmt::Debug for KeySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Access key credential owned by a secret version.
///
/// Immutable once written: rotation never edits a credential, it issues a new
/// key and writes a new secret version.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    key_id: KeyId,
    secret: KeySecret,
    principal: Principal,
}

impl Credential {
    /// Creates a credential for `principal`.
    pub fn new(key_id: KeyId, secret: KeySecret, principal: Principal) -> Self {
        Self {
            key_id,
            secret,
            principal,
        }
    }

    /// Access key identifier.
    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    /// Secret access key.
    pub fn secret(&self) -> &KeySecret {
        &self.secret
    }

    /// Identity that owns the key.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Encodes the credential as the JSON document stored in the secret.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes a credential from a stored secret value.
    pub fn from_json(value: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(value)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key_id", &self.key_id)
            .field("principal", &self.principal)
            .finish_non_exhaustive()
    }
}

/// On-the-wire shape of a credential: `{"Key", "Secret", "UserName"}`.
#[derive(Serialize, Deserialize)]
struct CredentialDocument<'a> {
    #[serde(rename = "Key")]
    key: std::borrow::Cow<'a, str>,
    #[serde(rename = "Secret")]
    secret: std::borrow::Cow<'a, str>,
    #[serde(rename = "UserName")]
    user_name: std::borrow::Cow<'a, str>,
}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CredentialDocument {
            key: self.key_id.as_str().into(),
            secret: self.secret.expose().into(),
            user_name: self.principal.as_str().into(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let doc = CredentialDocument::deserialize(deserializer)?;
        Ok(Self {
            key_id: KeyId::new(doc.key.into_owned()),
            secret: KeySecret::new(doc.secret.into_owned()),
            principal: Principal::new(doc.user_name.into_owned()),
        })
    }
}

/// A credential together with the secret version it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    /// Version holding the credential.
    pub version: VersionId,
    /// Decoded credential.
    pub credential: Credential,
}
