//! Identifier newtypes
//!
//! Secret ids, version ids, key ids and principal names are all plain
//! strings on the wire. Wrapping each in its own type keeps a version id
//! from being passed where a key id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the wrapper and returns the raw string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Name or ARN of a secret in the secret store.
    SecretId
);

string_id!(
    /// Identifier of one version of a secret.
    ///
    /// The rotation idempotency token is used verbatim as the version id of
    /// the credential written during `createSecret`, so a retried call lands
    /// on the same version.
    VersionId
);

string_id!(
    /// Access key identifier issued by the identity directory.
    KeyId
);

string_id!(
    /// Identity that owns access keys in the identity directory.
    Principal
);
