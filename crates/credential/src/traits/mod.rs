//! Seams to the external collaborators

mod directory;
mod store;
mod validator;

pub use directory::IdentityDirectory;
pub use store::{EligibilityTag, SecretStore};
pub use validator::{CredentialValidator, ValidationReport};
