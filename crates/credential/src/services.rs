//! Collaborator bundle shared by the handlers

use std::fmt;
use std::sync::Arc;

use crate::core::{Clock, SystemClock};
use crate::traits::{CredentialValidator, IdentityDirectory, SecretStore};

/// External collaborators injected into the coordinator, reaper and sweep.
///
/// Handlers hold an `Arc<Services>` and never construct clients themselves,
/// so the same logic runs against AWS or the in-memory fakes.
#[derive(Clone)]
pub struct Services {
    /// Versioned secret store.
    pub store: Arc<dyn SecretStore>,
    /// Identity directory issuing access keys.
    pub directory: Arc<dyn IdentityDirectory>,
    /// Liveness check for credentials.
    pub validator: Arc<dyn CredentialValidator>,
    /// Time source for inactivity decisions.
    pub clock: Arc<dyn Clock>,
}

impl Services {
    /// Bundles the collaborators with the system clock.
    pub fn new(
        store: Arc<dyn SecretStore>,
        directory: Arc<dyn IdentityDirectory>,
        validator: Arc<dyn CredentialValidator>,
    ) -> Self {
        Self {
            store,
            directory,
            validator,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
