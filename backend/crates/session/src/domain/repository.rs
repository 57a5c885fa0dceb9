//! Port Traits
//!
//! Interfaces to the external collaborators. Implementations live in the
//! infrastructure layer.

use tokio::sync::watch;

use crate::domain::entity::{
    identity::{Credentials, Identity},
    profile::{Profile, ProfileUpdate},
};
use crate::domain::value_object::IdentityHandle;
use crate::error::SessionResult;

/// Identity provider client
#[trait_variant::make(IdentityProvider: Send)]
pub trait LocalIdentityProvider {
    /// Verify credentials and open a provider-side session.
    ///
    /// Fails with `InvalidCredentials`, `AccountDisabled` or `TooManyAttempts`.
    async fn verify_credentials(&self, credentials: &Credentials) -> SessionResult<Identity>;

    /// Identity persisted from an earlier run, if any
    async fn restore_identity(&self) -> SessionResult<Option<Identity>>;

    /// Terminate the provider-side session (best-effort)
    async fn invalidate_identity(&self, handle: &IdentityHandle) -> SessionResult<()>;

    /// Send a password reset link.
    ///
    /// Fails with `NoSuchAccount` or `InvalidIdentifier`.
    async fn send_reset_link(&self, identifier: &str) -> SessionResult<()>;

    /// Replace the secret of a signed-in principal
    async fn update_secret(&self, handle: &IdentityHandle, new_secret: &str) -> SessionResult<()>;

    /// Provider-side principal, updated whenever it changes or goes away.
    ///
    /// `None` for providers that never push changes.
    fn identity_changes(&self) -> Option<watch::Receiver<Option<IdentityHandle>>> {
        None
    }
}

/// Admin profile store
#[trait_variant::make(ProfileStore: Send)]
pub trait LocalProfileStore {
    /// Find profile by identity
    async fn get_profile(&self, handle: &IdentityHandle) -> SessionResult<Option<Profile>>;

    /// Write the set fields of `update`
    async fn write_profile_fields(
        &self,
        handle: &IdentityHandle,
        update: &ProfileUpdate,
    ) -> SessionResult<()>;
}
