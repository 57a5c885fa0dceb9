//! Sign In Use Case
//!
//! Verifies credentials with the identity provider and authorizes the
//! identity against its admin profile. Fails closed: whenever the profile
//! check rejects the identity, the provider session is invalidated before
//! the error is returned.
//!
//! Errors leaving this use case are limited to the sign-in taxonomy;
//! transport and storage failures surface as `Unknown`.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::entity::{
    identity::{Credentials, Identity},
    profile::{Profile, ProfileUpdate},
};
use crate::domain::repository::{IdentityProvider, ProfileStore};
use crate::domain::value_object::IdentityHandle;
use crate::error::{SessionError, SessionResult};

/// Sign in output
#[derive(Debug, Clone)]
pub struct SignInOutput {
    pub identity: Identity,
    pub profile: Profile,
}

/// Sign in use case
pub struct SignInUseCase<P, S>
where
    P: IdentityProvider,
    S: ProfileStore,
{
    provider: Arc<P>,
    store: Arc<S>,
}

impl<P, S> SignInUseCase<P, S>
where
    P: IdentityProvider,
    S: ProfileStore,
{
    pub fn new(provider: Arc<P>, store: Arc<S>) -> Self {
        Self { provider, store }
    }

    pub async fn execute(&self, credentials: &Credentials) -> SessionResult<SignInOutput> {
        let identity = self
            .provider
            .verify_credentials(credentials)
            .await
            .map_err(narrow_sign_in_error)?;
        let profile = self.authorize(&identity.handle).await?;
        let profile = self.record_login(&identity.handle, profile).await;

        tracing::info!(
            identity = %identity.handle,
            role = %profile.role,
            remember_me = credentials.remember_me,
            "Admin signed in"
        );

        Ok(SignInOutput { identity, profile })
    }

    async fn authorize(&self, handle: &IdentityHandle) -> SessionResult<Profile> {
        let profile = match self.store.get_profile(handle).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                self.fail_closed(handle).await;
                return Err(SessionError::ProfileNotFound);
            }
            Err(e) => {
                tracing::warn!(identity = %handle, error = %e, "Profile lookup failed during sign-in");
                self.fail_closed(handle).await;
                return Err(narrow_sign_in_error(e));
            }
        };

        if !profile.status.can_sign_in() {
            tracing::warn!(identity = %handle, status = %profile.status, "Sign-in refused for non-active profile");
            self.fail_closed(handle).await;
            return Err(SessionError::AccountSuspended);
        }

        Ok(profile)
    }

    /// Best-effort login tracking; the returned profile only reflects it
    /// when the write went through.
    async fn record_login(&self, handle: &IdentityHandle, mut profile: Profile) -> Profile {
        let update = ProfileUpdate::login(profile.login_count, Utc::now());
        match self.store.write_profile_fields(handle, &update).await {
            Ok(()) => profile.apply(&update),
            Err(e) => {
                tracing::warn!(identity = %handle, error = %e, "Failed to record login metadata");
            }
        }
        profile
    }

    async fn fail_closed(&self, handle: &IdentityHandle) {
        if let Err(e) = self.provider.invalidate_identity(handle).await {
            tracing::warn!(identity = %handle, error = %e, "Failed to invalidate rejected identity");
        }
    }
}

/// Keep sign-in failures inside the sign-in taxonomy
fn narrow_sign_in_error(err: SessionError) -> SessionError {
    match err {
        SessionError::InvalidCredentials
        | SessionError::AccountDisabled
        | SessionError::TooManyAttempts
        | SessionError::ProfileNotFound
        | SessionError::AccountSuspended
        | SessionError::Unknown(_) => err,
        other => SessionError::Unknown(other.to_string()),
    }
}
