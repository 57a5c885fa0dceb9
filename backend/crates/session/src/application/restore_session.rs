//! Restore Session Use Case
//!
//! Resolves the identity the provider kept from an earlier run and checks
//! it against the profile store, failing closed like sign-in does.

use std::sync::Arc;

use crate::application::sign_in::SignInOutput;
use crate::domain::repository::{IdentityProvider, ProfileStore};
use crate::domain::value_object::IdentityHandle;

/// Restore session use case
pub struct RestoreSessionUseCase<P, S>
where
    P: IdentityProvider,
    S: ProfileStore,
{
    provider: Arc<P>,
    store: Arc<S>,
}

impl<P, S> RestoreSessionUseCase<P, S>
where
    P: IdentityProvider,
    S: ProfileStore,
{
    pub fn new(provider: Arc<P>, store: Arc<S>) -> Self {
        Self { provider, store }
    }

    /// `Some` only for a restored identity with an active profile
    pub async fn execute(&self) -> Option<SignInOutput> {
        let identity = match self.provider.restore_identity().await {
            Ok(Some(identity)) => identity,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Identity restore failed");
                return None;
            }
        };

        match self.store.get_profile(&identity.handle).await {
            Ok(Some(profile)) if profile.status.can_sign_in() => {
                tracing::info!(identity = %identity.handle, role = %profile.role, "Session restored");
                Some(SignInOutput { identity, profile })
            }
            Ok(Some(profile)) => {
                tracing::warn!(identity = %identity.handle, status = %profile.status, "Restored identity has non-active profile");
                self.fail_closed(&identity.handle).await;
                None
            }
            Ok(None) => {
                tracing::warn!(identity = %identity.handle, "Restored identity has no admin profile");
                self.fail_closed(&identity.handle).await;
                None
            }
            Err(e) => {
                tracing::warn!(identity = %identity.handle, error = %e, "Profile lookup failed during restore");
                self.fail_closed(&identity.handle).await;
                None
            }
        }
    }

    async fn fail_closed(&self, handle: &IdentityHandle) {
        if let Err(e) = self.provider.invalidate_identity(handle).await {
            tracing::warn!(identity = %handle, error = %e, "Failed to invalidate restored identity");
        }
    }
}
