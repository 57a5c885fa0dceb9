//! Sign Out Use Case
//!
//! Provider-side half of a logout. Both steps are best-effort: a lost
//! timestamp or an unreachable provider never keeps a user signed in.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::entity::profile::ProfileUpdate;
use crate::domain::repository::{IdentityProvider, ProfileStore};
use crate::domain::value_object::IdentityHandle;

/// Sign out use case
pub struct SignOutUseCase<P, S>
where
    P: IdentityProvider,
    S: ProfileStore,
{
    provider: Arc<P>,
    store: Arc<S>,
}

impl<P, S> SignOutUseCase<P, S>
where
    P: IdentityProvider,
    S: ProfileStore,
{
    pub fn new(provider: Arc<P>, store: Arc<S>) -> Self {
        Self { provider, store }
    }

    /// Record `last_logout`
    pub async fn record_logout(&self, handle: &IdentityHandle) {
        let update = ProfileUpdate::logout(Utc::now());
        if let Err(e) = self.store.write_profile_fields(handle, &update).await {
            tracing::warn!(identity = %handle, error = %e, "Failed to record logout time");
        }
    }

    /// End the provider session
    pub async fn invalidate(&self, handle: &IdentityHandle) {
        if let Err(e) = self.provider.invalidate_identity(handle).await {
            tracing::warn!(identity = %handle, error = %e, "Failed to invalidate provider session");
        }
    }
}
