//! Password Use Cases
//!
//! Reset-link delivery and secret change. Neither touches session state.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::entity::profile::ProfileUpdate;
use crate::domain::repository::{IdentityProvider, ProfileStore};
use crate::domain::value_object::IdentityHandle;
use crate::error::{SessionError, SessionResult};

/// Password reset/change use case
pub struct PasswordUseCase<P, S>
where
    P: IdentityProvider,
    S: ProfileStore,
{
    provider: Arc<P>,
    store: Arc<S>,
}

impl<P, S> PasswordUseCase<P, S>
where
    P: IdentityProvider,
    S: ProfileStore,
{
    pub fn new(provider: Arc<P>, store: Arc<S>) -> Self {
        Self { provider, store }
    }

    /// Send a reset link. Errors are narrowed to
    /// `NoSuchAccount`, `InvalidIdentifier` or `Unknown`.
    pub async fn reset(&self, identifier: &str) -> SessionResult<()> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(SessionError::InvalidIdentifier);
        }

        self.provider
            .send_reset_link(identifier)
            .await
            .map_err(normalize_reset_error)?;

        tracing::info!(identifier = %identifier, "Password reset link sent");
        Ok(())
    }

    /// Change the secret, then best-effort record `password_changed_at`
    pub async fn change(&self, handle: &IdentityHandle, new_secret: &str) -> SessionResult<()> {
        self.provider.update_secret(handle, new_secret).await?;

        let update = ProfileUpdate::password_changed(Utc::now());
        if let Err(e) = self.store.write_profile_fields(handle, &update).await {
            tracing::warn!(identity = %handle, error = %e, "Failed to record password change time");
        }

        tracing::info!(identity = %handle, "Password changed");
        Ok(())
    }
}

fn normalize_reset_error(err: SessionError) -> SessionError {
    match err {
        SessionError::NoSuchAccount | SessionError::InvalidIdentifier => err,
        SessionError::Unknown(_) => err,
        other => SessionError::Unknown(other.to_string()),
    }
}
