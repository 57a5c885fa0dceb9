//! Identity Toolkit Provider
//!
//! `IdentityProvider` over the platform REST client. Holds the token grant
//! of the signed-in principal in memory and, for "remember me" sign-ins,
//! persists the refresh token through a credential store.
//!
//! The signed-in principal is published on a watch channel; it drops to
//! `None` when the provider rejects the held token.

use parking_lot::Mutex;
use platform::credential_store::{CredentialStore, StoredCredential};
use platform::identity_toolkit::{IdentityToolkitClient, TokenGrant, ToolkitError};
use tokio::sync::watch;

use crate::domain::entity::identity::{Credentials, Identity};
use crate::domain::repository::IdentityProvider;
use crate::domain::value_object::IdentityHandle;
use crate::error::{SessionError, SessionResult};

/// Identity provider backed by an Identity Toolkit compatible API
pub struct ToolkitIdentityProvider {
    client: IdentityToolkitClient,
    credentials: Option<CredentialStore>,
    current: Mutex<Option<TokenGrant>>,
    changes: watch::Sender<Option<IdentityHandle>>,
}

impl ToolkitIdentityProvider {
    pub fn new(client: IdentityToolkitClient) -> Self {
        Self {
            client,
            credentials: None,
            current: Mutex::new(None),
            changes: watch::Sender::new(None),
        }
    }

    /// Enable remember-me persistence
    pub fn with_credential_store(mut self, store: CredentialStore) -> Self {
        self.credentials = Some(store);
        self
    }

    async fn persist(&self, grant: &TokenGrant, email: Option<String>) {
        let Some(store) = &self.credentials else {
            return;
        };
        let credential = StoredCredential {
            local_id: grant.local_id.clone(),
            email,
            refresh_token: grant.refresh_token.as_str().to_string(),
        };
        if let Err(e) = store.save(&credential).await {
            tracing::warn!(error = %e, "Failed to persist remembered credential");
        }
    }

    async fn forget(&self) {
        if let Some(store) = &self.credentials {
            if let Err(e) = store.clear().await {
                tracing::warn!(error = %e, "Failed to clear remembered credential");
            }
        }
    }

    /// Replace the held grant and publish the resulting principal
    fn set_current(&self, grant: Option<TokenGrant>) {
        let handle = grant
            .as_ref()
            .map(|grant| IdentityHandle::from(grant.local_id.as_str()));
        *self.current.lock() = grant;
        self.changes.send_if_modified(|published| {
            if *published == handle {
                return false;
            }
            *published = handle;
            true
        });
    }

    async fn is_remembered(&self, local_id: &str) -> bool {
        match &self.credentials {
            Some(store) => matches!(store.load().await, Ok(Some(c)) if c.local_id == local_id),
            None => false,
        }
    }
}

impl IdentityProvider for ToolkitIdentityProvider {
    async fn verify_credentials(&self, credentials: &Credentials) -> SessionResult<Identity> {
        let grant = self
            .client
            .sign_in_with_password(&credentials.identifier, &credentials.secret)
            .await
            .map_err(map_sign_in_error)?;

        let email = grant.email.clone().or_else(|| Some(credentials.identifier.clone()));
        if credentials.remember_me {
            self.persist(&grant, email.clone()).await;
        } else {
            self.forget().await;
        }

        let identity = Identity::new(grant.local_id.clone(), email);
        self.set_current(Some(grant));
        Ok(identity)
    }

    async fn restore_identity(&self) -> SessionResult<Option<Identity>> {
        let live = self
            .current
            .lock()
            .as_ref()
            .map(|grant| Identity::new(grant.local_id.clone(), grant.email.clone()));
        if live.is_some() {
            return Ok(live);
        }

        let Some(store) = &self.credentials else {
            return Ok(None);
        };
        let Some(stored) = store.load().await? else {
            return Ok(None);
        };

        match self.client.refresh(&stored.refresh_token).await {
            Ok(mut grant) => {
                grant.email = stored.email.clone();
                self.persist(&grant, stored.email.clone()).await;
                let identity = Identity::new(grant.local_id.clone(), stored.email.clone());
                self.set_current(Some(grant));
                Ok(Some(identity))
            }
            Err(ToolkitError::Api { code, .. }) => {
                tracing::info!(code = %code, "Remembered credential rejected, forgetting it");
                self.forget().await;
                Ok(None)
            }
            Err(e) => Err(SessionError::Provider(e.to_string())),
        }
    }

    async fn invalidate_identity(&self, handle: &IdentityHandle) -> SessionResult<()> {
        let held = self
            .current
            .lock()
            .as_ref()
            .is_some_and(|grant| grant.local_id == handle.as_str());
        if held {
            self.set_current(None);
        }

        // another principal's remembered credential stays
        if self.is_remembered(handle.as_str()).await {
            if let Some(store) = &self.credentials {
                store.clear().await?;
            }
        }
        Ok(())
    }

    async fn send_reset_link(&self, identifier: &str) -> SessionResult<()> {
        self.client
            .send_password_reset(identifier)
            .await
            .map_err(map_reset_error)
    }

    async fn update_secret(&self, handle: &IdentityHandle, new_secret: &str) -> SessionResult<()> {
        let id_token = self
            .current
            .lock()
            .as_ref()
            .filter(|grant| grant.local_id == handle.as_str())
            .map(|grant| grant.id_token.clone())
            .ok_or(SessionError::NotSignedIn)?;

        let mut grant = match self.client.update_password(&id_token, new_secret).await {
            Ok(grant) => grant,
            Err(e) => {
                let err = map_update_error(e);
                if err == SessionError::NotSignedIn {
                    tracing::warn!(identity = %handle, "Provider rejected the held token, dropping it");
                    self.set_current(None);
                }
                return Err(err);
            }
        };

        let previous_email = self.current.lock().as_ref().and_then(|g| g.email.clone());
        grant.email = grant.email.take().or(previous_email);

        // the provider revokes old refresh tokens on a password change
        if self.is_remembered(&grant.local_id).await {
            self.persist(&grant, grant.email.clone()).await;
        }
        self.set_current(Some(grant));
        Ok(())
    }

    fn identity_changes(&self) -> Option<watch::Receiver<Option<IdentityHandle>>> {
        Some(self.changes.subscribe())
    }
}

/// Provider codes on the sign-in path
pub fn map_sign_in_error(err: ToolkitError) -> SessionError {
    match err.code() {
        Some(
            "EMAIL_NOT_FOUND"
            | "INVALID_PASSWORD"
            | "INVALID_LOGIN_CREDENTIALS"
            | "INVALID_EMAIL"
            | "MISSING_PASSWORD",
        ) => SessionError::InvalidCredentials,
        Some("USER_DISABLED") => SessionError::AccountDisabled,
        Some("TOO_MANY_ATTEMPTS_TRY_LATER") => SessionError::TooManyAttempts,
        Some(code) => SessionError::Unknown(code.to_string()),
        None => SessionError::Provider(err.to_string()),
    }
}

/// Provider codes on the reset-link path
pub fn map_reset_error(err: ToolkitError) -> SessionError {
    match err.code() {
        Some("EMAIL_NOT_FOUND") => SessionError::NoSuchAccount,
        Some("INVALID_EMAIL" | "MISSING_EMAIL") => SessionError::InvalidIdentifier,
        Some(code) => SessionError::Unknown(code.to_string()),
        None => SessionError::Unknown(err.to_string()),
    }
}

/// Provider codes on the secret-change path
pub fn map_update_error(err: ToolkitError) -> SessionError {
    match err.code() {
        Some("INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_NOT_FOUND") => SessionError::NotSignedIn,
        Some(code) => SessionError::Provider(code.to_string()),
        None => SessionError::Provider(err.to_string()),
    }
}
