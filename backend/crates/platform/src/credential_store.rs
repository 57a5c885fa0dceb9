//! Remember-me Credential Persistence
//!
//! Stores the refresh token of a "remember me" sign-in in a JSON file so a
//! later process can restore the identity. The file is written with
//! owner-only permissions on Unix.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Credential store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Credential file I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Credential file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Persisted remember-me credential
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct StoredCredential {
    pub local_id: String,
    pub email: Option<String>,
    pub refresh_token: String,
}

impl std::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredential")
            .field("local_id", &self.local_id)
            .field("email", &self.email)
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// File-backed credential store
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored credential, `None` when nothing is remembered
    pub async fn load(&self) -> Result<Option<StoredCredential>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Persist a credential, replacing any previous one
    pub async fn save(&self, credential: &StoredCredential) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec(credential)?;
        tokio::fs::write(&self.path, bytes).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tracing::debug!(path = %self.path.display(), "Remembered credential saved");
        Ok(())
    }

    /// Forget the stored credential. Missing file is not an error.
    pub async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
