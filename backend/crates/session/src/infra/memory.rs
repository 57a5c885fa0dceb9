//! In-Memory Adapters
//!
//! Process-local implementations of the ports. Used by the console in demo
//! mode and as test doubles.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::domain::activity::{ActivityListener, ActivitySource};
use crate::domain::entity::{
    identity::{Credentials, Identity},
    profile::{Profile, ProfileUpdate},
};
use crate::domain::repository::{IdentityProvider, ProfileStore};
use crate::domain::value_object::{ActivityKind, IdentityHandle};
use crate::error::{SessionError, SessionResult};

/// Failed attempts before an account is throttled
pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;

/// Minimum secret length accepted by `update_secret`
pub const MIN_SECRET_LENGTH: usize = 6;

// ============================================================================
// Identity provider
// ============================================================================

struct Account {
    handle: IdentityHandle,
    secret: String,
    disabled: bool,
    failed_attempts: u32,
}

#[derive(Default)]
struct Directory {
    accounts: HashMap<String, Account>,
    current: Option<Identity>,
    remembered: Option<Identity>,
    reset_outbox: Vec<String>,
    invalidated: Vec<IdentityHandle>,
}

/// Account directory acting as identity provider
pub struct InMemoryIdentityProvider {
    directory: Mutex<Directory>,
    max_failed_attempts: u32,
    changes: watch::Sender<Option<IdentityHandle>>,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self {
            directory: Mutex::new(Directory::default()),
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            changes: watch::Sender::new(None),
        }
    }

    pub fn with_max_failed_attempts(mut self, max: u32) -> Self {
        self.max_failed_attempts = max;
        self
    }

    /// Register an account; the handle is derived from the email
    pub fn add_account(&self, email: &str, secret: &str) -> IdentityHandle {
        let key = normalize(email);
        let handle = IdentityHandle::new(format!("uid-{key}"));
        self.directory.lock().accounts.insert(
            key,
            Account {
                handle: handle.clone(),
                secret: secret.to_string(),
                disabled: false,
                failed_attempts: 0,
            },
        );
        handle
    }

    pub fn disable_account(&self, email: &str) {
        if let Some(account) = self.directory.lock().accounts.get_mut(&normalize(email)) {
            account.disabled = true;
        }
    }

    /// Pretend an earlier run persisted `identity`
    pub fn remember(&self, identity: Identity) {
        self.directory.lock().remembered = Some(identity);
    }

    /// Identity with a live provider-side session
    pub fn current(&self) -> Option<Identity> {
        self.directory.lock().current.clone()
    }

    pub fn remembered(&self) -> Option<Identity> {
        self.directory.lock().remembered.clone()
    }

    /// Handles passed to `invalidate_identity`, oldest first
    pub fn invalidated(&self) -> Vec<IdentityHandle> {
        self.directory.lock().invalidated.clone()
    }

    /// Drop the provider-side session as if it was revoked remotely
    pub fn revoke_current(&self) {
        let mut directory = self.directory.lock();
        directory.current = None;
        self.publish(&directory);
    }

    fn publish(&self, directory: &Directory) {
        let current = directory.current.as_ref().map(|i| i.handle.clone());
        self.changes.send_if_modified(|seen| {
            if *seen == current {
                return false;
            }
            *seen = current;
            true
        });
    }

    /// Addresses that were sent a reset link
    pub fn reset_outbox(&self) -> Vec<String> {
        self.directory.lock().reset_outbox.clone()
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

impl IdentityProvider for InMemoryIdentityProvider {
    async fn verify_credentials(&self, credentials: &Credentials) -> SessionResult<Identity> {
        let key = normalize(&credentials.identifier);
        let mut directory = self.directory.lock();

        let account = directory
            .accounts
            .get_mut(&key)
            .ok_or(SessionError::InvalidCredentials)?;
        if account.disabled {
            return Err(SessionError::AccountDisabled);
        }
        if account.failed_attempts >= self.max_failed_attempts {
            return Err(SessionError::TooManyAttempts);
        }
        if account.secret != *credentials.secret {
            account.failed_attempts += 1;
            return Err(SessionError::InvalidCredentials);
        }

        account.failed_attempts = 0;
        let identity = Identity::new(account.handle.clone(), Some(key));
        directory.current = Some(identity.clone());
        directory.remembered = credentials.remember_me.then(|| identity.clone());
        self.publish(&directory);
        Ok(identity)
    }

    async fn restore_identity(&self) -> SessionResult<Option<Identity>> {
        let mut directory = self.directory.lock();
        if directory.current.is_none() {
            directory.current = directory.remembered.clone();
            self.publish(&directory);
        }
        Ok(directory.current.clone())
    }

    async fn invalidate_identity(&self, handle: &IdentityHandle) -> SessionResult<()> {
        let mut directory = self.directory.lock();
        if directory.current.as_ref().is_some_and(|i| i.handle == *handle) {
            directory.current = None;
        }
        if directory.remembered.as_ref().is_some_and(|i| i.handle == *handle) {
            directory.remembered = None;
        }
        directory.invalidated.push(handle.clone());
        self.publish(&directory);
        Ok(())
    }

    async fn send_reset_link(&self, identifier: &str) -> SessionResult<()> {
        if !identifier.contains('@') {
            return Err(SessionError::InvalidIdentifier);
        }
        let key = normalize(identifier);
        let mut directory = self.directory.lock();
        if !directory.accounts.contains_key(&key) {
            return Err(SessionError::NoSuchAccount);
        }
        directory.reset_outbox.push(key);
        Ok(())
    }

    async fn update_secret(&self, handle: &IdentityHandle, new_secret: &str) -> SessionResult<()> {
        if new_secret.chars().count() < MIN_SECRET_LENGTH {
            return Err(SessionError::Provider("WEAK_PASSWORD".to_string()));
        }
        let mut directory = self.directory.lock();
        if !directory.current.as_ref().is_some_and(|i| i.handle == *handle) {
            return Err(SessionError::NotSignedIn);
        }
        let account = directory
            .accounts
            .values_mut()
            .find(|account| account.handle == *handle)
            .ok_or(SessionError::NotSignedIn)?;
        account.secret = new_secret.to_string();
        Ok(())
    }

    fn identity_changes(&self) -> Option<watch::Receiver<Option<IdentityHandle>>> {
        Some(self.changes.subscribe())
    }
}

// ============================================================================
// Profile store
// ============================================================================

/// Profile map with failure injection
#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: Mutex<HashMap<IdentityHandle, Profile>>,
    writes: Mutex<Vec<(IdentityHandle, ProfileUpdate)>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: IdentityHandle, profile: Profile) {
        self.profiles.lock().insert(handle, profile);
    }

    pub fn get(&self, handle: &IdentityHandle) -> Option<Profile> {
        self.profiles.lock().get(handle).cloned()
    }

    /// Successful writes, oldest first
    pub fn writes(&self) -> Vec<(IdentityHandle, ProfileUpdate)> {
        self.writes.lock().clone()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, handle: &IdentityHandle) -> SessionResult<Option<Profile>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SessionError::Store("profile read rejected".to_string()));
        }
        Ok(self.get(handle))
    }

    async fn write_profile_fields(
        &self,
        handle: &IdentityHandle,
        update: &ProfileUpdate,
    ) -> SessionResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Store("profile write rejected".to_string()));
        }
        let mut profiles = self.profiles.lock();
        let profile = profiles
            .get_mut(handle)
            .ok_or(SessionError::ProfileNotFound)?;
        profile.apply(update);
        self.writes.lock().push((handle.clone(), update.clone()));
        Ok(())
    }
}

// ============================================================================
// Activity source
// ============================================================================

#[derive(Default)]
struct ManualActivityInner {
    listener: Mutex<Option<ActivityListener>>,
    installs: AtomicUsize,
    removals: AtomicUsize,
}

/// Activity source driven by explicit `fire` calls
#[derive(Clone, Default)]
pub struct ManualActivitySource {
    inner: Arc<ManualActivityInner>,
}

impl ManualActivitySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one event. Returns `false` when no listener is installed.
    pub fn fire(&self, kind: ActivityKind) -> bool {
        // clone out so the listener never runs under our lock
        let listener = self.inner.listener.lock().clone();
        match listener {
            Some(listener) => {
                listener.notify(kind);
                true
            }
            None => false,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.inner.listener.lock().is_some()
    }

    pub fn install_count(&self) -> usize {
        self.inner.installs.load(Ordering::SeqCst)
    }

    pub fn remove_count(&self) -> usize {
        self.inner.removals.load(Ordering::SeqCst)
    }
}

impl ActivitySource for ManualActivitySource {
    fn install(&self, listener: ActivityListener) {
        *self.inner.listener.lock() = Some(listener);
        self.inner.installs.fetch_add(1, Ordering::SeqCst);
    }

    fn remove(&self) {
        if self.inner.listener.lock().take().is_some() {
            self.inner.removals.fetch_add(1, Ordering::SeqCst);
        }
    }
}
