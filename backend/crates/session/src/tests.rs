//! Scenario tests for the session manager
//! Driven on a paused clock against the in-memory adapters

#[cfg(test)]
mod support {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use crate::application::config::SessionConfig;
    use crate::application::manager::SessionManager;
    use crate::domain::entity::profile::Profile;
    use crate::domain::entity::session::SessionEvent;
    use crate::domain::value_object::{IdentityHandle, UserRole};
    use crate::infra::memory::{InMemoryIdentityProvider, InMemoryProfileStore, ManualActivitySource};

    pub const EMAIL: &str = "ops@example.com";
    pub const SECRET: &str = "correct-horse";

    pub type TestManager =
        SessionManager<InMemoryIdentityProvider, InMemoryProfileStore, ManualActivitySource>;

    pub struct Harness {
        pub manager: TestManager,
        pub provider: Arc<InMemoryIdentityProvider>,
        pub store: Arc<InMemoryProfileStore>,
        pub activity: ManualActivitySource,
        pub handle: IdentityHandle,
        pub events: Arc<Mutex<Vec<SessionEvent>>>,
    }

    impl Harness {
        pub fn events(&self) -> Vec<SessionEvent> {
            self.events.lock().clone()
        }

        pub fn count(&self, event: SessionEvent) -> usize {
            self.events.lock().iter().filter(|e| **e == event).count()
        }
    }

    /// 120s timeout, 30s warning window, checked every 5s
    pub fn config() -> SessionConfig {
        SessionConfig::development()
    }

    /// Account with an active admin profile that has logged in 4 times
    pub fn harness() -> Harness {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let store = Arc::new(InMemoryProfileStore::new());
        let handle = provider.add_account(EMAIL, SECRET);
        store.insert(
            handle.clone(),
            Profile::new(UserRole::Admin)
                .with_email(EMAIL)
                .with_login_count(4),
        );
        harness_with(provider, store, handle)
    }

    pub fn harness_with(
        provider: Arc<InMemoryIdentityProvider>,
        store: Arc<InMemoryProfileStore>,
        handle: IdentityHandle,
    ) -> Harness {
        let activity = ManualActivitySource::new();
        let manager = SessionManager::new(
            Arc::clone(&provider),
            Arc::clone(&store),
            activity.clone(),
            config(),
        );
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        manager.subscribe(move |event, _| sink.lock().push(*event));

        Harness {
            manager,
            provider,
            store,
            activity,
            handle,
            events,
        }
    }

    /// Let spawned timers and teardown tasks run
    pub async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    /// Advance the paused clock and let woken tasks run
    pub async fn idle_for(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
        settle().await;
    }
}

#[cfg(test)]
mod initialize_tests {
    use super::support::*;
    use crate::domain::entity::identity::Identity;
    use crate::domain::entity::session::{SessionEvent, SessionState};

    #[tokio::test(start_paused = true)]
    async fn test_initialize_without_remembered_identity() {
        let h = harness();
        assert_eq!(h.manager.state(), SessionState::Loading);

        h.manager.initialize().await;

        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.events(), vec![SessionEvent::Initialized]);
        assert!(!h.manager.idle_watch_running());
        assert!(!h.activity.is_installed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_restores_remembered_identity() {
        let h = harness();
        h.provider
            .remember(Identity::new(h.handle.clone(), Some(EMAIL.to_string())));

        h.manager.initialize().await;

        assert!(h.manager.is_authenticated());
        assert_eq!(h.events(), vec![SessionEvent::Restored]);
        assert_eq!(h.manager.identity().map(|i| i.handle), Some(h.handle.clone()));
        assert!(h.manager.idle_watch_running());
        assert!(h.activity.is_installed());
        // restore is not a new login
        assert_eq!(h.manager.profile().map(|p| p.login_count), Some(4));
        assert!(h.store.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_fails_closed_without_profile() {
        let h = harness();
        let stranger = h.provider.add_account("stranger@example.com", "hunter22");
        h.provider
            .remember(Identity::new(stranger.clone(), Some("stranger@example.com".into())));

        h.manager.initialize().await;

        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.provider.invalidated(), vec![stranger]);
        assert!(h.provider.current().is_none());
        assert!(h.provider.remembered().is_none());
        assert_eq!(h.events(), vec![SessionEvent::Initialized]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_fails_closed_on_profile_read_error() {
        let h = harness();
        h.provider
            .remember(Identity::new(h.handle.clone(), Some(EMAIL.to_string())));
        h.store.set_fail_reads(true);

        h.manager.initialize().await;

        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.provider.invalidated(), vec![h.handle.clone()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_after_sign_in_keeps_session() {
        let h = harness();
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();

        h.manager.initialize().await;

        assert!(h.manager.is_authenticated());
        assert_eq!(h.events(), vec![SessionEvent::SignedIn]);
        assert_eq!(h.activity.install_count(), 1);
    }
}

#[cfg(test)]
mod sign_in_tests {
    use std::sync::Arc;

    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    use super::support::*;
    use crate::application::manager::SessionManager;
    use crate::domain::entity::identity::{Credentials, Identity};
    use crate::domain::entity::profile::Profile;
    use crate::domain::entity::session::{SessionEvent, SessionState};
    use crate::domain::repository::IdentityProvider;
    use crate::domain::value_object::{IdentityHandle, ProfileStatus, UserRole};
    use crate::error::{SessionError, SessionResult};
    use crate::infra::memory::{InMemoryIdentityProvider, InMemoryProfileStore, ManualActivitySource};

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_increments_login_count() {
        let h = harness();
        h.manager.initialize().await;

        let (identity, profile) = assert_ok!(h.manager.sign_in(EMAIL, SECRET, false).await);

        assert_eq!(identity.handle, h.handle);
        assert_eq!(profile.login_count, 5);
        assert!(profile.last_login.is_some());
        assert_eq!(h.store.get(&h.handle).map(|p| p.login_count), Some(5));
        assert_eq!(h.manager.profile(), Some(profile));
        assert_eq!(
            h.events(),
            vec![SessionEvent::Initialized, SessionEvent::SignedIn]
        );
        assert!(h.manager.idle_watch_running());
        assert!(h.activity.is_installed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_survives_profile_write_failure() {
        let h = harness();
        h.manager.initialize().await;
        h.store.set_fail_writes(true);

        let (_, profile) = assert_ok!(h.manager.sign_in(EMAIL, SECRET, false).await);

        assert_eq!(profile.login_count, 4);
        assert!(profile.last_login.is_none());
        assert!(h.manager.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_without_profile_fails_closed() {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let store = Arc::new(InMemoryProfileStore::new());
        let handle = provider.add_account(EMAIL, SECRET);
        let h = harness_with(provider, store, handle);
        h.manager.initialize().await;

        let err = assert_err!(h.manager.sign_in(EMAIL, SECRET, true).await);

        assert_eq!(err, SessionError::ProfileNotFound);
        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.manager.snapshot().error, Some(SessionError::ProfileNotFound));
        assert_eq!(h.provider.invalidated(), vec![h.handle.clone()]);
        assert!(h.provider.current().is_none());
        assert!(h.provider.remembered().is_none());
        assert_eq!(h.events().last(), Some(&SessionEvent::SignInFailed));
        assert!(!h.activity.is_installed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_refuses_non_active_profiles() {
        for status in [ProfileStatus::Suspended, ProfileStatus::Inactive] {
            let h = harness();
            h.store.insert(
                h.handle.clone(),
                Profile::new(UserRole::Editor).with_status(status),
            );
            h.manager.initialize().await;

            let err = assert_err!(h.manager.sign_in(EMAIL, SECRET, false).await);

            assert_eq!(err, SessionError::AccountSuspended);
            assert_eq!(h.manager.state(), SessionState::Unauthenticated);
            assert_eq!(h.provider.invalidated(), vec![h.handle.clone()]);
            assert!(h.store.writes().is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_fails_closed_on_profile_read_error() {
        let h = harness();
        h.manager.initialize().await;
        h.store.set_fail_reads(true);

        let err = assert_err!(h.manager.sign_in(EMAIL, SECRET, false).await);

        // storage detail stays out of the sign-in error
        assert!(matches!(err, SessionError::Unknown(_)));
        assert_eq!(h.provider.invalidated(), vec![h.handle.clone()]);
        assert!(!h.manager.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_with_wrong_secret() {
        let h = harness();
        h.manager.initialize().await;

        let err = assert_err!(h.manager.sign_in(EMAIL, "wrong-horse", false).await);

        assert_eq!(err, SessionError::InvalidCredentials);
        assert!(err.is_credential_failure());
        assert!(h.provider.invalidated().is_empty());
        assert_eq!(h.manager.snapshot().error, Some(SessionError::InvalidCredentials));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_clears_previous_error() {
        let h = harness();
        h.manager.initialize().await;
        assert_err!(h.manager.sign_in(EMAIL, "wrong-horse", false).await);

        assert_ok!(h.manager.sign_in(EMAIL, SECRET, false).await);

        assert!(h.manager.snapshot().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_replaces_existing_session() {
        let h = harness();
        h.manager.initialize().await;
        assert_ok!(h.manager.sign_in(EMAIL, SECRET, false).await);

        let (_, profile) = assert_ok!(h.manager.sign_in(EMAIL, SECRET, false).await);

        assert_eq!(profile.login_count, 6);
        assert_eq!(h.count(SessionEvent::SignedIn), 2);
        assert_eq!(h.activity.install_count(), 2);
        assert!(h.manager.idle_watch_running());

        // only the latest watch is live
        idle_for(125).await;
        assert_eq!(h.count(SessionEvent::Expired), 1);
    }

    struct GatedProvider {
        inner: InMemoryIdentityProvider,
        gate: Notify,
    }

    impl IdentityProvider for GatedProvider {
        async fn verify_credentials(&self, credentials: &Credentials) -> SessionResult<Identity> {
            self.gate.notified().await;
            self.inner.verify_credentials(credentials).await
        }

        async fn restore_identity(&self) -> SessionResult<Option<Identity>> {
            self.inner.restore_identity().await
        }

        async fn invalidate_identity(&self, handle: &IdentityHandle) -> SessionResult<()> {
            self.inner.invalidate_identity(handle).await
        }

        async fn send_reset_link(&self, identifier: &str) -> SessionResult<()> {
            self.inner.send_reset_link(identifier).await
        }

        async fn update_secret(&self, handle: &IdentityHandle, new_secret: &str) -> SessionResult<()> {
            self.inner.update_secret(handle, new_secret).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_sign_in_is_rejected() {
        let inner = InMemoryIdentityProvider::new();
        let handle = inner.add_account(EMAIL, SECRET);
        let provider = Arc::new(GatedProvider {
            inner,
            gate: Notify::new(),
        });
        let store = Arc::new(InMemoryProfileStore::new());
        store.insert(handle.clone(), Profile::new(UserRole::Admin));
        let manager = SessionManager::new(
            Arc::clone(&provider),
            Arc::clone(&store),
            ManualActivitySource::new(),
            config(),
        );
        manager.initialize().await;

        let first = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.sign_in(EMAIL, SECRET, false).await })
        };
        settle().await;

        let err = assert_err!(manager.sign_in(EMAIL, SECRET, false).await);
        assert_eq!(err, SessionError::SignInInProgress);
        assert!(manager.snapshot().error.is_none());

        provider.gate.notify_one();
        let (identity, _) = assert_ok!(first.await.unwrap());
        assert_eq!(identity.handle, handle);
        assert!(manager.is_authenticated());

        // flag released once the first call finished
        manager.logout().await;
        provider.gate.notify_one();
        assert_ok!(manager.sign_in(EMAIL, SECRET, false).await);
    }
}

#[cfg(test)]
mod idle_tests {
    use tokio::time::Instant;

    use super::support::*;
    use crate::application::idle::IdleVerdict;
    use crate::domain::entity::session::{SessionEvent, SessionState};
    use crate::domain::value_object::ActivityKind;
    use crate::error::SessionError;

    #[tokio::test(start_paused = true)]
    async fn test_warning_starts_before_timeout() {
        let h = harness();
        h.manager.initialize().await;
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();

        idle_for(85).await;
        assert!(!h.manager.snapshot().warning_active());

        idle_for(7).await;
        assert!(h.manager.snapshot().warning_active());
        assert_eq!(h.count(SessionEvent::WarningStarted), 1);

        // no repeat while already warning
        idle_for(20).await;
        assert_eq!(h.count(SessionEvent::WarningStarted), 1);
        assert!(h.manager.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_clears_warning() {
        let h = harness();
        h.manager.initialize().await;
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();
        idle_for(92).await;
        assert!(h.manager.snapshot().warning_active());

        h.manager.extend_session();

        let snapshot = h.manager.snapshot();
        assert_eq!(
            snapshot.state,
            SessionState::Authenticated {
                warning_active: false
            }
        );
        assert_eq!(snapshot.last_activity_at, Some(Instant::now()));
        assert_eq!(h.count(SessionEvent::Extended), 1);

        // the full window is available again
        idle_for(100).await;
        assert!(h.manager.is_authenticated());
        assert_eq!(h.count(SessionEvent::WarningStarted), 2);
        assert_eq!(h.count(SessionEvent::Expired), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_fires_exactly_once() {
        let h = harness();
        h.manager.initialize().await;
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();

        idle_for(125).await;

        let snapshot = h.manager.snapshot();
        assert_eq!(snapshot.state, SessionState::Unauthenticated);
        assert_eq!(snapshot.error, Some(SessionError::SessionExpired));
        assert!(snapshot.identity.is_none());
        assert!(snapshot.profile.is_none());
        assert_eq!(h.count(SessionEvent::Expired), 1);
        assert_eq!(h.count(SessionEvent::WarningStarted), 1);
        assert!(!h.manager.idle_watch_running());
        assert!(!h.activity.is_installed());
        assert_eq!(h.activity.remove_count(), 1);
        assert!(h.provider.current().is_none());
        assert!(h.store.get(&h.handle).unwrap().last_logout.is_some());

        let before = h.events().len();
        idle_for(600).await;
        assert_eq!(h.events().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_clears_warning() {
        let h = harness();
        h.manager.initialize().await;
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();
        idle_for(92).await;
        assert!(h.manager.snapshot().warning_active());

        assert!(h.activity.fire(ActivityKind::KeyDown));

        assert!(!h.manager.snapshot().warning_active());
        assert_eq!(h.count(SessionEvent::Extended), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_without_warning_is_silent() {
        let h = harness();
        h.manager.initialize().await;
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();
        let events = h.events().len();

        idle_for(10).await;
        assert!(h.activity.fire(ActivityKind::PointerMove));
        h.manager.record_activity(ActivityKind::Scroll);

        assert_eq!(h.events().len(), events);
        assert_eq!(h.manager.snapshot().last_activity_at, Some(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_keeps_session_alive() {
        let h = harness();
        h.manager.initialize().await;
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();

        for _ in 0..6 {
            idle_for(60).await;
            h.activity.fire(ActivityKind::Click);
        }

        assert!(h.manager.is_authenticated());
        assert_eq!(h.count(SessionEvent::WarningStarted), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operations_while_signed_out_are_noops() {
        let h = harness();
        h.manager.initialize().await;

        h.manager.extend_session();
        h.manager.record_activity(ActivityKind::TouchStart);

        assert!(!h.activity.fire(ActivityKind::Click));
        assert_eq!(h.manager.check_idle().await, None);
        assert_eq!(h.events(), vec![SessionEvent::Initialized]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_idle_check() {
        let h = harness();
        h.manager.initialize().await;
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();

        assert_eq!(h.manager.check_idle().await, Some(IdleVerdict::Active));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_timers() {
        let h = harness();
        h.manager.initialize().await;
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();

        h.manager.shutdown();
        settle().await;

        assert!(!h.manager.idle_watch_running());
        assert!(!h.activity.is_installed());
        assert!(h.manager.is_authenticated());

        idle_for(600).await;
        assert_eq!(h.count(SessionEvent::Expired), 0);
    }
}

#[cfg(test)]
mod sign_out_tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    use super::support::*;
    use crate::application::manager::SessionManager;
    use crate::domain::entity::profile::{Profile, ProfileUpdate};
    use crate::domain::entity::session::{SessionEvent, SessionState};
    use crate::domain::repository::ProfileStore;
    use crate::domain::value_object::{ActivityKind, IdentityHandle, UserRole};
    use crate::error::{SessionError, SessionResult};
    use crate::infra::memory::{InMemoryIdentityProvider, InMemoryProfileStore, ManualActivitySource};

    /// Holds every `last_logout` write until the gate opens
    struct GatedStore {
        inner: InMemoryProfileStore,
        gate: Notify,
    }

    impl ProfileStore for GatedStore {
        async fn get_profile(&self, handle: &IdentityHandle) -> SessionResult<Option<Profile>> {
            self.inner.get_profile(handle).await
        }

        async fn write_profile_fields(
            &self,
            handle: &IdentityHandle,
            update: &ProfileUpdate,
        ) -> SessionResult<()> {
            if update.last_logout.is_some() {
                self.gate.notified().await;
            }
            self.inner.write_profile_fields(handle, update).await
        }
    }

    struct Gated {
        manager: SessionManager<InMemoryIdentityProvider, GatedStore, ManualActivitySource>,
        provider: Arc<InMemoryIdentityProvider>,
        store: Arc<GatedStore>,
        activity: ManualActivitySource,
        events: Arc<Mutex<Vec<SessionEvent>>>,
    }

    impl Gated {
        fn count(&self, event: SessionEvent) -> usize {
            self.events.lock().iter().filter(|e| **e == event).count()
        }
    }

    async fn signed_in_behind_gate() -> Gated {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let handle = provider.add_account(EMAIL, SECRET);
        let inner = InMemoryProfileStore::new();
        inner.insert(handle, Profile::new(UserRole::Admin).with_email(EMAIL));
        let store = Arc::new(GatedStore {
            inner,
            gate: Notify::new(),
        });
        let activity = ManualActivitySource::new();
        let manager = SessionManager::new(
            Arc::clone(&provider),
            Arc::clone(&store),
            activity.clone(),
            config(),
        );
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        manager.subscribe(move |event, _| sink.lock().push(*event));

        manager.initialize().await;
        manager.sign_in(EMAIL, SECRET, false).await.unwrap();
        Gated {
            manager,
            provider,
            store,
            activity,
            events,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_then_logout_round_trip() {
        let h = harness();
        h.manager.initialize().await;
        let before = h.manager.snapshot();

        h.manager.sign_in(EMAIL, SECRET, true).await.unwrap();
        h.manager.logout().await;

        let after = h.manager.snapshot();
        assert_eq!(after.state, before.state);
        assert_eq!(after.identity, before.identity);
        assert_eq!(after.profile, before.profile);
        assert_eq!(after.last_activity_at, before.last_activity_at);
        assert_eq!(after.error, before.error);

        assert_eq!(h.activity.install_count(), h.activity.remove_count());
        assert!(!h.activity.is_installed());
        assert!(!h.manager.idle_watch_running());
        assert!(h.provider.current().is_none());
        assert!(h.provider.remembered().is_none());
        assert!(h.store.get(&h.handle).unwrap().last_logout.is_some());
        assert_eq!(
            h.events(),
            vec![
                SessionEvent::Initialized,
                SessionEvent::SignedIn,
                SessionEvent::SignedOut
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_is_idempotent() {
        let h = harness();
        h.manager.initialize().await;
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();

        h.manager.logout().await;
        h.manager.logout().await;

        assert_eq!(h.count(SessionEvent::SignedOut), 1);
        assert_eq!(h.activity.remove_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_survives_store_failure() {
        let h = harness();
        h.manager.initialize().await;
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();
        h.store.set_fail_writes(true);

        h.manager.logout().await;

        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert!(h.provider.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_listener_after_logout() {
        let h = harness();
        h.manager.initialize().await;
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();
        h.manager.logout().await;

        assert!(!h.activity.fire(ActivityKind::KeyDown));
        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_loss_ends_session() {
        let h = harness();
        h.manager.initialize().await;
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();

        h.manager.handle_identity_change(Some(h.handle.clone())).await;
        assert!(h.manager.is_authenticated());

        h.manager.handle_identity_change(None).await;

        let snapshot = h.manager.snapshot();
        assert_eq!(snapshot.state, SessionState::Unauthenticated);
        assert!(snapshot.error.is_none());
        assert_eq!(h.count(SessionEvent::IdentityLost), 1);
        assert!(!h.activity.is_installed());
        assert!(!h.manager.idle_watch_running());
        // only the login was written
        assert_eq!(h.store.writes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_change_to_other_principal() {
        let h = harness();
        h.manager.initialize().await;
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();

        h.manager
            .handle_identity_change(Some("uid-someone-else".into()))
            .await;

        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.count(SessionEvent::IdentityLost), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_revocation_ends_session() {
        let h = harness();
        h.manager.initialize().await;
        assert!(h.manager.following_identity());
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();

        h.provider.revoke_current();
        settle().await;

        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.count(SessionEvent::IdentityLost), 1);
        assert!(!h.activity.is_installed());
        assert!(!h.manager.idle_watch_running());
        // the provider already dropped it
        assert!(h.provider.invalidated().is_empty());

        h.manager.shutdown();
        assert!(!h.manager.following_identity());
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_logout_is_not_identity_loss() {
        let h = harness();
        h.manager.initialize().await;
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();

        h.manager.logout().await;
        settle().await;

        assert_eq!(h.count(SessionEvent::SignedOut), 1);
        assert_eq!(h.count(SessionEvent::IdentityLost), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_during_logout_keeps_new_session() {
        let g = signed_in_behind_gate().await;

        let logout = {
            let manager = g.manager.clone();
            tokio::spawn(async move { manager.logout().await })
        };
        settle().await;
        assert_ok!(g.manager.sign_in(EMAIL, SECRET, false).await);

        g.store.gate.notify_one();
        logout.await.unwrap();

        assert!(g.manager.is_authenticated());
        assert!(g.provider.current().is_some());
        assert!(g.provider.invalidated().is_empty());
        assert_eq!(g.count(SessionEvent::SignedOut), 0);
        assert_ok!(g.manager.change_password("brand-new-secret").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_logout_still_signs_out() {
        let g = signed_in_behind_gate().await;

        let logout = {
            let manager = g.manager.clone();
            tokio::spawn(async move { manager.logout().await })
        };
        settle().await;
        g.manager.shutdown();

        g.store.gate.notify_one();
        logout.await.unwrap();

        assert_eq!(g.manager.state(), SessionState::Unauthenticated);
        assert_eq!(g.count(SessionEvent::SignedOut), 1);
        assert!(g.provider.current().is_none());
        assert!(!g.activity.is_installed());

        g.manager.logout().await;
        assert_eq!(g.count(SessionEvent::SignedOut), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_password_reset() {
        let h = harness();
        h.manager.initialize().await;

        assert_ok!(h.manager.reset_password(" ops@example.com ").await);
        assert_eq!(h.provider.reset_outbox(), vec![EMAIL.to_string()]);

        assert_eq!(
            assert_err!(h.manager.reset_password("").await),
            SessionError::InvalidIdentifier
        );
        assert_eq!(
            assert_err!(h.manager.reset_password("not-an-email").await),
            SessionError::InvalidIdentifier
        );
        assert_eq!(
            assert_err!(h.manager.reset_password("nobody@example.com").await),
            SessionError::NoSuchAccount
        );
        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_password() {
        let h = harness();
        h.manager.initialize().await;
        assert_eq!(
            assert_err!(h.manager.change_password("brand-new-secret").await),
            SessionError::NotSignedIn
        );

        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();
        assert_eq!(
            assert_err!(h.manager.change_password("abc").await),
            SessionError::Provider("WEAK_PASSWORD".to_string())
        );
        assert_ok!(h.manager.change_password("brand-new-secret").await);

        assert!(h.manager.is_authenticated());
        assert!(h.store.get(&h.handle).unwrap().password_changed_at.is_some());

        h.manager.logout().await;
        assert_err!(h.manager.sign_in(EMAIL, SECRET, false).await);
        assert_ok!(h.manager.sign_in(EMAIL, "brand-new-secret", false).await);
    }
}

#[cfg(test)]
mod observer_tests {
    use super::support::*;
    use crate::domain::entity::session::SessionEvent;

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_stops_notifications() {
        let h = harness();
        let extra = h.manager.subscribe(|_, _| panic!("unsubscribed observer called"));
        assert!(h.manager.unsubscribe(extra));
        assert!(!h.manager.unsubscribe(extra));

        h.manager.initialize().await;

        assert_eq!(h.events(), vec![SessionEvent::Initialized]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_post_transition_snapshot() {
        let h = harness();
        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        h.manager
            .subscribe(move |event, snapshot| sink.lock().push((*event, snapshot.is_authenticated())));

        h.manager.initialize().await;
        h.manager.sign_in(EMAIL, SECRET, false).await.unwrap();
        h.manager.logout().await;

        assert_eq!(
            *seen.lock(),
            vec![
                (SessionEvent::Initialized, false),
                (SessionEvent::SignedIn, true),
                (SessionEvent::SignedOut, false),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_error() {
        let h = harness();
        h.manager.initialize().await;
        let _ = h.manager.sign_in(EMAIL, "wrong-horse", false).await;

        h.manager.clear_error();
        h.manager.clear_error();

        assert!(h.manager.snapshot().error.is_none());
        assert_eq!(h.count(SessionEvent::ErrorCleared), 1);
    }
}
