//! Session Manager
//!
//! Owns the in-memory session and is the only writer of it. Consumers hold
//! a clone of the manager, trigger operations, read snapshots and subscribe
//! to transitions.
//!
//! ## Lifecycle
//! - `Loading` until [`SessionManager::initialize`] resolves the restored identity
//! - entering `Authenticated` spawns the idle watch and installs the activity listener
//! - every exit (logout, idle expiry, identity loss) aborts the watch and removes the listener
//! - providers that push identity changes are followed from `initialize` until `shutdown`
//!
//! Each authenticated lifetime gets a new generation number. Timers and
//! listeners carry the generation they were created for and turn into
//! no-ops once it is stale.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::application::config::SessionConfig;
use crate::application::idle::{self, IdleVerdict};
use crate::application::password::PasswordUseCase;
use crate::application::restore_session::RestoreSessionUseCase;
use crate::application::sign_in::{SignInOutput, SignInUseCase};
use crate::application::sign_out::SignOutUseCase;
use crate::domain::activity::{ActivityListener, ActivitySource};
use crate::domain::entity::{
    identity::{Credentials, Identity},
    profile::Profile,
    session::{SessionEvent, SessionSnapshot, SessionState},
};
use crate::domain::repository::{IdentityProvider, ProfileStore};
use crate::domain::value_object::{ActivityKind, IdentityHandle};
use crate::error::{SessionError, SessionResult};

/// Transition callback
pub type Observer = Arc<dyn Fn(&SessionEvent, &SessionSnapshot) + Send + Sync>;

/// Handle returned by [`SessionManager::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    Logout,
    Expired,
    IdentityLost,
}

impl EndReason {
    const fn event(self) -> SessionEvent {
        match self {
            EndReason::Logout => SessionEvent::SignedOut,
            EndReason::Expired => SessionEvent::Expired,
            EndReason::IdentityLost => SessionEvent::IdentityLost,
        }
    }
}

struct SessionInner {
    snapshot: SessionSnapshot,
    generation: u64,
    /// Logout/expiry in progress; the remote half has not finished yet
    ending: bool,
    idle_task: Option<JoinHandle<()>>,
}

impl SessionInner {
    /// Authenticated, not ending, and (when given) still on `generation`
    fn is_live(&self, generation: Option<u64>) -> bool {
        !self.ending
            && self.snapshot.is_authenticated()
            && generation.is_none_or(|g| g == self.generation)
    }

    fn stop_idle_watch(&mut self) {
        if let Some(handle) = self.idle_task.take() {
            handle.abort();
        }
    }
}

struct Inner<P, S, A> {
    provider: Arc<P>,
    store: Arc<S>,
    activity: A,
    config: SessionConfig,
    session: Mutex<SessionInner>,
    identity_task: Mutex<Option<JoinHandle<()>>>,
    observers: Mutex<Vec<(SubscriptionId, Observer)>>,
    next_subscription: AtomicU64,
    sign_in_in_flight: AtomicBool,
}

/// Session manager
pub struct SessionManager<P, S, A> {
    inner: Arc<Inner<P, S, A>>,
}

impl<P, S, A> Clone for SessionManager<P, S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, S, A> fmt::Debug for SessionManager<P, S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.inner.session.lock();
        f.debug_struct("SessionManager")
            .field("state", &session.snapshot.state)
            .field("generation", &session.generation)
            .finish()
    }
}

impl<P, S, A> SessionManager<P, S, A>
where
    P: IdentityProvider + Sync + 'static,
    S: ProfileStore + Sync + 'static,
    A: ActivitySource,
{
    /// Create a manager in the `Loading` state.
    ///
    /// `config` is expected to pass [`SessionConfig::validate`].
    pub fn new(provider: Arc<P>, store: Arc<S>, activity: A, config: SessionConfig) -> Self {
        debug_assert!(config.validate().is_ok(), "invalid session config");
        Self {
            inner: Arc::new(Inner {
                provider,
                store,
                activity,
                config,
                session: Mutex::new(SessionInner {
                    snapshot: SessionSnapshot::loading(),
                    generation: 0,
                    ending: false,
                    idle_task: None,
                }),
                identity_task: Mutex::new(None),
                observers: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
                sign_in_in_flight: AtomicBool::new(false),
            }),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.session.lock().snapshot.clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.session.lock().snapshot.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.session.lock().snapshot.identity.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.inner.session.lock().snapshot.profile.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Whether the periodic idle check is currently scheduled
    pub fn idle_watch_running(&self) -> bool {
        self.inner
            .session
            .lock()
            .idle_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Whether provider identity changes are being followed
    pub fn following_identity(&self) -> bool {
        self.inner
            .identity_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Register a callback invoked after every transition
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent, &SessionSnapshot) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.inner.observers.lock().push((id, Arc::new(observer)));
        id
    }

    /// Returns `false` when the id was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.inner.observers.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Resolve the `Loading` state from the provider's restored identity.
    ///
    /// Also starts following the provider's identity changes, if it pushes any.
    pub async fn initialize(&self) {
        self.inner.spawn_identity_watch();

        let restored = RestoreSessionUseCase::new(
            Arc::clone(&self.inner.provider),
            Arc::clone(&self.inner.store),
        )
        .execute()
        .await;

        match restored {
            Some(output) => {
                if !self
                    .inner
                    .enter_authenticated(output, SessionEvent::Restored, true)
                {
                    tracing::debug!("Restored identity ignored, session already resolved");
                }
            }
            None => self.inner.finish_loading(),
        }
    }

    /// Sign in and open an authenticated session.
    ///
    /// A second call while one is in flight fails with `SignInInProgress`.
    pub async fn sign_in(
        &self,
        identifier: &str,
        secret: &str,
        remember_me: bool,
    ) -> SessionResult<(Identity, Profile)> {
        let _in_flight = InFlightGuard::acquire(&self.inner.sign_in_in_flight)
            .ok_or(SessionError::SignInInProgress)?;

        self.inner.clear_error_silently();
        let credentials = Credentials::new(identifier, secret, remember_me);
        let result = SignInUseCase::new(
            Arc::clone(&self.inner.provider),
            Arc::clone(&self.inner.store),
        )
        .execute(&credentials)
        .await;

        match result {
            Ok(output) => {
                let identity = output.identity.clone();
                let profile = output.profile.clone();
                self.inner
                    .enter_authenticated(output, SessionEvent::SignedIn, false);
                Ok((identity, profile))
            }
            Err(e) => {
                e.log();
                self.inner.record_failure(e.clone());
                Err(e)
            }
        }
    }

    /// End the session. No-op when nobody is signed in.
    pub async fn logout(&self) {
        self.inner.clear_error_silently();
        self.inner.end_session(EndReason::Logout).await;
    }

    /// Send a password reset link
    pub async fn reset_password(&self, identifier: &str) -> SessionResult<()> {
        self.inner.clear_error_silently();
        PasswordUseCase::new(
            Arc::clone(&self.inner.provider),
            Arc::clone(&self.inner.store),
        )
        .reset(identifier)
        .await
    }

    /// Change the signed-in principal's secret. The session stays open.
    pub async fn change_password(&self, new_secret: &str) -> SessionResult<()> {
        self.inner.clear_error_silently();
        let handle = {
            let session = self.inner.session.lock();
            if !session.is_live(None) {
                return Err(SessionError::NotSignedIn);
            }
            session
                .snapshot
                .identity
                .as_ref()
                .map(|identity| identity.handle.clone())
                .ok_or(SessionError::NotSignedIn)?
        };

        PasswordUseCase::new(
            Arc::clone(&self.inner.provider),
            Arc::clone(&self.inner.store),
        )
        .change(&handle, new_secret)
        .await
    }

    /// Refresh activity and dismiss an expiry warning
    pub fn extend_session(&self) {
        if self.inner.touch(None, true) {
            tracing::debug!("Session extended");
        }
    }

    /// Implicit activity. No I/O; notifies only when a warning is cleared.
    pub fn record_activity(&self, kind: ActivityKind) {
        if self.inner.touch(None, false) {
            tracing::trace!(kind = %kind, "Activity recorded");
        }
    }

    /// Provider push: the current principal changed or disappeared
    pub async fn handle_identity_change(&self, current: Option<IdentityHandle>) {
        self.inner.on_identity_change(current).await;
    }

    /// Run one idle check now. `None` when no session is being watched.
    pub async fn check_idle(&self) -> Option<IdleVerdict> {
        self.inner.run_idle_check(None).await
    }

    /// Acknowledge the last error
    pub fn clear_error(&self) {
        let snapshot = {
            let mut session = self.inner.session.lock();
            if session.snapshot.error.take().is_none() {
                return;
            }
            session.snapshot.clone()
        };
        self.inner.notify(SessionEvent::ErrorCleared, &snapshot);
    }

    /// Tear down the idle watch, activity listener and identity follower
    /// without touching session fields. For process exit or when the owning
    /// UI goes away. A logout already under way still completes.
    pub fn shutdown(&self) {
        if let Some(task) = self.inner.identity_task.lock().take() {
            task.abort();
        }
        let mut session = self.inner.session.lock();
        session.stop_idle_watch();
        if !session.ending {
            session.generation += 1;
            self.inner.activity.remove();
        }
        tracing::debug!("Session manager shut down");
    }
}

impl<P, S, A> Inner<P, S, A>
where
    P: IdentityProvider + Sync + 'static,
    S: ProfileStore + Sync + 'static,
    A: ActivitySource,
{
    fn spawn_identity_watch(self: &Arc<Self>) {
        let Some(mut changes) = self.provider.identity_changes() else {
            return;
        };
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let current = changes.borrow_and_update().clone();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.on_identity_change(current).await;
            }
            tracing::trace!("Identity follower stopped");
        });
        if let Some(previous) = self.identity_task.lock().replace(task) {
            previous.abort();
        }
    }

    /// A switch to another principal while a sign-in is in flight is that
    /// sign-in's own verification; the sign-in replaces the session itself.
    async fn on_identity_change(self: &Arc<Self>, current: Option<IdentityHandle>) {
        let switching = self.sign_in_in_flight.load(Ordering::Acquire);
        let lost = {
            let session = self.session.lock();
            match (&session.snapshot.identity, &current) {
                (Some(_), None) => session.is_live(None),
                (Some(identity), Some(handle)) => {
                    !switching && session.is_live(None) && identity.handle != *handle
                }
                (None, _) => false,
            }
        };

        if lost {
            tracing::warn!("Identity provider reported the signed-in identity gone");
            self.end_session(EndReason::IdentityLost).await;
        }
    }

    fn notify(&self, event: SessionEvent, snapshot: &SessionSnapshot) {
        tracing::debug!(event = ?event, state = %snapshot.state, "Session transition");
        let observers: Vec<Observer> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer(&event, snapshot);
        }
    }

    fn clear_error_silently(&self) {
        self.session.lock().snapshot.error = None;
    }

    fn finish_loading(&self) {
        let snapshot = {
            let mut session = self.session.lock();
            if session.snapshot.state != SessionState::Loading {
                return;
            }
            session.snapshot.state = SessionState::Unauthenticated;
            session.snapshot.clone()
        };
        tracing::info!("No restorable session");
        self.notify(SessionEvent::Initialized, &snapshot);
    }

    fn record_failure(&self, error: SessionError) {
        let snapshot = {
            let mut session = self.session.lock();
            session.snapshot.error = Some(error);
            session.snapshot.clone()
        };
        self.notify(SessionEvent::SignInFailed, &snapshot);
    }

    /// Returns `false` when `require_loading` is set and loading already ended
    fn enter_authenticated(
        self: &Arc<Self>,
        output: SignInOutput,
        event: SessionEvent,
        require_loading: bool,
    ) -> bool {
        let snapshot = {
            let mut session = self.session.lock();
            if require_loading && session.snapshot.state != SessionState::Loading {
                return false;
            }
            if let Some(previous) = &session.snapshot.identity {
                tracing::debug!(identity = %previous.handle, "Replacing existing session");
            }

            session.stop_idle_watch();
            session.generation += 1;
            session.ending = false;
            let generation = session.generation;

            session.snapshot = SessionSnapshot {
                state: SessionState::Authenticated {
                    warning_active: false,
                },
                identity: Some(output.identity),
                profile: Some(output.profile),
                last_activity_at: Some(Instant::now()),
                error: None,
            };
            session.idle_task = Some(self.spawn_idle_watch(generation));
            self.activity.install(self.activity_listener(generation));
            session.snapshot.clone()
        };

        self.notify(event, &snapshot);
        true
    }

    fn spawn_idle_watch(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        idle::spawn_idle_watch(self.config.check_interval, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => matches!(
                        inner.run_idle_check(Some(generation)).await,
                        Some(IdleVerdict::Active | IdleVerdict::Warn)
                    ),
                    None => false,
                }
            }
        })
    }

    fn activity_listener(self: &Arc<Self>, generation: u64) -> ActivityListener {
        let weak = Arc::downgrade(self);
        ActivityListener::new(move |kind| {
            if let Some(inner) = weak.upgrade() {
                if inner.touch(Some(generation), false) {
                    tracing::trace!(kind = %kind, "Activity recorded");
                }
            }
        })
    }

    /// Move `last_activity_at` forward and clear the warning.
    ///
    /// Returns `false` when there is no live session to touch.
    fn touch(&self, generation: Option<u64>, explicit: bool) -> bool {
        let snapshot = {
            let mut session = self.session.lock();
            if !session.is_live(generation) {
                return false;
            }

            let now = Instant::now();
            let latest = session
                .snapshot
                .last_activity_at
                .map_or(now, |at| at.max(now));
            session.snapshot.last_activity_at = Some(latest);

            let was_warning = session.snapshot.warning_active();
            session.snapshot.state = SessionState::Authenticated {
                warning_active: false,
            };
            if !explicit && !was_warning {
                return true;
            }
            session.snapshot.clone()
        };

        self.notify(SessionEvent::Extended, &snapshot);
        true
    }

    async fn run_idle_check(self: &Arc<Self>, generation: Option<u64>) -> Option<IdleVerdict> {
        let (verdict, idle, snapshot) = {
            let mut session = self.session.lock();
            if !session.is_live(generation) {
                return None;
            }

            let idle = session
                .snapshot
                .idle_for(Instant::now())
                .unwrap_or_default();
            let verdict = idle::evaluate(idle, session.snapshot.warning_active(), &self.config);
            if verdict == IdleVerdict::Warn {
                session.snapshot.state = SessionState::Authenticated {
                    warning_active: true,
                };
            }
            (verdict, idle, session.snapshot.clone())
        };

        match verdict {
            IdleVerdict::Active => {}
            IdleVerdict::Warn => {
                tracing::debug!(idle_secs = idle.as_secs(), "Session expiry warning raised");
                self.notify(SessionEvent::WarningStarted, &snapshot);
            }
            IdleVerdict::Expire => {
                tracing::info!(idle_secs = idle.as_secs(), "Idle timeout reached, forcing logout");
                self.end_session(EndReason::Expired).await;
            }
        }
        Some(verdict)
    }

    /// Two-phase teardown.
    ///
    /// The first phase runs under the lock: it marks the session as ending,
    /// stops the idle watch and invalidates the generation so no timer or
    /// listener can act on it again. The second phase (profile write,
    /// provider invalidation, clearing fields) runs on its own task so it
    /// completes even if the caller is cancelled.
    async fn end_session(self: &Arc<Self>, reason: EndReason) {
        let begun = {
            let mut session = self.session.lock();
            if session.ending || !session.snapshot.is_authenticated() {
                None
            } else {
                session.ending = true;
                session.generation += 1;
                session.stop_idle_watch();
                session
                    .snapshot
                    .identity
                    .as_ref()
                    .map(|identity| (identity.handle.clone(), session.generation))
            }
        };
        let Some((handle, generation)) = begun else {
            return;
        };

        let inner = Arc::clone(self);
        let teardown =
            tokio::spawn(async move { inner.finish_end(reason, handle, generation).await });
        if let Err(e) = teardown.await {
            if !e.is_cancelled() {
                tracing::error!(error = %e, "Session teardown task failed");
            }
        }
    }

    async fn finish_end(&self, reason: EndReason, handle: IdentityHandle, generation: u64) {
        if reason != EndReason::IdentityLost {
            let sign_out = SignOutUseCase::new(Arc::clone(&self.provider), Arc::clone(&self.store));
            sign_out.record_logout(&handle).await;

            // a sign-in that landed during the profile write owns the provider session now
            if self.session.lock().generation != generation {
                tracing::debug!(identity = %handle, "Teardown superseded by a newer session");
                return;
            }
            sign_out.invalidate(&handle).await;
        }

        let snapshot = {
            let mut session = self.session.lock();
            if session.generation != generation {
                tracing::debug!(identity = %handle, "Teardown superseded by a newer session");
                return;
            }

            self.activity.remove();
            session.ending = false;
            session.snapshot = SessionSnapshot {
                state: SessionState::Unauthenticated,
                identity: None,
                profile: None,
                last_activity_at: None,
                error: (reason == EndReason::Expired).then_some(SessionError::SessionExpired),
            };
            session.snapshot.clone()
        };

        tracing::info!(identity = %handle, reason = ?reason, "Session ended");
        self.notify(reason.event(), &snapshot);
    }
}

impl<P, S, A> Drop for Inner<P, S, A> {
    fn drop(&mut self) {
        if let Some(handle) = self.session.get_mut().idle_task.take() {
            handle.abort();
        }
        if let Some(handle) = self.identity_task.get_mut().take() {
            handle.abort();
        }
    }
}

/// Clears the in-flight flag when the sign-in future completes or is dropped
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
