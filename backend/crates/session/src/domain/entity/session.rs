//! Session Entity
//!
//! Read model of the session state machine handed to consumers.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::entity::{identity::Identity, profile::Profile};
use crate::error::SessionError;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Restored-state check still running
    Loading,
    Unauthenticated,
    Authenticated { warning_active: bool },
}

impl SessionState {
    #[inline]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    #[inline]
    pub const fn warning_active(&self) -> bool {
        matches!(
            self,
            Self::Authenticated {
                warning_active: true
            }
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => f.write_str("loading"),
            Self::Unauthenticated => f.write_str("unauthenticated"),
            Self::Authenticated {
                warning_active: false,
            } => f.write_str("authenticated"),
            Self::Authenticated {
                warning_active: true,
            } => f.write_str("authenticated (expiry warning)"),
        }
    }
}

/// Transition that triggered an observer notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Loading finished without a usable identity
    Initialized,
    /// Loading finished with a restored identity
    Restored,
    SignedIn,
    SignInFailed,
    SignedOut,
    /// Idle time entered the warning window
    WarningStarted,
    /// Explicit extend, or activity that cleared a warning
    Extended,
    /// Idle timeout forced a logout
    Expired,
    /// Provider reported the identity gone
    IdentityLost,
    /// Last error acknowledged
    ErrorCleared,
}

/// Point-in-time copy of the session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    pub last_activity_at: Option<Instant>,
    pub error: Option<SessionError>,
}

impl SessionSnapshot {
    pub(crate) fn loading() -> Self {
        Self {
            state: SessionState::Loading,
            identity: None,
            profile: None,
            last_activity_at: None,
            error: None,
        }
    }

    #[inline]
    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    #[inline]
    pub fn warning_active(&self) -> bool {
        self.state.warning_active()
    }

    /// Idle time as of `now`, `None` while signed out
    pub fn idle_for(&self, now: Instant) -> Option<Duration> {
        self.last_activity_at
            .map(|at| now.saturating_duration_since(at))
    }
}
