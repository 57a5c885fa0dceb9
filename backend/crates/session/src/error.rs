//! Session Error Types
//!
//! One taxonomy for every failure the session core surfaces: credential
//! failures from the identity provider, authorization failures from the
//! profile check, and lifecycle errors such as idle expiry.

use thiserror::Error;

/// Session result type alias
pub type SessionResult<T> = Result<T, SessionError>;

/// Session error variants
///
/// Cloneable so the last error can live in the session snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Wrong identifier or secret
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Account disabled at the identity provider
    #[error("This account has been disabled")]
    AccountDisabled,

    /// Provider throttled the account
    #[error("Too many failed attempts. Please try again later")]
    TooManyAttempts,

    /// Valid credential without an admin profile
    #[error("No admin profile exists for this account")]
    ProfileNotFound,

    /// Profile is suspended or inactive
    #[error("Your account has been suspended. Please contact an administrator")]
    AccountSuspended,

    /// Operation needs a signed-in identity
    #[error("You must be signed in to do that")]
    NotSignedIn,

    /// Idle timeout elapsed
    #[error("Your session has expired. Please sign in again")]
    SessionExpired,

    /// Reset requested for an unknown account
    #[error("No account found with this email")]
    NoSuchAccount,

    /// Malformed identifier
    #[error("Invalid email address")]
    InvalidIdentifier,

    /// A sign-in is already running
    #[error("A sign-in attempt is already in progress")]
    SignInInProgress,

    /// Identity provider transport or protocol failure
    #[error("Identity provider error: {0}")]
    Provider(String),

    /// Profile store failure
    #[error("Profile store error: {0}")]
    Store(String),

    /// Anything the provider reports that has no mapping
    #[error("An unexpected error occurred: {0}")]
    Unknown(String),
}

impl SessionError {
    /// Stable machine-readable code
    pub const fn code(&self) -> &'static str {
        match self {
            SessionError::InvalidCredentials => "invalid_credentials",
            SessionError::AccountDisabled => "account_disabled",
            SessionError::TooManyAttempts => "too_many_attempts",
            SessionError::ProfileNotFound => "profile_not_found",
            SessionError::AccountSuspended => "account_suspended",
            SessionError::NotSignedIn => "not_signed_in",
            SessionError::SessionExpired => "session_expired",
            SessionError::NoSuchAccount => "no_such_account",
            SessionError::InvalidIdentifier => "invalid_identifier",
            SessionError::SignInInProgress => "sign_in_in_progress",
            SessionError::Provider(_) => "provider",
            SessionError::Store(_) => "store",
            SessionError::Unknown(_) => "unknown",
        }
    }

    /// Errors that must read like an ordinary rejected sign-in
    pub const fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidCredentials
                | SessionError::AccountDisabled
                | SessionError::TooManyAttempts
                | SessionError::ProfileNotFound
                | SessionError::AccountSuspended
        )
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            SessionError::Provider(msg) => {
                tracing::error!(message = %msg, "Identity provider error");
            }
            SessionError::Store(msg) => {
                tracing::error!(message = %msg, "Profile store error");
            }
            SessionError::Unknown(msg) => {
                tracing::error!(message = %msg, "Unmapped session error");
            }
            SessionError::ProfileNotFound | SessionError::AccountSuspended => {
                tracing::warn!(code = self.code(), "Sign-in rejected by profile check");
            }
            SessionError::InvalidCredentials | SessionError::TooManyAttempts => {
                tracing::warn!(code = self.code(), "Invalid sign-in attempt");
            }
            _ => {
                tracing::debug!(error = %self, "Session error");
            }
        }
    }
}

impl From<sqlx::Error> for SessionError {
    fn from(err: sqlx::Error) -> Self {
        SessionError::Store(err.to_string())
    }
}

impl From<platform::credential_store::StoreError> for SessionError {
    fn from(err: platform::credential_store::StoreError) -> Self {
        SessionError::Provider(err.to_string())
    }
}
