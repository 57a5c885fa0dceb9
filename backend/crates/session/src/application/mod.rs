//! Application Layer
//!
//! Use cases and the session manager that drives them.

pub mod config;
pub mod idle;
pub mod manager;
pub mod password;
pub mod restore_session;
pub mod sign_in;
pub mod sign_out;

// Re-exports
pub use config::{ConfigError, SessionConfig};
pub use idle::IdleVerdict;
pub use manager::{Observer, SessionManager, SubscriptionId};
pub use password::PasswordUseCase;
pub use restore_session::RestoreSessionUseCase;
pub use sign_in::{SignInOutput, SignInUseCase};
pub use sign_out::SignOutUseCase;
