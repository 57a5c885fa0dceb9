//! Admin Session Core
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, ports (identity provider, profile store, activity source)
//! - `application/` - Use cases and the session manager
//! - `infra/` - Identity Toolkit, PostgreSQL and in-memory adapters
//!
//! ## Security Model
//! - An identity without an active admin profile is signed out at the provider (fail closed)
//! - Idle sessions are warned before the timeout and forcibly ended at it
//! - Secrets are wiped from memory on drop and never logged

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

// Re-exports for convenience
pub use application::config::{ConfigError, SessionConfig};
pub use application::idle::IdleVerdict;
pub use application::manager::{Observer, SessionManager, SubscriptionId};
pub use domain::{
    ActivityListener, ActivitySource, Identity, IdentityProvider, Profile, ProfileStore,
    ProfileUpdate, SessionEvent, SessionSnapshot, SessionState,
};
pub use domain::value_object::{ActivityKind, IdentityHandle, ProfileStatus, UserRole};
pub use error::{SessionError, SessionResult};

#[cfg(test)]
mod tests;
