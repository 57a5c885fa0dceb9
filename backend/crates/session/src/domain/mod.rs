//! Domain Layer
//!
//! Contains entities, value objects, and the ports the session core
//! consumes (identity provider, profile store, activity source).

pub mod activity;
pub mod entity;
pub mod repository;
pub mod value_object;

// Re-exports
pub use activity::{ActivityListener, ActivitySource};
pub use entity::{
    identity::{Credentials, Identity},
    profile::{Profile, ProfileUpdate},
    session::{SessionEvent, SessionSnapshot, SessionState},
};
pub use repository::{IdentityProvider, ProfileStore};
