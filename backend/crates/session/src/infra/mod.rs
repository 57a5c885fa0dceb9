//! Infrastructure Layer
//!
//! Adapters for the identity provider, profile store, and activity source ports.

pub mod identity_toolkit;
pub mod memory;
pub mod postgres;

pub use identity_toolkit::ToolkitIdentityProvider;
pub use memory::{InMemoryIdentityProvider, InMemoryProfileStore, ManualActivitySource};
pub use postgres::PgProfileStore;
