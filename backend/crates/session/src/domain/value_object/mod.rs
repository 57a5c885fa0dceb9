//! Value Object Module

pub mod activity_kind;
pub mod identity_handle;
pub mod profile_status;
pub mod user_role;

pub use activity_kind::ActivityKind;
pub use identity_handle::IdentityHandle;
pub use profile_status::ProfileStatus;
pub use user_role::UserRole;
