//! Identity Entity
//!
//! What the identity provider hands back for an authenticated principal,
//! and the credential bundle handed to it.

use std::fmt;

use serde::Serialize;
use zeroize::Zeroizing;

use crate::domain::value_object::IdentityHandle;

/// Authenticated principal as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub handle: IdentityHandle,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(handle: impl Into<IdentityHandle>, email: Option<String>) -> Self {
        Self {
            handle: handle.into(),
            email,
        }
    }
}

/// Sign-in credentials
///
/// The secret is wiped from memory on drop.
pub struct Credentials {
    /// Email address
    pub identifier: String,
    /// Password
    pub secret: Zeroizing<String>,
    /// Ask the provider to persist the identity across restarts
    pub remember_me: bool,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>, remember_me: bool) -> Self {
        Self {
            identifier: identifier.into().trim().to_string(),
            secret: Zeroizing::new(secret.into()),
            remember_me,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"[REDACTED]")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}
