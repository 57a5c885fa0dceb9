//! Identity Handle Value Object
//!
//! Opaque principal id issued by the identity provider. The session core
//! never interprets it; it only keys profile lookups and provider calls.

use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(transparent)]
#[display("{_0}")]
pub struct IdentityHandle(String);

impl IdentityHandle {
    #[inline]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for IdentityHandle {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for IdentityHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for IdentityHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
