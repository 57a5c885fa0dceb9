//! Profile Status Value Object
//!
//! Authorization status of an admin profile. Only `Active` profiles may
//! hold a session; anything else fails the sign-in closed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Admin profile status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    /// Normal account - may sign in
    #[default]
    Active,

    /// Suspended by an administrator
    Suspended,

    /// Deactivated (e.g. staff member left)
    Inactive,
}

impl ProfileStatus {
    /// Get string code for storage
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Inactive => "inactive",
        }
    }

    /// Check if a session may be granted
    #[inline]
    pub const fn can_sign_in(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Create from string code
    #[inline]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
