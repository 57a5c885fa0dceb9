//! Admin Profile Entity
//!
//! Authorization record keyed by identity handle, stored apart from the
//! identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_object::{ProfileStatus, UserRole};

/// Admin profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub role: UserRole,
    pub status: ProfileStatus,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub login_count: u64,
    pub last_login: Option<DateTime<Utc>>,
    pub last_logout: Option<DateTime<Utc>>,
    pub password_changed_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Fresh active profile with the given role
    pub fn new(role: UserRole) -> Self {
        Self {
            role,
            status: ProfileStatus::Active,
            email: None,
            display_name: None,
            login_count: 0,
            last_login: None,
            last_logout: None,
            password_changed_at: None,
        }
    }

    pub fn with_status(mut self, status: ProfileStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_login_count(mut self, login_count: u64) -> Self {
        self.login_count = login_count;
        self
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(count) = update.login_count {
            self.login_count = count;
        }
        if let Some(at) = update.last_login {
            self.last_login = Some(at);
        }
        if let Some(at) = update.last_logout {
            self.last_logout = Some(at);
        }
        if let Some(at) = update.password_changed_at {
            self.password_changed_at = Some(at);
        }
    }
}

/// Partial profile write. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub login_count: Option<u64>,
    pub last_login: Option<DateTime<Utc>>,
    pub last_logout: Option<DateTime<Utc>>,
    pub password_changed_at: Option<DateTime<Utc>>,
}

impl ProfileUpdate {
    /// Login tracking for a profile that had `previous_count` logins
    pub fn login(previous_count: u64, at: DateTime<Utc>) -> Self {
        Self {
            login_count: Some(previous_count.saturating_add(1)),
            last_login: Some(at),
            ..Default::default()
        }
    }

    pub fn logout(at: DateTime<Utc>) -> Self {
        Self {
            last_logout: Some(at),
            ..Default::default()
        }
    }

    pub fn password_changed(at: DateTime<Utc>) -> Self {
        Self {
            password_changed_at: Some(at),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
