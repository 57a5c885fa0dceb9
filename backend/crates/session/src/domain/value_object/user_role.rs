use serde::{Deserialize, Serialize};
use std::fmt;

/// Back-office role carried by an admin profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Viewer,
    Editor,
    Admin,
    SuperAdmin,
}

impl UserRole {
    #[inline]
    pub const fn code(&self) -> &'static str {
        use UserRole::*;
        match self {
            Viewer => "viewer",
            Editor => "editor",
            Admin => "admin",
            SuperAdmin => "super_admin",
        }
    }

    /// Movies, shows and catalogue metadata
    #[inline]
    pub const fn can_manage_content(&self) -> bool {
        use UserRole::*;
        matches!(self, Editor | Admin | SuperAdmin)
    }

    /// Platform settings and other staff accounts
    #[inline]
    pub const fn can_manage_settings(&self) -> bool {
        use UserRole::*;
        matches!(self, Admin | SuperAdmin)
    }

    #[inline]
    pub fn from_code(code: &str) -> Option<Self> {
        use UserRole::*;
        match code {
            "viewer" => Some(Viewer),
            "editor" => Some(Editor),
            "admin" => Some(Admin),
            "super_admin" => Some(SuperAdmin),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
