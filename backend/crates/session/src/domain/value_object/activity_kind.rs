//! Recognized user-activity events

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of user interaction that counts as activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PointerDown,
    PointerMove,
    KeyDown,
    Scroll,
    TouchStart,
    Click,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 6] = [
        ActivityKind::PointerDown,
        ActivityKind::PointerMove,
        ActivityKind::KeyDown,
        ActivityKind::Scroll,
        ActivityKind::TouchStart,
        ActivityKind::Click,
    ];

    /// Browser event name this kind corresponds to
    #[inline]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::PointerDown => "mousedown",
            Self::PointerMove => "mousemove",
            Self::KeyDown => "keypress",
            Self::Scroll => "scroll",
            Self::TouchStart => "touchstart",
            Self::Click => "click",
        }
    }

    #[inline]
    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.event_name() == name)
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}
