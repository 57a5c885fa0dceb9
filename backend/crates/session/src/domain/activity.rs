//! Activity Port
//!
//! The session core installs one listener while authenticated and removes
//! it on every exit from that state. Sources (UI event hooks, a console,
//! tests) call the listener for each recognized interaction.

use std::fmt;
use std::sync::Arc;

use crate::domain::value_object::ActivityKind;

/// Handle that forwards activity into the session that installed it.
///
/// Cheap to clone. Becomes inert once that session has ended.
#[derive(Clone)]
pub struct ActivityListener {
    sink: Arc<dyn Fn(ActivityKind) + Send + Sync>,
}

impl ActivityListener {
    pub fn new(sink: impl Fn(ActivityKind) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    #[inline]
    pub fn notify(&self, kind: ActivityKind) {
        (self.sink)(kind)
    }
}

impl fmt::Debug for ActivityListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ActivityListener")
    }
}

/// Source of user-activity events
///
/// `install` and `remove` are called while the session state is locked;
/// implementations must not invoke the listener from inside them.
pub trait ActivitySource: Send + Sync + 'static {
    /// Start delivering events to `listener`, replacing any previous one
    fn install(&self, listener: ActivityListener);

    /// Stop delivering events
    fn remove(&self);
}
