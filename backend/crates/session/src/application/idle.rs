//! Idle Detection
//!
//! Pure threshold evaluation plus the periodic task that drives it.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::application::config::SessionConfig;

/// Outcome of one idle check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleVerdict {
    /// Nothing to do
    Active,
    /// Idle time just entered the warning window
    Warn,
    /// Idle timeout reached
    Expire,
}

/// Evaluate idle time against the configured thresholds.
///
/// `Warn` is only returned on the first check inside the window.
pub fn evaluate(idle: Duration, warning_active: bool, config: &SessionConfig) -> IdleVerdict {
    if idle >= config.idle_timeout {
        IdleVerdict::Expire
    } else if idle >= config.warning_threshold() && !warning_active {
        IdleVerdict::Warn
    } else {
        IdleVerdict::Active
    }
}

/// Spawn the repeating idle check.
///
/// `tick` runs once per `period` (first run one period from now) until it
/// returns `false`. The caller owns the handle and aborts it on teardown.
pub(crate) fn spawn_idle_watch<F, Fut>(period: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !tick().await {
                break;
            }
        }
        tracing::trace!("Idle watch stopped");
    })
}
