//! Timing of the create poll loop.

use std::thread;
use std::time::Duration;

/// How long `create` waits for the vault to assign an id.
///
/// Every attempt is preceded by one `interval` pause, so a create that
/// never resolves blocks for `interval * attempts` plus the client calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            attempts: 20,
        }
    }
}

impl PollPolicy {
    /// Upper bound on the time spent pausing.
    pub fn max_wait(&self) -> Duration {
        self.interval.saturating_mul(self.attempts)
    }
}

/// Blocking wait between poll attempts.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

impl<P: Pause + ?Sized> Pause for &P {
    fn pause(&self, duration: Duration) {
        (**self).pause(duration);
    }
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }
}
