use tokio::time::{Duration, Instant};

use crate::state::TextSnapshot;

pub const DEFAULT_DEBOUNCE_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending,
}

#[derive(Debug)]
struct Pending {
    snapshot: TextSnapshot,
    deadline: Instant,
}

/// Holds the latest admitted snapshot until the input has been quiet for
/// `quiet` time. A new submission replaces the pending one and restarts the
/// window, so a burst produces a single fire carrying its last snapshot.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: Option<Pending>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    pub fn state(&self) -> DebounceState {
        if self.pending.is_some() {
            DebounceState::Pending
        } else {
            DebounceState::Idle
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    /// Schedules `snapshot` and returns the one it superseded, if any.
    pub fn submit(&mut self, snapshot: TextSnapshot, now: Instant) -> Option<TextSnapshot> {
        let deadline = now + self.quiet;
        self.pending
            .replace(Pending { snapshot, deadline })
            .map(|superseded| superseded.snapshot)
    }

    /// Takes the pending snapshot once its deadline has passed.
    pub fn fire(&mut self, now: Instant) -> Option<TextSnapshot> {
        match &self.pending {
            Some(pending) if pending.deadline <= now => {
                self.pending.take().map(|pending| pending.snapshot)
            }
            _ => None,
        }
    }

    /// Takes the pending snapshot regardless of its deadline.
    pub fn flush(&mut self) -> Option<TextSnapshot> {
        self.pending.take().map(|pending| pending.snapshot)
    }

    /// Drops the pending snapshot without firing it.
    pub fn cancel(&mut self) -> Option<TextSnapshot> {
        self.flush()
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }
}
