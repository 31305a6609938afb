//! A slot that holds at most one armed timer.
//!
//! The session layer has exactly one "next thing to do" at any time: a
//! proactive refresh before expiry, or a retry after a failed refresh.
//! [`TimerSlot`] enforces that: arming a new timer aborts the previous
//! one, so an old timer can never fire after a newer one was armed.
//!
//! Timers run as spawned Tokio tasks; arming must happen inside a Tokio
//! runtime.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// What an armed timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Refresh ahead of expiry.
    Proactive,
    /// Retry after the `attempt`-th consecutive transient failure.
    Backoff { attempt: u32 },
}

/// Identifies one arming of a [`TimerSlot`].
///
/// The fire callback receives its own ID so it can tell whether it is
/// still the armed timer (see [`TimerSlot::disarm_if`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct ArmedTimer {
    id: TimerId,
    kind: TimerKind,
    deadline: Instant,
    handle: JoinHandle<()>,
}

/// Holds at most one pending timer.
pub struct TimerSlot {
    next_id: u64,
    armed: Option<ArmedTimer>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            armed: None,
        }
    }

    /// Arms a timer that calls `on_fire` after `delay`, replacing (and
    /// aborting) any timer already armed.
    ///
    /// `on_fire` runs synchronously on the timer's task once the delay has
    /// elapsed. It should call [`disarm_if`](Self::disarm_if) with the ID it
    /// receives before doing anything else.
    pub fn arm<F>(&mut self, delay: Duration, kind: TimerKind, on_fire: F) -> TimerId
    where
        F: FnOnce(TimerId) + Send + 'static,
    {
        self.cancel();

        let id = TimerId(self.next_id);
        self.next_id += 1;
        let deadline = Instant::now() + delay;

        let handle = tokio::spawn(async move {
            time::sleep_until(deadline).await;
            trace!(?kind, "timer fired");
            on_fire(id);
        });

        debug!(?kind, delay_ms = delay.as_millis() as u64, "timer armed");
        self.armed = Some(ArmedTimer {
            id,
            kind,
            deadline,
            handle,
        });
        id
    }

    /// Aborts the armed timer, if any. Returns `true` if one was armed.
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some(timer) => {
                timer.handle.abort();
                debug!(kind = ?timer.kind, "timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Clears the slot if `id` is the armed timer, without aborting it.
    ///
    /// Used by a fire callback to mark its own timer as consumed. Returns
    /// `false` if a different timer has been armed since (or the slot was
    /// cancelled), in which case the caller's fire is stale.
    pub fn disarm_if(&mut self, id: TimerId) -> bool {
        if self.armed.as_ref().is_some_and(|t| t.id == id) {
            self.armed = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn kind(&self) -> Option<TimerKind> {
        self.armed.as_ref().map(|t| t.kind)
    }

    /// Time left until the armed timer fires.
    pub fn remaining(&self) -> Option<Duration> {
        self.armed
            .as_ref()
            .map(|t| t.deadline.saturating_duration_since(Instant::now()))
    }
}

impl Default for TimerSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for TimerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerSlot")
            .field("kind", &self.kind())
            .field("remaining", &self.remaining())
            .finish()
    }
}
