//! Session layer configuration and scheduler introspection.

use std::sync::Arc;
use std::time::Duration;

use authforge_refresh::{RefreshPolicy, TimerKind};

use crate::{Clock, SystemClock};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lead time, backoff and retry ceiling.
    pub policy: RefreshPolicy,
    /// Source of "now" for expiry arithmetic.
    pub clock: Arc<dyn Clock>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            policy: RefreshPolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

// ---------------------------------------------------------------------------
// SchedulerState
// ---------------------------------------------------------------------------

/// Where the refresh scheduler currently is.
///
/// ```text
///   Idle ──(install)──→ Pending ──(fire)──→ Refreshing
///    ↑                     ↑                    │
///    │                     └──(transient)───────┤
///    └──────────(success → install, or fatal)───┘
/// ```
///
/// A successful refresh installs the new session, which normally arms a
/// fresh proactive timer, so the scheduler goes straight back to
/// `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing armed and nothing in flight.
    Idle,
    /// A timer is armed.
    Pending { kind: TimerKind, fires_in: Duration },
    /// A refresh network call is outstanding.
    Refreshing,
}
