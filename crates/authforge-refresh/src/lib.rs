//! Refresh timing for Authforge.
//!
//! Two building blocks used by the session layer:
//!
//! - [`RefreshPolicy`]: the arithmetic: how long before expiry to fire a
//!   proactive refresh, and how long to back off after a transient
//!   failure.
//! - [`TimerSlot`]: a slot holding at most one armed Tokio timer.
//!   Arming replaces whatever was armed before; cancelling aborts it.
//!
//! # Timeline
//!
//! ```text
//! install ──(expires_in − lead)──→ fire ──→ refresh
//!                                            │ transient failure k
//!                                            ▼
//!                               retry after interval × 2^k
//! ```

mod timer;

pub use timer::{TimerId, TimerKind, TimerSlot};

use std::time::Duration;

use rand::Rng;
use tracing::warn;

// ---------------------------------------------------------------------------
// Fire delay
// ---------------------------------------------------------------------------

/// When a proactive refresh should happen, as computed by
/// [`RefreshPolicy::proactive_delay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDelay {
    /// The session is (nearly) expired: refresh right away.
    Immediate,
    /// Arm a timer for this long.
    After(Duration),
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Timing configuration for proactive refresh and retry backoff.
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    /// Arm timers when a refreshable session is installed. When `false`
    /// sessions are only refreshed on explicit request.
    pub auto_refresh: bool,
    /// How many seconds before expiry to refresh a long-lived session.
    /// Default: 60.
    pub lead_secs: i64,
    /// Lead used when the session has `lead_secs` or less left.
    /// Default: 1.
    pub short_lead_secs: i64,
    /// Base interval for exponential backoff. Default: 200 ms.
    pub retry_interval: Duration,
    /// Consecutive transient failures after which a refresh gives up.
    /// Default: 10.
    pub max_retries: u32,
    /// Exclusive upper bound of random jitter added to each backoff delay.
    /// Default: zero (no jitter).
    pub retry_jitter: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            auto_refresh: true,
            lead_secs: 60,
            short_lead_secs: 1,
            retry_interval: Duration::from_millis(200),
            max_retries: 10,
            retry_jitter: Duration::ZERO,
        }
    }
}

impl RefreshPolicy {
    /// Clamp and fix any out-of-range values so the policy is safe to use.
    ///
    /// Rules:
    /// - `max_retries` is at least 1 (a refresh is always attempted once).
    /// - `short_lead_secs` is at least 0 and at most `lead_secs`.
    /// - `retry_interval` is at least 1 ms.
    pub fn validated(mut self) -> Self {
        if self.max_retries == 0 {
            warn!("max_retries of 0 would never attempt a refresh; using 1");
            self.max_retries = 1;
        }
        if self.lead_secs < 0 {
            warn!(lead_secs = self.lead_secs, "negative lead_secs; using 0");
            self.lead_secs = 0;
        }
        self.short_lead_secs = self.short_lead_secs.clamp(0, self.lead_secs);
        if self.retry_interval.is_zero() {
            warn!("zero retry_interval; using 1 ms");
            self.retry_interval = Duration::from_millis(1);
        }
        self
    }

    /// Decides when to refresh a session that expires in `expires_in`
    /// seconds.
    ///
    /// Sessions with more than `lead_secs` left are refreshed `lead_secs`
    /// early; shorter ones `short_lead_secs` early. A non-positive result
    /// means "now".
    pub fn proactive_delay(&self, expires_in: i64) -> FireDelay {
        let lead = if expires_in > self.lead_secs {
            self.lead_secs
        } else {
            self.short_lead_secs
        };
        let delay = expires_in.saturating_sub(lead);
        if delay > 0 {
            FireDelay::After(Duration::from_secs(delay as u64))
        } else {
            FireDelay::Immediate
        }
    }

    /// Whether another attempt is allowed after `failures` consecutive
    /// transient failures.
    pub fn should_retry(&self, failures: u32) -> bool {
        failures < self.max_retries
    }

    /// Backoff before the retry that follows the `failures`-th transient
    /// failure: `retry_interval × 2^failures`, plus jitter if configured.
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
        let base = self.retry_interval.saturating_mul(factor);
        base.saturating_add(self.jitter())
    }

    fn jitter(&self) -> Duration {
        let max_us = self.retry_jitter.as_micros() as u64;
        if max_us == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::rng().random_range(0..max_us))
    }
}
