//! Integration tests for the refresh timing policy and timer slot.
//!
//! Uses `#[tokio::test(start_paused = true)]` so time only moves when
//! every task is idle, and then jumps straight to the next deadline.
//! Delays are therefore observed exactly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use authforge_refresh::{FireDelay, RefreshPolicy, TimerKind, TimerSlot};
use tokio::sync::oneshot;

// =========================================================================
// Helpers
// =========================================================================

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

// =========================================================================
// proactive_delay
// =========================================================================

#[test]
fn test_long_lived_session_fires_sixty_seconds_early() {
    let p = RefreshPolicy::default();
    assert_eq!(p.proactive_delay(3600), FireDelay::After(secs(3540)));
    assert_eq!(p.proactive_delay(61), FireDelay::After(secs(1)));
}

#[test]
fn test_short_lived_session_fires_one_second_early() {
    let p = RefreshPolicy::default();
    assert_eq!(p.proactive_delay(60), FireDelay::After(secs(59)));
    assert_eq!(p.proactive_delay(30), FireDelay::After(secs(29)));
    assert_eq!(p.proactive_delay(2), FireDelay::After(secs(1)));
}

#[test]
fn test_nearly_expired_session_fires_immediately() {
    let p = RefreshPolicy::default();
    assert_eq!(p.proactive_delay(1), FireDelay::Immediate);
    assert_eq!(p.proactive_delay(0), FireDelay::Immediate);
    assert_eq!(p.proactive_delay(-3600), FireDelay::Immediate);
}

#[test]
fn test_backoff_delays_strictly_increase() {
    let p = RefreshPolicy::default();
    let delays: Vec<_> = (1..10).map(|k| p.backoff_delay(k)).collect();
    assert!(delays.windows(2).all(|w| w[0] < w[1]));
}

// =========================================================================
// TimerSlot
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_armed_timer_fires_after_delay() {
    let mut slot = TimerSlot::new();
    let (tx, rx) = oneshot::channel();
    let start = tokio::time::Instant::now();

    slot.arm(secs(5), TimerKind::Proactive, move |_| {
        let _ = tx.send(tokio::time::Instant::now());
    });

    let fired_at = rx.await.expect("timer should fire");
    assert_eq!(fired_at - start, secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_remaining_reports_exact_delay_while_paused() {
    let mut slot = TimerSlot::new();
    slot.arm(secs(3540), TimerKind::Proactive, |_| {});

    assert!(slot.is_armed());
    assert_eq!(slot.kind(), Some(TimerKind::Proactive));
    assert_eq!(slot.remaining(), Some(secs(3540)));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_prevents_fire() {
    let fired = Arc::new(AtomicU32::new(0));
    let mut slot = TimerSlot::new();
    let f = Arc::clone(&fired);
    slot.arm(secs(1), TimerKind::Proactive, move |_| {
        f.fetch_add(1, Ordering::SeqCst);
    });

    assert!(slot.cancel());
    assert!(!slot.is_armed());
    assert!(!slot.cancel(), "second cancel is a no-op");

    tokio::time::sleep(secs(10)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rearm_replaces_previous_timer() {
    let fired = Arc::new(AtomicU32::new(0));
    let mut slot = TimerSlot::new();

    let f = Arc::clone(&fired);
    slot.arm(secs(1), TimerKind::Proactive, move |_| {
        f.fetch_add(1, Ordering::SeqCst);
    });
    let f = Arc::clone(&fired);
    slot.arm(secs(2), TimerKind::Backoff { attempt: 1 }, move |_| {
        f.fetch_add(10, Ordering::SeqCst);
    });

    assert_eq!(slot.kind(), Some(TimerKind::Backoff { attempt: 1 }));
    tokio::time::sleep(secs(5)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 10, "only the newest timer fires");
}

#[tokio::test(start_paused = true)]
async fn test_disarm_if_only_matches_current_timer() {
    let mut slot = TimerSlot::new();
    let old = slot.arm(secs(1), TimerKind::Proactive, |_| {});
    let new = slot.arm(secs(1), TimerKind::Proactive, |_| {});

    assert!(!slot.disarm_if(old), "stale id must not clear the slot");
    assert!(slot.is_armed());
    assert!(slot.disarm_if(new));
    assert!(!slot.is_armed());
}

#[tokio::test(start_paused = true)]
async fn test_fire_callback_receives_its_own_id() {
    let mut slot = TimerSlot::new();
    let (tx, rx) = oneshot::channel();
    let id = slot.arm(secs(1), TimerKind::Proactive, move |fired| {
        let _ = tx.send(fired);
    });
    assert_eq!(rx.await.unwrap(), id);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_slot_cancels_timer() {
    let fired = Arc::new(AtomicU32::new(0));
    {
        let mut slot = TimerSlot::new();
        let f = Arc::clone(&fired);
        slot.arm(secs(1), TimerKind::Proactive, move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
    }
    tokio::time::sleep(secs(5)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}
