//! Synchronous broadcast of session lifecycle events.
//!
//! Subscribers are plain callbacks. [`EventBus::publish`] invokes every
//! subscriber registered at the moment of the call, in registration order,
//! before it returns. A subscriber that panics is logged and skipped; the
//! remaining subscribers still run.
//!
//! Callbacks run on whatever task published the event, so they must not
//! block. Consumers that want to do async work can use
//! [`EventBus::subscribe_channel`] and drain the receiver on their own task.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use authforge_protocol::{AuthChangeEvent, AuthState, Session};
use tokio::sync::mpsc;

/// Handle returned by [`EventBus::subscribe`]; pass it to
/// [`EventBus::unsubscribe`] to stop receiving events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Listener = Arc<dyn Fn(&AuthState) + Send + Sync>;

/// Registry of auth state subscribers.
pub struct EventBus {
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a callback for every future event.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        tracing::debug!(subscription = %id, "auth state subscriber added");
        id
    }

    /// Registers a subscriber that forwards every event into a channel.
    ///
    /// Events are dropped silently once the receiver is gone; call
    /// [`unsubscribe`](Self::unsubscribe) with the returned ID to remove
    /// the subscriber itself.
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<AuthState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(move |state| {
            let _ = tx.send(state.clone());
        });
        (id, rx)
    }

    /// Removes a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        let removed = listeners.len() != before;
        if removed {
            tracing::debug!(subscription = %id, "auth state subscriber removed");
        }
        removed
    }

    /// Delivers `event` with `session` to every current subscriber.
    ///
    /// The subscriber list is snapshotted first, so callbacks may subscribe
    /// or unsubscribe without deadlocking; such changes apply from the next
    /// publish on. Returns the number of callbacks that completed normally.
    pub fn publish(&self, event: AuthChangeEvent, session: Option<Session>) -> usize {
        let snapshot: Vec<(SubscriptionId, Listener)> = self.lock().clone();
        let state = AuthState { event, session };
        tracing::debug!(%event, subscribers = snapshot.len(), "publishing auth event");

        let mut delivered = 0;
        for (id, listener) in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(&state))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::warn!(subscription = %id, %event, "auth state subscriber panicked");
                }
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authforge_protocol::User;

    fn recorder(bus: &EventBus) -> (SubscriptionId, Arc<Mutex<Vec<AuthChangeEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = bus.subscribe(move |state| sink.lock().unwrap().push(state.event));
        (id, seen)
    }

    #[test]
    fn test_publish_reaches_every_subscriber_in_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            bus.subscribe(move |_| order.lock().unwrap().push(n));
        }

        let delivered = bus.publish(AuthChangeEvent::SignedIn, None);

        assert_eq!(delivered, 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_publish_carries_session() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        bus.subscribe(move |state| *sink.lock().unwrap() = Some(state.clone()));

        let session = Session::new("a", User::new("u"));
        bus.publish(AuthChangeEvent::TokenRefreshed, Some(session.clone()));

        let state = seen.lock().unwrap().clone().unwrap();
        assert_eq!(state.event, AuthChangeEvent::TokenRefreshed);
        assert_eq!(state.session, Some(session));
    }

    #[test]
    fn test_unsubscribed_listener_gets_nothing() {
        let bus = EventBus::new();
        let (id, seen) = recorder(&bus);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id), "second unsubscribe is a no-op");
        bus.publish(AuthChangeEvent::SignedOut, None);

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_panicking_subscriber_does_not_stop_the_rest() {
        let bus = EventBus::new();
        bus.subscribe(|_| panic!("subscriber bug"));
        let (_, seen) = recorder(&bus);

        let delivered = bus.publish(AuthChangeEvent::UserUpdated, None);

        assert_eq!(delivered, 1);
        assert_eq!(*seen.lock().unwrap(), vec![AuthChangeEvent::UserUpdated]);
    }

    #[test]
    fn test_subscriber_added_during_publish_sees_next_event_only() {
        let bus = Arc::new(EventBus::new());
        let late = Arc::new(Mutex::new(Vec::new()));
        {
            let bus_ref = Arc::clone(&bus);
            let late = Arc::clone(&late);
            bus.subscribe(move |state| {
                if state.event == AuthChangeEvent::SignedIn {
                    let late = Arc::clone(&late);
                    bus_ref.subscribe(move |s| late.lock().unwrap().push(s.event));
                }
            });
        }

        bus.publish(AuthChangeEvent::SignedIn, None);
        assert!(late.lock().unwrap().is_empty());

        bus.publish(AuthChangeEvent::SignedOut, None);
        assert_eq!(*late.lock().unwrap(), vec![AuthChangeEvent::SignedOut]);
    }

    #[tokio::test]
    async fn test_channel_subscriber_receives_events() {
        let bus = EventBus::new();
        let (_, mut rx) = bus.subscribe_channel();

        bus.publish(AuthChangeEvent::SignedIn, None);
        bus.publish(AuthChangeEvent::SignedOut, None);

        assert_eq!(rx.recv().await.unwrap().event, AuthChangeEvent::SignedIn);
        assert_eq!(rx.recv().await.unwrap().event, AuthChangeEvent::SignedOut);
    }
}
