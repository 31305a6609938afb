//! Hook for the network half of a token refresh.
//!
//! The session layer decides *when* to refresh and what to do with the
//! outcome; it does not know how to talk to the service. That is the
//! [`TokenRefresher`]'s job. The auth client implements it on top of its
//! transport, and tests implement it with scripted outcomes.

use std::future::Future;

use authforge_protocol::Session;

use crate::SessionError;

/// Exchanges a refresh token for a new session.
///
/// # Outcomes
///
/// - `Ok(Some(session))`: refreshed.
/// - `Ok(None)`: the call succeeded but the response held no session.
///   The scheduler treats this as fatal.
/// - `Err(e)` with `e.is_transient()`: retried with backoff.
/// - any other `Err`: fatal, delivered to all waiting callers.
///
/// The returned future must be `Send`; refresh attempts run on spawned
/// Tokio tasks.
pub trait TokenRefresher: Send + Sync + 'static {
    fn refresh(
        &self,
        refresh_token: &str,
        access_token: Option<&str>,
    ) -> impl Future<Output = Result<Option<Session>, SessionError>> + Send;
}
