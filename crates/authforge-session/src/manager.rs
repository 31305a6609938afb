//! The session manager: the current session and its refresh lifecycle.
//!
//! This is the central piece of the session layer. It's responsible for:
//! - Holding the current session (at most one) and its user
//! - Arming a proactive refresh timer whenever a refreshable session is
//!   installed
//! - Running refreshes through a [`TokenRefresher`], retrying transient
//!   failures with exponential backoff
//! - Collapsing concurrent refresh requests into one network call
//! - Publishing `tokenRefreshed` and `signedIn` after a successful refresh
//!
//! # Concurrency note
//!
//! All mutable state lives behind one `std::sync::Mutex`. The lock is never
//! held across an `.await` and never held while subscribers run: events
//! are published after the guard is dropped. Refresh attempts and timer
//! callbacks run on spawned Tokio tasks and re-enter through the same lock.
//!
//! # Generations
//!
//! Every `install` and `clear` bumps a generation counter. Timers and
//! refresh attempts remember the generation they were started under; when
//! they come back and find a newer generation, their result is stale. A
//! stale refresh still settles its own callers, but it never installs a
//! session, publishes an event or arms a timer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use authforge_protocol::{AuthChangeEvent, Session, User};
use authforge_refresh::{FireDelay, RefreshPolicy, TimerId, TimerKind, TimerSlot};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::oneshot;

use crate::{Clock, EventBus, SchedulerState, SessionConfig, SessionError, TokenRefresher};

/// The outcome of a refresh, shared by every caller that asked for it.
///
/// Cloning a `RefreshFuture` does not start another refresh; all clones
/// resolve to the same result.
pub type RefreshFuture = Shared<BoxFuture<'static, Result<Session, SessionError>>>;

/// Owns the current session and keeps it fresh.
///
/// Cheap to clone; clones share the same state.
///
/// ## Lifecycle
///
/// ```text
/// install() ──→ [proactive timer] ──(fire)──→ refresh ──ok──→ install()
///                                               │
///                                   transient ──┤── fatal ──→ callers get Err
///                                               ▼
///                                      [backoff timer] ──→ refresh
/// clear() ──→ no session, nothing armed
/// ```
///
/// Methods that may arm a timer or start a refresh (`install`,
/// `request_refresh`) must be called from within a Tokio runtime.
pub struct SessionManager<R: TokenRefresher> {
    inner: Arc<Inner<R>>,
}

impl<R: TokenRefresher> Clone for SessionManager<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<R> {
    refresher: R,
    policy: RefreshPolicy,
    clock: Arc<dyn Clock>,
    events: EventBus,
    state: Mutex<ManagerState>,
}

struct ManagerState {
    current: Option<Session>,
    /// Consecutive transient failures of the pending refresh.
    retry_count: u32,
    generation: u64,
    timer: TimerSlot,
    pending: Option<PendingRefresh>,
    next_refresh_id: u64,
}

/// The refresh every caller is currently waiting on.
struct PendingRefresh {
    id: u64,
    future: RefreshFuture,
    /// `false` while waiting out a backoff delay.
    in_flight: bool,
}

/// Everything one refresh needs across its attempts. Dropping the job
/// without sending on `reply` settles its callers with
/// [`SessionError::RefreshCancelled`].
struct RefreshJob {
    id: u64,
    generation: u64,
    refresh_token: String,
    access_token: Option<String>,
    reply: oneshot::Sender<Result<Session, SessionError>>,
}

impl ManagerState {
    /// Starts a new generation: nothing armed, nothing pending, no retries.
    fn reset_lifecycle(&mut self) {
        self.generation += 1;
        self.retry_count = 0;
        self.timer.cancel();
        if self.pending.take().is_some() {
            tracing::debug!("pending refresh detached from the session");
        }
    }

    fn is_current(&self, job: &RefreshJob) -> bool {
        self.generation == job.generation
            && self.pending.as_ref().is_some_and(|p| p.id == job.id)
    }
}

impl<R: TokenRefresher> SessionManager<R> {
    pub fn new(refresher: R, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                refresher,
                policy: config.policy.validated(),
                clock: config.clock,
                events: EventBus::new(),
                state: Mutex::new(ManagerState {
                    current: None,
                    retry_count: 0,
                    generation: 0,
                    timer: TimerSlot::new(),
                    pending: None,
                    next_refresh_id: 0,
                }),
            }),
        }
    }

    // -----------------------------------------------------------------
    // Store
    // -----------------------------------------------------------------

    /// The current session, if any.
    pub fn current_session(&self) -> Option<Session> {
        self.inner.lock().current.clone()
    }

    /// The user of the current session, if any.
    pub fn current_user(&self) -> Option<User> {
        self.inner.lock().current.as_ref().map(|s| s.user().clone())
    }

    /// Makes `session` the current session.
    ///
    /// Cancels any armed timer, detaches any pending refresh and resets the
    /// retry count. If the session has a refresh token and an expiry (and
    /// auto refresh is on), a proactive refresh is armed; a session that is
    /// already at its refresh point is refreshed right away. Callers of a
    /// refresh that was backing off get [`SessionError::RefreshCancelled`],
    /// as with [`clear`](Self::clear).
    ///
    /// Does not publish anything; the caller decides which event fits.
    pub fn install(&self, session: Session) {
        let mut state = self.inner.lock();
        Inner::install_locked(&self.inner, &mut state, session);
    }

    /// Swaps the user of the current session, leaving tokens, timers and
    /// any pending refresh alone. Returns the updated session, or `None`
    /// if there is no session.
    pub fn set_user(&self, user: User) -> Option<Session> {
        let mut state = self.inner.lock();
        let updated = state.current.take().map(|s| s.with_user(user));
        state.current.clone_from(&updated);
        updated
    }

    /// Removes the current session. Cancels any armed timer and detaches
    /// any pending refresh.
    ///
    /// A refresh call already in flight settles its callers with its own
    /// result. A refresh waiting out a backoff delay is dropped instead, and
    /// its callers get [`SessionError::RefreshCancelled`] rather than
    /// waiting on a retry that will never run.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.reset_lifecycle();
        if state.current.take().is_some() {
            tracing::info!("session cleared");
        }
    }

    // -----------------------------------------------------------------
    // Refresh
    // -----------------------------------------------------------------

    /// Requests a refresh with the given tokens.
    ///
    /// If a refresh is already pending (in flight or backing off), no new
    /// call is made and the returned future resolves with that refresh's
    /// outcome. Otherwise a new refresh starts and the retry count is
    /// reset.
    ///
    /// On success the new session is installed and `tokenRefreshed` then
    /// `signedIn` are published before the future resolves.
    pub fn request_refresh(&self, refresh_token: &str, access_token: Option<&str>) -> RefreshFuture {
        let mut state = self.inner.lock();
        Inner::start_refresh_locked(
            &self.inner,
            &mut state,
            refresh_token.to_string(),
            access_token.map(str::to_owned),
        )
    }

    /// [`request_refresh`](Self::request_refresh), awaited.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        access_token: Option<&str>,
    ) -> Result<Session, SessionError> {
        self.request_refresh(refresh_token, access_token).await
    }

    // -----------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------

    pub fn scheduler_state(&self) -> SchedulerState {
        let state = self.inner.lock();
        if state.pending.as_ref().is_some_and(|p| p.in_flight) {
            return SchedulerState::Refreshing;
        }
        match (state.timer.kind(), state.timer.remaining()) {
            (Some(kind), Some(fires_in)) => SchedulerState::Pending { kind, fires_in },
            _ => SchedulerState::Idle,
        }
    }

    /// Consecutive transient failures of the current refresh.
    pub fn retry_count(&self) -> u32 {
        self.inner.lock().retry_count
    }

    /// Current Unix time according to the configured clock.
    pub fn now(&self) -> i64 {
        self.inner.clock.now()
    }

    // -----------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Publishes `event` with the current session.
    pub fn notify(&self, event: AuthChangeEvent) -> usize {
        let session = self.current_session();
        self.inner.events.publish(event, session)
    }
}

impl<R: TokenRefresher> Inner<R> {
    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn install_locked(this: &Arc<Self>, state: &mut ManagerState, session: Session) {
        state.reset_lifecycle();

        let expires_in = session.remaining_secs(this.clock.now());
        let tokens = session
            .refresh_token()
            .map(|rt| (rt.to_string(), session.access_token().to_string()));
        tracing::info!(
            user = %session.user().id,
            expires_at = ?session.expires_at(),
            "session installed"
        );
        state.current = Some(session);

        if !this.policy.auto_refresh {
            return;
        }
        let (Some((refresh_token, access_token)), Some(expires_in)) = (tokens, expires_in) else {
            tracing::debug!("session has no refresh token or expiry, not scheduling a refresh");
            return;
        };

        match this.policy.proactive_delay(expires_in) {
            FireDelay::After(delay) => {
                let generation = state.generation;
                let inner = Arc::clone(this);
                state.timer.arm(delay, TimerKind::Proactive, move |id| {
                    Inner::on_proactive_fire(&inner, id, generation);
                });
            }
            FireDelay::Immediate => {
                tracing::debug!(expires_in, "session is at its refresh point, refreshing now");
                let _ = Inner::start_refresh_locked(this, state, refresh_token, Some(access_token));
            }
        }
    }

    fn start_refresh_locked(
        this: &Arc<Self>,
        state: &mut ManagerState,
        refresh_token: String,
        access_token: Option<String>,
    ) -> RefreshFuture {
        if let Some(pending) = &state.pending {
            tracing::debug!(refresh_id = pending.id, "joining pending refresh");
            return pending.future.clone();
        }

        let (reply, rx) = oneshot::channel();
        let future = rx
            .map(|outcome| outcome.unwrap_or(Err(SessionError::RefreshCancelled)))
            .boxed()
            .shared();

        state.next_refresh_id += 1;
        let id = state.next_refresh_id;
        state.retry_count = 0;
        state.pending = Some(PendingRefresh {
            id,
            future: future.clone(),
            in_flight: true,
        });

        let job = RefreshJob {
            id,
            generation: state.generation,
            refresh_token,
            access_token,
            reply,
        };
        tokio::spawn(Inner::run_attempt(Arc::clone(this), job));
        future
    }

    fn on_proactive_fire(this: &Arc<Self>, id: TimerId, generation: u64) {
        let mut state = this.lock();
        if !state.timer.disarm_if(id) || state.generation != generation {
            tracing::trace!("stale proactive timer ignored");
            return;
        }
        let Some(tokens) = state.current.as_ref().and_then(|s| {
            s.refresh_token()
                .map(|rt| (rt.to_string(), s.access_token().to_string()))
        }) else {
            return;
        };
        tracing::debug!("proactive refresh fired");
        let _ = Inner::start_refresh_locked(this, &mut state, tokens.0, Some(tokens.1));
    }

    fn on_backoff_fire(this: &Arc<Self>, id: TimerId, job: RefreshJob) {
        {
            let mut state = this.lock();
            if !state.timer.disarm_if(id) || !state.is_current(&job) {
                tracing::trace!(refresh_id = job.id, "stale backoff timer ignored");
                return;
            }
            if let Some(pending) = state.pending.as_mut() {
                pending.in_flight = true;
            }
        }
        tokio::spawn(Inner::run_attempt(Arc::clone(this), job));
    }

    async fn run_attempt(this: Arc<Self>, job: RefreshJob) {
        tracing::debug!(refresh_id = job.id, "refreshing access token");
        let outcome = this
            .refresher
            .refresh(&job.refresh_token, job.access_token.as_deref())
            .await;
        Inner::settle_attempt(&this, job, outcome);
    }

    /// Applies the outcome of one attempt: install, schedule a retry, or
    /// give up. Subscribers and callers are notified after the lock is
    /// released.
    fn settle_attempt(
        this: &Arc<Self>,
        job: RefreshJob,
        outcome: Result<Option<Session>, SessionError>,
    ) {
        let mut refreshed = None;
        let result = {
            let mut state = this.lock();
            let current = state.is_current(&job);

            match outcome {
                Ok(Some(session)) if current => {
                    state.pending = None;
                    Inner::install_locked(this, &mut state, session.clone());
                    tracing::info!(refresh_id = job.id, "access token refreshed");
                    refreshed = Some(session.clone());
                    Ok(session)
                }
                Ok(Some(session)) => {
                    tracing::debug!(refresh_id = job.id, "session changed during refresh, result not installed");
                    Ok(session)
                }
                Ok(None) => {
                    if current {
                        state.pending = None;
                    }
                    tracing::warn!(refresh_id = job.id, "refresh response carried no session");
                    Err(SessionError::InvalidSessionData)
                }
                Err(SessionError::Transport(err)) if current && err.is_transient() => {
                    state.retry_count += 1;
                    let failures = state.retry_count;

                    if this.policy.should_retry(failures) {
                        let delay = this.policy.backoff_delay(failures);
                        tracing::warn!(
                            refresh_id = job.id,
                            attempt = failures,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "token refresh failed, retrying"
                        );
                        if let Some(pending) = state.pending.as_mut() {
                            pending.in_flight = false;
                        }
                        let inner = Arc::clone(this);
                        state.timer.arm(delay, TimerKind::Backoff { attempt: failures }, move |id| {
                            Inner::on_backoff_fire(&inner, id, job);
                        });
                        return;
                    }

                    state.pending = None;
                    tracing::warn!(
                        refresh_id = job.id,
                        attempts = failures,
                        error = %err,
                        "token refresh gave up"
                    );
                    Err(SessionError::RetryLimitExceeded {
                        attempts: failures,
                        last: err,
                    })
                }
                Err(err) => {
                    if current {
                        state.pending = None;
                    }
                    tracing::warn!(refresh_id = job.id, error = %err, "token refresh failed");
                    Err(err)
                }
            }
        };

        if let Some(session) = refreshed {
            this.events
                .publish(AuthChangeEvent::TokenRefreshed, Some(session.clone()));
            this.events.publish(AuthChangeEvent::SignedIn, Some(session));
        }
        let _ = job.reply.send(result);
    }
}

impl<R: TokenRefresher> std::fmt::Debug for SessionManager<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("SessionManager")
            .field("has_session", &state.current.is_some())
            .field("retry_count", &state.retry_count)
            .field("timer", &state.timer)
            .field("refresh_pending", &state.pending.is_some())
            .finish()
    }
}
