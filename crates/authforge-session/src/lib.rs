//! Session lifecycle management for Authforge.
//!
//! This crate keeps one client's login alive:
//!
//! 1. **Session store**: the current [`Session`](authforge_protocol::Session)
//!    and its user, replaced wholesale on every install ([`SessionManager`])
//! 2. **Refresh scheduling**: a proactive timer before expiry, retries
//!    with exponential backoff on transient failures, and deduplication of
//!    concurrent refresh requests into a single network call
//! 3. **Event bus**: synchronous broadcast of lifecycle changes to
//!    subscribers ([`EventBus`])
//!
//! The network call itself is delegated to a [`TokenRefresher`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Auth client (above)  ← runs sign-in flows, installs the resulting sessions
//!     ↕
//! Session layer (this crate)  ← owns "current session", timers, events
//!     ↕
//! Protocol / Refresh / Transport (below)  ← types, timing math, errors
//! ```

mod clock;
mod config;
mod error;
mod events;
mod manager;
mod refresher;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{SchedulerState, SessionConfig};
pub use error::SessionError;
pub use events::{EventBus, SubscriptionId};
pub use manager::{RefreshFuture, SessionManager};
pub use refresher::TokenRefresher;
