//! # Authforge
//!
//! Client-side authentication session manager.
//!
//! Authforge signs a user in against a remote auth service and then keeps
//! that login alive: it stores the current session, refreshes the access
//! token before it expires (retrying transient failures with exponential
//! backoff), collapses concurrent refreshes into one network call, and
//! tells subscribers about every lifecycle change.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use authforge::prelude::*;
//!
//! # async fn run() -> Result<(), AuthError> {
//! let client = AuthClient::builder()
//!     .url("https://example.com/auth/v1")
//!     .api_key("public-anon-key")
//!     .build_http()?;
//!
//! client.on_auth_state_change(|state| {
//!     println!("{}: {:?}", state.event, state.session.as_ref().map(|s| s.user().id.clone()));
//! });
//!
//! client
//!     .sign_in_with_password(Some("me@example.com"), None, "secret", None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod refresher;
mod urls;

pub use client::AuthClient;
pub use config::{AuthClientBuilder, AuthConfig, CLIENT_INFO};
pub use error::AuthError;
pub use refresher::TransportRefresher;
pub use urls::{OAuthResponse, SessionFromUrl};

pub use authforge_protocol as protocol;
pub use authforge_refresh as refresh;
pub use authforge_session as session;
pub use authforge_transport as transport;

pub mod prelude {
    pub use crate::{AuthClient, AuthClientBuilder, AuthConfig, AuthError, OAuthResponse, SessionFromUrl};
    pub use authforge_protocol::{
        AuthChangeEvent, AuthResponse, AuthState, OAuthOptions, OtpOptions, OtpType, Provider,
        Session, SignUpOptions, User, UserAttributes,
    };
    pub use authforge_refresh::RefreshPolicy;
    pub use authforge_session::{SchedulerState, SessionError, SubscriptionId};
    pub use authforge_transport::{Request, Transport, TransportError};
    #[cfg(feature = "http")]
    pub use authforge_transport::HttpTransport;
}
