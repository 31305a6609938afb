//! Client configuration and the `AuthClient` builder.

use std::sync::Arc;
use std::time::Duration;

use authforge_refresh::RefreshPolicy;
use authforge_session::{Clock, SessionConfig};
use authforge_transport::Transport;

use crate::AuthClient;

/// Value of the `X-Client-Info` header sent with every request.
pub const CLIENT_INFO: &str = concat!("authforge/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout for the HTTP transport.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by every operation of an [`AuthClient`].
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base URL of the auth service, e.g. `https://example.com/auth/v1`.
    pub url: String,
    /// Headers attached to every request by the HTTP transport.
    pub headers: Vec<(String, String)>,
    /// Refresh timing and the wall clock.
    pub session: SessionConfig,
    /// A persisted session that expired more than this many seconds ago is
    /// refreshed on recovery instead of being installed as-is.
    /// Default: 10.
    pub expiry_margin_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            headers: vec![("X-Client-Info".to_string(), CLIENT_INFO.to_string())],
            session: SessionConfig::default(),
            expiry_margin_secs: 10,
        }
    }
}

/// Builder for configuring an [`AuthClient`].
///
/// # Example
///
/// ```rust,ignore
/// use authforge::prelude::*;
///
/// let client = AuthClient::builder()
///     .url("https://example.com/auth/v1")
///     .api_key("public-anon-key")
///     .auto_refresh(true)
///     .build_http()?;
/// ```
pub struct AuthClientBuilder {
    config: AuthConfig,
    timeout: Duration,
}

impl AuthClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: AuthConfig::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the base URL of the auth service.
    pub fn url(mut self, url: &str) -> Self {
        self.config.url = url.trim_end_matches('/').to_string();
        self
    }

    /// Sends `key` in the `apikey` header of every request.
    pub fn api_key(self, key: &str) -> Self {
        self.header("apikey", key)
    }

    /// Adds a header to every request.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.config.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Replaces the whole refresh policy.
    pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.config.session.policy = policy;
        self
    }

    /// Turns proactive refresh on or off. Default: on.
    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.config.session.policy.auto_refresh = enabled;
        self
    }

    /// Sets the recovery expiry margin in seconds.
    pub fn expiry_margin(mut self, secs: i64) -> Self {
        self.config.expiry_margin_secs = secs;
        self
    }

    /// Replaces the wall clock (mainly for tests).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.config.session.clock = clock;
        self
    }

    /// Sets the per-request timeout of the HTTP transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds a client on top of an existing transport.
    ///
    /// The transport is responsible for its own base URL and headers; the
    /// configured URL is still used to build OAuth sign-in URLs.
    pub fn build<T: Transport>(self, transport: T) -> AuthClient<T> {
        AuthClient::new(transport, self.config)
    }

    /// Builds a client that talks HTTP to the configured URL.
    #[cfg(feature = "http")]
    pub fn build_http(
        self,
    ) -> Result<AuthClient<authforge_transport::HttpTransport>, crate::AuthError> {
        let transport = authforge_transport::HttpTransport::with_timeout(
            &self.config.url,
            self.config.headers.clone(),
            self.timeout,
        )?;
        Ok(self.build(transport))
    }
}

impl Default for AuthClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
