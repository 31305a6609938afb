//! `AuthClient`: the authentication flows on top of the session layer.
//!
//! Every flow follows the same shape: validate the input, clear the old
//! session if this is a fresh sign-in attempt, make the call through the
//! transport, and on a session-bearing response install the session and
//! publish `signedIn`. Refreshing, retrying and deduplication all happen
//! in the [`SessionManager`].

use std::sync::Arc;

use authforge_protocol::{
    AuthChangeEvent, AuthResponse, AuthState, Contact, OAuthOptions, OtpOptions, OtpType,
    PersistedSession, Provider, Session, SignUpOptions, User, UserAttributes, decode,
};
use authforge_session::{SchedulerState, SessionManager, SubscriptionId};
use authforge_transport::{Request, Transport};
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;

use crate::urls::{self, OAuthResponse, SessionFromUrl};
use crate::{AuthConfig, AuthError, TransportRefresher};

const MISSING_CONTACT: &str = "You must provide either an email or phone number";

/// A client for one user's authentication session.
///
/// Cheap to clone; clones share the session, timers and subscribers.
/// Independent instances share nothing.
///
/// Must be used from within a Tokio runtime: installing a session arms a
/// timer task.
pub struct AuthClient<T: Transport> {
    transport: Arc<T>,
    sessions: SessionManager<TransportRefresher<T>>,
    config: Arc<AuthConfig>,
}

impl<T: Transport> Clone for AuthClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            sessions: self.sessions.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

#[cfg(feature = "http")]
impl AuthClient<authforge_transport::HttpTransport> {
    /// Creates a new builder.
    pub fn builder() -> crate::AuthClientBuilder {
        crate::AuthClientBuilder::new()
    }
}

impl<T: Transport> AuthClient<T> {
    pub fn new(transport: T, config: AuthConfig) -> Self {
        let transport = Arc::new(transport);
        let refresher =
            TransportRefresher::new(Arc::clone(&transport), Arc::clone(&config.session.clock));
        let sessions = SessionManager::new(refresher, config.session.clone());
        Self {
            transport,
            sessions,
            config: Arc::new(config),
        }
    }

    // -----------------------------------------------------------------
    // Sign-up and sign-in
    // -----------------------------------------------------------------

    /// Creates a new user with a password.
    ///
    /// Exactly one of `email` / `phone` must be given. If the service logs
    /// the user in right away the session is installed and `signedIn` is
    /// published; if confirmation is pending the response carries only
    /// the user.
    pub async fn sign_up(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        password: &str,
        options: SignUpOptions,
    ) -> Result<AuthResponse, AuthError> {
        let contact = require_contact(email, phone)?;
        self.sessions.clear();

        let mut body = Map::new();
        contact.insert_into(&mut body);
        body.insert("password".into(), json!(password));
        if let Some(data) = options.data {
            body.insert("data".into(), data);
        }
        insert_captcha(&mut body, options.captcha_token.as_deref());

        let mut request = Request::post("/signup").json(Value::Object(body));
        if let Some(redirect_to) = options.redirect_to.filter(|_| contact.is_email()) {
            request = request.query("redirect_to", redirect_to);
        }

        let response = self.send(request).await?;
        self.finish_sign_in(decode::auth_response(&response, self.sessions.now())?)
    }

    /// Signs in with a password.
    pub async fn sign_in_with_password(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        password: &str,
        captcha_token: Option<&str>,
    ) -> Result<AuthResponse, AuthError> {
        let contact = require_contact(email, phone)?;
        self.sessions.clear();

        let mut body = Map::new();
        contact.insert_into(&mut body);
        body.insert("password".into(), json!(password));
        insert_captcha(&mut body, captcha_token);

        let request = Request::post("/token")
            .query("grant_type", "password")
            .json(Value::Object(body));
        let response = self.send(request).await?;
        self.finish_sign_in(decode::auth_response(&response, self.sessions.now())?)
    }

    /// Sends a one-time password or magic link. No session results; the
    /// user completes sign-in with [`verify_otp`](Self::verify_otp) or by
    /// following the link.
    pub async fn sign_in_with_otp(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        options: OtpOptions,
    ) -> Result<(), AuthError> {
        let contact = require_contact(email, phone)?;
        self.sessions.clear();

        let mut body = Map::new();
        contact.insert_into(&mut body);
        body.insert("create_user".into(), json!(options.should_create_user));
        if let Some(data) = options.data {
            body.insert("data".into(), data);
        }
        insert_captcha(&mut body, options.captcha_token.as_deref());

        let mut request = Request::post("/otp").json(Value::Object(body));
        if let Some(redirect_to) = options.email_redirect_to.filter(|_| contact.is_email()) {
            request = request.query("redirect_to", redirect_to);
        }
        self.send(request).await?;
        Ok(())
    }

    /// Verifies a one-time password and signs in with the resulting
    /// session.
    pub async fn verify_otp(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        token: &str,
        otp_type: OtpType,
        redirect_to: Option<&str>,
    ) -> Result<AuthResponse, AuthError> {
        let contact = require_contact(email, phone)?;
        self.sessions.clear();

        let mut body = Map::new();
        contact.insert_into(&mut body);
        body.insert("token".into(), json!(token));
        body.insert("type".into(), json!(otp_type));
        if let Some(redirect_to) = redirect_to {
            body.insert("redirect_to".into(), json!(redirect_to));
        }

        let response = self
            .send(Request::post("/verify").json(Value::Object(body)))
            .await?;
        self.finish_sign_in(decode::auth_response(&response, self.sessions.now())?)
    }

    /// Builds the URL that starts an OAuth sign-in with `provider`.
    ///
    /// No network call is made. The current session is cleared since the
    /// user is about to sign in again.
    pub fn get_oauth_sign_in_url(
        &self,
        provider: Provider,
        options: OAuthOptions,
    ) -> Result<OAuthResponse, AuthError> {
        let url = urls::oauth_sign_in_url(&self.config.url, provider, &options)?;
        self.sessions.clear();
        Ok(OAuthResponse {
            provider,
            url: url.into(),
        })
    }

    // -----------------------------------------------------------------
    // Session maintenance
    // -----------------------------------------------------------------

    /// Refreshes the current session now.
    ///
    /// Joins a refresh that is already in progress instead of starting a
    /// second one.
    pub async fn refresh_session(&self) -> Result<AuthResponse, AuthError> {
        let session = self.sessions.current_session().ok_or(AuthError::NotLoggedIn)?;
        let refresh_token = session.refresh_token().ok_or(AuthError::NotLoggedIn)?;
        let refreshed = self
            .sessions
            .refresh(refresh_token, Some(session.access_token()))
            .await?;
        Ok(AuthResponse::from_session(refreshed))
    }

    /// Replaces the current session with the one `refresh_token` yields.
    ///
    /// The previous session is cleared first, so a refresh still pending
    /// for it is not joined.
    pub async fn set_session(&self, refresh_token: &str) -> Result<AuthResponse, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidArgument(
                "refresh token must not be empty".into(),
            ));
        }
        self.sessions.clear();
        let refreshed = self.sessions.refresh(refresh_token, None).await?;
        Ok(AuthResponse::from_session(refreshed))
    }

    /// Restores a session saved with
    /// [`persist_session_string`](Self::persist_session_string).
    ///
    /// A session whose recorded expiry is more than the configured margin
    /// in the past is refreshed instead of installed; without a refresh
    /// token that is [`AuthError::SessionExpired`]. Otherwise the session
    /// is installed and `signedIn` is published without any network call.
    pub async fn recover_session(&self, json: &str) -> Result<AuthResponse, AuthError> {
        let persisted = PersistedSession::from_json(json)?;
        let now = self.sessions.now();

        if persisted.expires_at < now - self.config.expiry_margin_secs {
            let Some(refresh_token) = persisted.current_session.refresh_token() else {
                tracing::info!(expires_at = persisted.expires_at, "persisted session expired");
                return Err(AuthError::SessionExpired);
            };
            tracing::debug!(
                expires_at = persisted.expires_at,
                "persisted session expired, refreshing"
            );
            self.sessions.clear();
            let refreshed = self.sessions.refresh(refresh_token, None).await?;
            return Ok(AuthResponse::from_session(refreshed));
        }

        let session = persisted
            .current_session
            .with_expires_at(persisted.expires_at);
        self.install_signed_in(session.clone());
        Ok(AuthResponse::from_session(session))
    }

    /// Serializes the current session for
    /// [`recover_session`](Self::recover_session).
    ///
    /// A session without a known expiry is recorded as never expiring.
    pub fn persist_session_string(&self) -> Result<String, AuthError> {
        let session = self.sessions.current_session().ok_or(AuthError::NotLoggedIn)?;
        let persisted = PersistedSession {
            expires_at: session.expires_at().unwrap_or(i64::MAX),
            current_session: session,
        };
        Ok(persisted.to_json()?)
    }

    /// Completes a redirect-based flow from the URL the service sent the
    /// user back to.
    ///
    /// Fetches the user for the redirect's access token. With
    /// `store_session` any previous session is cleared before that call,
    /// and on success the new session is installed and `signedIn` published,
    /// followed by `passwordRecovery` for recovery redirects.
    pub async fn get_session_from_url(
        &self,
        url: &str,
        store_session: bool,
    ) -> Result<SessionFromUrl, AuthError> {
        let tokens = urls::parse_redirect(url)?;
        if store_session {
            self.sessions.clear();
        }
        let user = self.fetch_user(&tokens.access_token).await?;

        let mut session = Session::new(tokens.access_token, user)
            .with_refresh_token(tokens.refresh_token)
            .with_token_type(tokens.token_type)
            .with_lifetime(self.sessions.now(), tokens.expires_in);
        if let Some(provider_token) = tokens.provider_token {
            session = session.with_provider_token(provider_token);
        }

        if store_session {
            self.install_signed_in(session.clone());
            if tokens.redirect_type.as_deref() == Some("recovery") {
                self.sessions
                    .events()
                    .publish(AuthChangeEvent::PasswordRecovery, Some(session.clone()));
            }
        }
        Ok(SessionFromUrl {
            session,
            redirect_type: tokens.redirect_type,
        })
    }

    // -----------------------------------------------------------------
    // User
    // -----------------------------------------------------------------

    /// Fetches the user for `jwt`, or for the current session's access
    /// token when `jwt` is `None`.
    pub async fn get_user(&self, jwt: Option<&str>) -> Result<User, AuthError> {
        match jwt {
            Some(jwt) => self.fetch_user(jwt).await,
            None => {
                let session = self.sessions.current_session().ok_or(AuthError::NotLoggedIn)?;
                self.fetch_user(session.access_token()).await
            }
        }
    }

    /// Updates the signed-in user and publishes `userUpdated`.
    pub async fn update_user(&self, attributes: UserAttributes) -> Result<User, AuthError> {
        let session = self.sessions.current_session().ok_or(AuthError::NotLoggedIn)?;
        let body = serde_json::to_value(&attributes).map_err(authforge_protocol::ProtocolError::from)?;

        let response = self
            .send(Request::put("/user").bearer(session.access_token()).json(body))
            .await?;
        let user = decode::user(&response)?;

        let updated = self.sessions.set_user(user.clone());
        self.sessions
            .events()
            .publish(AuthChangeEvent::UserUpdated, updated);
        Ok(user)
    }

    /// Sends a password reset email.
    pub async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
        captcha_token: Option<&str>,
    ) -> Result<(), AuthError> {
        let mut body = Map::new();
        body.insert("email".into(), json!(email));
        insert_captcha(&mut body, captcha_token);

        let mut request = Request::post("/recover").json(Value::Object(body));
        if let Some(redirect_to) = redirect_to {
            request = request.query("redirect_to", redirect_to);
        }
        self.send(request).await?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Sign-out
    // -----------------------------------------------------------------

    /// Signs out.
    ///
    /// The local session is cleared and `signedOut` is published first;
    /// only then is the service asked to invalidate the token. A failure of
    /// that call is returned, but the client is signed out regardless.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let access_token = self
            .sessions
            .current_session()
            .map(|s| s.access_token().to_string());
        self.sessions.clear();
        self.sessions.events().publish(AuthChangeEvent::SignedOut, None);

        if let Some(access_token) = access_token {
            self.send(Request::post("/logout").bearer(&access_token))
                .await
                .inspect_err(|e| tracing::warn!(error = %e, "remote sign-out failed"))?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // State and subscriptions
    // -----------------------------------------------------------------

    pub fn current_session(&self) -> Option<Session> {
        self.sessions.current_session()
    }

    pub fn current_user(&self) -> Option<User> {
        self.sessions.current_user()
    }

    /// Calls `callback` for every future auth state change.
    pub fn on_auth_state_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        self.sessions.events().subscribe(callback)
    }

    /// Like [`on_auth_state_change`](Self::on_auth_state_change), but
    /// delivers into a channel.
    pub fn subscribe(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<AuthState>) {
        self.sessions.events().subscribe_channel()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.sessions.events().unsubscribe(id)
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.sessions.scheduler_state()
    }

    /// The underlying session manager.
    pub fn sessions(&self) -> &SessionManager<TransportRefresher<T>> {
        &self.sessions
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    async fn send(&self, request: Request) -> Result<Value, AuthError> {
        tracing::debug!(method = %request.method, path = %request.path, "auth request");
        Ok(self.transport.request(request).await?)
    }

    async fn fetch_user(&self, access_token: &str) -> Result<User, AuthError> {
        let response = self.send(Request::get("/user").bearer(access_token)).await?;
        Ok(decode::user(&response)?)
    }

    fn install_signed_in(&self, session: Session) {
        self.sessions.install(session.clone());
        self.sessions
            .events()
            .publish(AuthChangeEvent::SignedIn, Some(session));
    }

    fn finish_sign_in(&self, response: AuthResponse) -> Result<AuthResponse, AuthError> {
        if let Some(session) = &response.session {
            self.install_signed_in(session.clone());
        }
        Ok(response)
    }
}

fn require_contact(email: Option<&str>, phone: Option<&str>) -> Result<Contact, AuthError> {
    Contact::from_parts(email, phone).ok_or_else(|| AuthError::InvalidArgument(MISSING_CONTACT.into()))
}

fn insert_captcha(body: &mut Map<String, Value>, captcha_token: Option<&str>) {
    if let Some(token) = captcha_token {
        body.insert(
            "gotrue_meta_security".into(),
            json!({ "captcha_token": token }),
        );
    }
}
