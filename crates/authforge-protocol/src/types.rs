//! Core data model: sessions, users and lifecycle events.
//!
//! A [`Session`] is an immutable value. Refreshing a session or updating
//! its user never mutates the existing value; it produces a new one
//! (see [`Session::with_user`]). This keeps the "current session" slot in
//! the session layer simple: it is replaced wholesale, never edited.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// The identity record the service returns alongside a session.
///
/// Only the commonly used fields are broken out. Anything else the
/// service sends is kept verbatim in [`extra`](Self::extra) so that a
/// round trip through [`PersistedSession`] loses nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    #[serde(default)]
    pub aud: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default)]
    pub app_metadata: Map<String, Value>,

    #[serde(default)]
    pub user_metadata: Map<String, Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Creates a user with only an ID. Mostly useful in tests.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            aud: String::new(),
            email: None,
            phone: None,
            role: None,
            created_at: None,
            app_metadata: Map::new(),
            user_metadata: Map::new(),
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

fn default_token_type() -> String {
    "bearer".to_string()
}

/// A validated login: tokens, expiry and the user they belong to.
///
/// Fields are private so a `Session` cannot be edited in place once built;
/// the `with_*` methods consume it and return a new value.
///
/// `expires_at` is an absolute Unix timestamp in seconds. The service
/// only sends the relative `expires_in`, so sessions decoded from a
/// response are stamped with `now + expires_in` (see
/// [`decode::session`](crate::decode::session)).
///
/// A session with a refresh token is eligible for proactive refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,

    #[serde(default = "default_token_type")]
    token_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_in: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,

    user: User,
}

impl Session {
    /// Creates a bearer session with no refresh token and no expiry.
    pub fn new(access_token: impl Into<String>, user: User) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: default_token_type(),
            provider_token: None,
            expires_in: None,
            expires_at: None,
            user,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    pub fn with_provider_token(mut self, provider_token: impl Into<String>) -> Self {
        self.provider_token = Some(provider_token.into());
        self
    }

    /// Sets the lifetime and derives the absolute expiry from `issued_at`.
    pub fn with_lifetime(mut self, issued_at: i64, expires_in: i64) -> Self {
        self.expires_in = Some(expires_in);
        self.expires_at = Some(issued_at.saturating_add(expires_in));
        self
    }

    /// Overrides the absolute expiry (e.g. from a persisted record).
    pub fn with_expires_at(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns a copy of this session carrying a different user.
    pub fn with_user(mut self, user: User) -> Self {
        self.user = user;
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn provider_token(&self) -> Option<&str> {
        self.provider_token.as_deref()
    }

    pub fn expires_in(&self) -> Option<i64> {
        self.expires_in
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    /// Seconds until expiry relative to `now`; negative once expired.
    pub fn remaining_secs(&self, now: i64) -> Option<i64> {
        self.expires_at.map(|at| at - now)
    }

    /// `true` if this session can be refreshed proactively.
    pub fn is_refreshable(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Fills in `expires_at` from `expires_in` if it is not yet known.
    pub(crate) fn stamped(mut self, now: i64) -> Self {
        if self.expires_at.is_none() {
            if let Some(expires_in) = self.expires_in {
                self.expires_at = Some(now.saturating_add(expires_in));
            }
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The kind of lifecycle change delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl fmt::Display for AuthChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SignedIn => "signedIn",
            Self::SignedOut => "signedOut",
            Self::TokenRefreshed => "tokenRefreshed",
            Self::UserUpdated => "userUpdated",
            Self::PasswordRecovery => "passwordRecovery",
        };
        f.write_str(s)
    }
}

/// One lifecycle notification: what happened and the session afterwards.
///
/// Produced once per state-changing operation and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

// ---------------------------------------------------------------------------
// Responses and persistence
// ---------------------------------------------------------------------------

/// The result of a sign-up, sign-in or verification call.
///
/// `session` is `None` when the service accepted the request but did not
/// log the user in yet (e.g. email confirmation pending); `user` may
/// still be present in that case.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthResponse {
    pub session: Option<Session>,
    pub user: Option<User>,
}

impl AuthResponse {
    /// A response that carries a session (and therefore its user).
    pub fn from_session(session: Session) -> Self {
        let user = Some(session.user().clone());
        Self {
            session: Some(session),
            user,
        }
    }
}

/// The JSON shape used to persist a session between process runs.
///
/// ```json
/// { "currentSession": { "access_token": "...", ... }, "expiresAt": 1700000000 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub current_session: Session,
    pub expires_at: i64,
}

impl PersistedSession {
    /// Parses a persisted session string.
    pub fn from_json(json: &str) -> Result<Self, crate::ProtocolError> {
        serde_json::from_str(json).map_err(|e| {
            crate::ProtocolError::InvalidMessage(format!(
                "persisted session is not valid: {e}"
            ))
        })
    }

    /// Serializes to the persisted string form.
    pub fn to_json(&self) -> Result<String, crate::ProtocolError> {
        serde_json::to_string(self).map_err(crate::ProtocolError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> Session {
        Session::new("access-1", User::new("user-1"))
            .with_refresh_token("refresh-1")
            .with_lifetime(1_000, 3_600)
    }

    #[test]
    fn test_with_lifetime_derives_expires_at() {
        let s = session();
        assert_eq!(s.expires_in(), Some(3_600));
        assert_eq!(s.expires_at(), Some(4_600));
        assert_eq!(s.remaining_secs(4_000), Some(600));
        assert_eq!(s.remaining_secs(5_000), Some(-400));
    }

    #[test]
    fn test_with_user_returns_new_value_and_keeps_original() {
        let original = session();
        let updated = original.clone().with_user(User::new("user-2"));
        assert_eq!(original.user().id, "user-1");
        assert_eq!(updated.user().id, "user-2");
        assert_eq!(updated.access_token(), original.access_token());
    }

    #[test]
    fn test_is_refreshable_requires_refresh_token() {
        assert!(session().is_refreshable());
        assert!(!Session::new("a", User::new("u")).is_refreshable());
    }

    #[test]
    fn test_session_deserializes_service_shape() {
        let s: Session = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": { "id": "u", "aud": "authenticated", "email": "x@y.z" }
        }))
        .unwrap();
        assert_eq!(s.token_type(), "bearer");
        assert_eq!(s.expires_at(), None);
        assert_eq!(s.stamped(100).expires_at(), Some(3_700));
    }

    #[test]
    fn test_user_keeps_unknown_fields() {
        let user: User = serde_json::from_value(json!({
            "id": "u",
            "aud": "authenticated",
            "factors": [1, 2]
        }))
        .unwrap();
        assert_eq!(user.extra.get("factors"), Some(&json!([1, 2])));
        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["factors"], json!([1, 2]));
    }

    #[test]
    fn test_auth_change_event_display_and_serde_agree() {
        for event in [
            AuthChangeEvent::SignedIn,
            AuthChangeEvent::SignedOut,
            AuthChangeEvent::TokenRefreshed,
            AuthChangeEvent::UserUpdated,
            AuthChangeEvent::PasswordRecovery,
        ] {
            let json = serde_json::to_value(event).unwrap();
            assert_eq!(json, json!(event.to_string()));
        }
    }

    #[test]
    fn test_persisted_session_uses_camel_case_keys() {
        let persisted = PersistedSession {
            current_session: session(),
            expires_at: 4_600,
        };
        let text = persisted.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["expiresAt"], json!(4_600));
        assert_eq!(value["currentSession"]["access_token"], json!("access-1"));
        assert_eq!(PersistedSession::from_json(&text).unwrap(), persisted);
    }

    #[test]
    fn test_persisted_session_rejects_garbage() {
        let err = PersistedSession::from_json("not json").unwrap_err();
        assert!(matches!(err, crate::ProtocolError::InvalidMessage(_)));
    }

    #[test]
    fn test_auth_response_from_session_copies_user() {
        let resp = AuthResponse::from_session(session());
        assert_eq!(resp.user.unwrap().id, "user-1");
        assert!(resp.session.is_some());
    }
}
