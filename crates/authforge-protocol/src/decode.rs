//! Decoding service responses into protocol types.
//!
//! Responses arrive as `serde_json::Value` from the transport. The
//! functions here apply the service's conventions on top of plain serde:
//! a body without `access_token` carries no session, and a session's
//! absolute expiry is derived from the time the response was received.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{AuthResponse, ProtocolError, Session, User};

/// Deserializes any protocol type from a JSON value.
pub fn value<T: DeserializeOwned>(value: &Value) -> Result<T, ProtocolError> {
    T::deserialize(value).map_err(ProtocolError::from)
}

/// Decodes a session from a token-endpoint response.
///
/// Returns `Ok(None)` when the body has no `access_token` at all (the
/// request succeeded but did not produce a session). A body that has an
/// access token but is otherwise malformed is an error.
///
/// `now` is the Unix time in seconds used to stamp `expires_at`.
pub fn session(body: &Value, now: i64) -> Result<Option<Session>, ProtocolError> {
    if body.get("access_token").is_none_or(Value::is_null) {
        return Ok(None);
    }
    let session: Session = value(body)?;
    Ok(Some(session.stamped(now)))
}

/// Decodes a user from either a bare user object or `{ "user": {...} }`.
pub fn user(body: &Value) -> Result<User, ProtocolError> {
    match body.get("user") {
        Some(inner) if inner.is_object() => value(inner),
        _ => value(body),
    }
}

/// Decodes the response of sign-up / sign-in / verify calls.
///
/// The service returns a full session when the user is logged in, and a
/// bare user object when confirmation is still pending.
pub fn auth_response(body: &Value, now: i64) -> Result<AuthResponse, ProtocolError> {
    if let Some(session) = session(body, now)? {
        return Ok(AuthResponse::from_session(session));
    }
    let user = if body.get("id").is_some() || body.get("user").is_some() {
        Some(user(body)?)
    } else {
        None
    };
    Ok(AuthResponse {
        session: None,
        user,
    })
}
