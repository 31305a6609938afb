//! Unified error type for the Authforge client.

use authforge_protocol::ProtocolError;
use authforge_session::SessionError;
use authforge_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Usage errors (`InvalidArgument`, `NotLoggedIn`) are raised before any
/// network call and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A transport-level error (connection, HTTP status, body).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A response or persisted session that could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A refresh failed, gave up, or was cancelled.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The caller passed an invalid combination of arguments.
    #[error("{0}")]
    InvalidArgument(String),

    /// The operation needs a current session and there is none.
    #[error("not logged in")]
    NotLoggedIn,

    /// A persisted session is past its expiry and cannot be refreshed.
    #[error("session expired")]
    SessionExpired,

    /// The service reported an error through a redirect URL.
    #[error("{message}")]
    Remote {
        message: String,
        code: Option<String>,
    },

    /// A URL could not be built or parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl AuthError {
    /// `true` for errors caused by how the client was called rather than by
    /// the service or the network.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::NotLoggedIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::Network("gone".into());
        let auth_err: AuthError = err.into();
        assert!(matches!(auth_err, AuthError::Transport(_)));
        assert!(auth_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let auth_err: AuthError = err.into();
        assert!(matches!(auth_err, AuthError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let auth_err: AuthError = SessionError::InvalidSessionData.into();
        assert!(matches!(auth_err, AuthError::Session(_)));
        assert_eq!(auth_err.to_string(), "invalid session data");
    }

    #[test]
    fn test_usage_errors_are_flagged() {
        assert!(AuthError::NotLoggedIn.is_usage_error());
        assert!(AuthError::InvalidArgument("x".into()).is_usage_error());
        assert!(!AuthError::SessionExpired.is_usage_error());
    }

    #[test]
    fn test_remote_error_displays_message() {
        let err = AuthError::Remote {
            message: "Email link is invalid or has expired".into(),
            code: Some("otp_expired".into()),
        };
        assert_eq!(err.to_string(), "Email link is invalid or has expired");
    }
}
