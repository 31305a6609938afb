//! Error types for the session layer.

use authforge_protocol::ProtocolError;
use authforge_transport::TransportError;

/// Errors that can occur while refreshing or restoring a session.
///
/// `Clone` because a refresh outcome is shared: every caller awaiting
/// the same pending refresh receives the same error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// The refresh call failed at the transport level.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The refresh response could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The refresh call succeeded but the response carried no session.
    #[error("invalid session data")]
    InvalidSessionData,

    /// Transient failures kept happening until the retry ceiling was hit.
    #[error("token refresh gave up after {attempts} attempts: {last}")]
    RetryLimitExceeded {
        attempts: u32,
        last: TransportError,
    },

    /// The session was replaced or cleared while this refresh was waiting
    /// to retry, so the retry will never happen.
    #[error("token refresh was cancelled")]
    RefreshCancelled,
}

impl SessionError {
    /// Returns `true` if the refresh scheduler should retry after this
    /// error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_transient())
    }
}
