//! Error types for the protocol layer.

/// Errors that can occur while turning service responses into
/// protocol types.
///
/// `Clone` because a decode failure during a token refresh is delivered
/// to every caller awaiting that refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The JSON did not match the expected shape (missing required
    /// fields, wrong types).
    #[error("decode failed: {0}")]
    Decode(String),

    /// The message decoded but violates protocol rules, e.g. a persisted
    /// session string that is not JSON at all.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
