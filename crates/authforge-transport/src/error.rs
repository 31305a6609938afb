/// Errors that can occur in the transport layer.
///
/// Every failure is classified so that higher layers can decide whether
/// it is worth retrying. Only [`Network`](Self::Network) and
/// [`Timeout`](Self::Timeout) are transient; see
/// [`is_transient`](Self::is_transient).
///
/// The variants carry owned strings instead of the underlying library
/// errors so the type is `Clone`. A single refresh failure may have to be
/// delivered to many callers awaiting the same pending refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The remote service could not be reached (DNS, connect, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete within the transport's own timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The remote service answered with a non-2xx status.
    #[error("http {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Message reported by the remote service (or a generic one).
        message: String,
        /// Machine-readable error code, when the service sends one.
        error_code: Option<String>,
    },

    /// The response body was not valid JSON.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The transport could not be constructed (bad base URL, TLS setup).
    #[error("invalid transport configuration: {0}")]
    Config(String),
}

impl TransportError {
    /// Returns `true` if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// The HTTP status, if the remote service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient_only_for_connectivity_failures() {
        assert!(TransportError::Network("reset".into()).is_transient());
        assert!(TransportError::Timeout("30s".into()).is_transient());
        assert!(
            !TransportError::Http {
                status: 503,
                message: "unavailable".into(),
                error_code: None,
            }
            .is_transient()
        );
        assert!(!TransportError::Decode("eof".into()).is_transient());
    }

    #[test]
    fn test_display_includes_status_and_message() {
        let err = TransportError::Http {
            status: 400,
            message: "Invalid login credentials".into(),
            error_code: Some("invalid_credentials".into()),
        };
        assert_eq!(err.to_string(), "http 400: Invalid login credentials");
        assert_eq!(err.status(), Some(400));
    }
}
