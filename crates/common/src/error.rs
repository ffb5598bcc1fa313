//! Error taxonomy for transit operations.

use std::time::Duration;

use thiserror::Error;

/// A failure to reach the service or to read its reply.
///
/// Always retryable.
#[derive(Debug, Error)]
pub enum TransportError {
    /// TCP connect or TLS handshake failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The connect or read timeout elapsed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The request could not be sent or the response head was invalid.
    #[error("request failed: {0}")]
    Request(String),

    /// The response body could not be read to completion.
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Why a single attempt did not succeed.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// The transport raised an error before a status line was available.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The service answered with a status other than 200.
    #[error("vault responded with HTTP {status}: {body}")]
    Service {
        /// HTTP status code returned by the service.
        status: u16,
        /// Response body (or the joined `errors` list) for diagnostics.
        body: String,
    },
}

impl AttemptError {
    /// HTTP status code, if the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            AttemptError::Transport(_) => None,
            AttemptError::Service { status, .. } => Some(*status),
        }
    }
}

/// Error returned by every public transit operation.
#[derive(Debug, Error)]
pub enum TransitError {
    /// The caller supplied an unusable key name or payload. No I/O happened.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Every permitted attempt failed; wraps the last failure observed.
    #[error("transit operation failed after {attempts} attempt(s): {source}")]
    OperationFailed {
        /// Total attempts made, including the first.
        attempts: u32,
        /// The last failure observed.
        #[source]
        source: AttemptError,
    },

    /// A 200 response whose body lacks the expected fields.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The caller cancelled the operation while it waited to retry.
    #[error("transit operation cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Attempts made before cancellation was observed.
        attempts: u32,
    },
}

impl TransitError {
    /// Short machine-readable error kind (e.g. `"operation_failed"`).
    pub fn kind(&self) -> &'static str {
        match self {
            TransitError::InvalidArgument(_) => "invalid_argument",
            TransitError::OperationFailed { source, .. } => match source {
                AttemptError::Transport(_) => "transport_error",
                AttemptError::Service { .. } => "service_error",
            },
            TransitError::MalformedResponse(_) => "malformed_response",
            TransitError::Cancelled { .. } => "cancelled",
        }
    }

    /// The last HTTP status code seen, if any attempt reached the service.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransitError::OperationFailed { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Attempts made before the error was raised, where that is meaningful.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            TransitError::OperationFailed { attempts, .. }
            | TransitError::Cancelled { attempts } => Some(*attempts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_preserved_through_operation_failed() {
        let e = TransitError::OperationFailed {
            attempts: 3,
            source: AttemptError::Service {
                status: 503,
                body: "sealed".into(),
            },
        };
        assert_eq!(e.status_code(), Some(503));
        assert_eq!(e.attempts(), Some(3));
        assert_eq!(e.kind(), "service_error");
    }

    #[test]
    fn transport_failure_has_no_status() {
        let e = TransitError::OperationFailed {
            attempts: 1,
            source: TransportError::Timeout(Duration::from_secs(5)).into(),
        };
        assert_eq!(e.status_code(), None);
        assert_eq!(e.kind(), "transport_error");
    }

    #[test]
    fn display_includes_body_and_attempts() {
        let e = TransitError::OperationFailed {
            attempts: 2,
            source: AttemptError::Service {
                status: 400,
                body: "encryption key not found".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("2 attempt(s)"));
        assert!(msg.contains("HTTP 400"));
        assert!(msg.contains("encryption key not found"));
    }

    #[test]
    fn invalid_argument_carries_no_attempts() {
        let e = TransitError::InvalidArgument("key name must not be empty".into());
        assert_eq!(e.attempts(), None);
        assert_eq!(e.status_code(), None);
        assert!(e.to_string().contains("key name must not be empty"));
    }
}
