//! Protocol-level errors.

use thiserror::Error;

/// Errors decoding or interpreting wire data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A push event name this front-end does not handle.
    #[error("unknown backend event: {0}")]
    UnknownEvent(String),

    /// The event payload did not match the expected shape.
    #[error("malformed {event} payload: {reason}")]
    Malformed { event: String, reason: String },

    /// The backend answered with its bare failure marker.
    #[error("backend command {command} failed")]
    Failed { command: String },

    /// The backend pushed a payload flagged as failed.
    #[error("backend reported failure for {event}: {message}")]
    EventFailed { event: String, message: String },
}

impl ProtocolError {
    /// Creates a malformed-payload error from any displayable cause.
    pub fn malformed<E: std::fmt::Display>(event: &str, err: E) -> Self {
        Self::Malformed {
            event: event.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::UnknownEvent("reboot".to_string());
        assert_eq!(err.to_string(), "unknown backend event: reboot");

        let err = ProtocolError::malformed("pause-traffic", "missing key");
        assert_eq!(err.to_string(), "malformed pause-traffic payload: missing key");

        let err = ProtocolError::Failed {
            command: "search".to_string(),
        };
        assert_eq!(err.to_string(), "backend command search failed");
    }
}
