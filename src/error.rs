//! Error types for the relay client.
//!
//! Most faults detected inside the connection task are absorbed and logged
//! rather than returned; these variants surface through the few fallible
//! entry points (building a client, decoding a frame, the side-channel call)
//! and through the [`Transport`](crate::client::Transport) seam.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors produced by the relay client.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Socket-level failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// Inbound frame was not a valid subscription event.
    #[error("failed to decode frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// Outbound frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(String),

    /// Side-channel HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Relay API answered with something other than 200.
    #[error("unexpected response from relay API ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status code returned by the API.
        status: u16,
        /// Response body, kept for diagnostics.
        body: String,
    },

    /// Response submission failed validation.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Configured socket or API address is not a valid URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A required environment variable is not set.
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    /// The client was disconnected while an operation was waiting on it.
    #[error("client disconnected")]
    Disconnected,
}

impl RelayError {
    /// Whether this error originated in the socket transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, RelayError::Transport(_))
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::Http(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RelayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RelayError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(RelayError::Transport("reset".into()).is_transport());
        assert!(!RelayError::Disconnected.is_transport());
    }

    #[test]
    fn test_unexpected_status_message() {
        let err = RelayError::UnexpectedStatus {
            status: 404,
            body: "log not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "unexpected response from relay API (404): log not found"
        );
    }
}
