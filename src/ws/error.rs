#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

/// Failure reported by a [`Transport`](super::Transport) for a single operation.
///
/// Transports only report a human-readable description; the client maps it into
/// the crate-level [`Error`](crate::error::Error) taxonomy.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub description: String,
}

impl TransportError {
    pub fn new<S: Into<String>>(description: S) -> Self {
        Self {
            description: description.into(),
        }
    }

    /// The connection is closed, or closing, and can no longer carry traffic.
    #[must_use]
    pub fn closed() -> Self {
        Self::new("WebSocket connection closed")
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl StdError for TransportError {}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::new(e.to_string())
    }
}
