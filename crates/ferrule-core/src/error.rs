use crate::types::DocumentKey;

/// Failures a bridge command can run into.
///
/// None of these are fatal to the server. Handlers log them and turn them
/// into an outcome; only `UnrecognizedCommand` and `InvalidPayload` reach the
/// HTTP status line.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("file {0} is not a part of the project")]
    PathRejected(String),

    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("invalid payload for '{command}': {reason}")]
    InvalidPayload { command: String, reason: String },

    #[error("host rejected the edit to {0}")]
    EditRejected(DocumentKey),

    #[error("save failed for {key}: {reason}")]
    SaveFailed { key: DocumentKey, reason: String },

    #[error("host operation on {target} did not finish within {timeout_ms} ms")]
    TimedOut { target: String, timeout_ms: u128 },

    #[error(transparent)]
    Host(#[from] anyhow::Error),
}

impl BridgeError {
    /// Whether the HTTP layer should answer 400 for this error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BridgeError::UnrecognizedCommand(_) | BridgeError::InvalidPayload { .. }
        )
    }
}
