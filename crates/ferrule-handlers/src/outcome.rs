use ferrule_core::BridgeError;
use serde::Serialize;
use tracing::{error, warn};

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    /// The host applied and saved the change.
    Applied,
    /// Content was already identical; nothing written, ledger untouched.
    Unchanged,
    /// Not attempted: outside the project, or nothing to undo/redo.
    Skipped(String),
    /// Attempted and failed; the ledger was not updated.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub outcome: Outcome,
}

impl FileOutcome {
    pub fn new(file: &str, outcome: Outcome) -> Self {
        Self {
            file: Some(file.to_string()),
            outcome,
        }
    }

    /// Outcome of a command that does not target a file.
    pub fn global(outcome: Outcome) -> Self {
        Self {
            file: None,
            outcome,
        }
    }

    pub(crate) fn from_result(file: &str, result: Result<Outcome, BridgeError>) -> Self {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e @ BridgeError::PathRejected(_)) => Outcome::Skipped(e.to_string()),
            Err(e) => {
                error!(file, "{e}");
                Outcome::Failed(e.to_string())
            }
        };
        Self::new(file, outcome)
    }

    pub(crate) fn rejected(file: &str, err: BridgeError) -> Self {
        warn!(file, "skipped: {err}");
        Self::new(file, Outcome::Skipped(err.to_string()))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }
}
