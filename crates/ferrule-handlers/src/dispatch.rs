use ferrule_core::{BridgeError, Command, RawCommand};
use serde::Serialize;
use tracing::{info, warn};

use crate::outcome::FileOutcome;
use crate::{show, undo, write, BridgeContext};

/// Result of one dispatched command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub command: &'static str,
    pub results: Vec<FileOutcome>,
}

impl Report {
    /// True if nothing failed. Skipped files do not count as failures.
    pub fn succeeded(&self) -> bool {
        !self.results.iter().any(FileOutcome::is_failure)
    }
}

/// Validate a raw request into a [`Command`], logging rejections.
pub fn recognize(raw: RawCommand) -> Result<Command, BridgeError> {
    let name = raw.command.clone();
    Command::parse(raw).inspect_err(|e| warn!(command = %name, "rejected: {e}"))
}

/// Run `command` to completion. Never fails; per-file problems are in the report.
pub async fn dispatch(ctx: &BridgeContext, command: Command) -> Report {
    let name = command.name();
    info!(command = name, "dispatching");
    let results = match &command {
        Command::Write(data) => vec![write::write_text(ctx, data).await],
        Command::WriteBase64(data) => vec![write::write_binary(ctx, data).await],
        Command::UndoRedo(data, direction) => undo::undo_redo(ctx, data, *direction).await,
        Command::ShowInIde(data) => vec![show::show_in_ide(ctx, data).await],
        Command::Refresh => vec![show::refresh(ctx).await],
    };
    let report = Report {
        command: name,
        results,
    };
    if report.succeeded() {
        info!(command = name, files = report.results.len(), "done");
    } else {
        warn!(command = name, "finished with failures");
    }
    report
}
