use ferrule_core::command::ShowInIdeData;
use tracing::{debug, error};

use crate::outcome::{FileOutcome, Outcome};
use crate::BridgeContext;

/// `showInIde`: open the file with the caret at the given position and raise
/// the host window.
pub async fn show_in_ide(ctx: &BridgeContext, data: &ShowInIdeData) -> FileOutcome {
    let key = match ctx.resolve(&data.file) {
        Ok(key) => key,
        Err(e) => return FileOutcome::rejected(&data.file, e),
    };
    let revealed = ctx
        .bounded(&key, ctx.host.reveal(key.as_path(), data.line, data.column))
        .await
        .map(|()| Outcome::Applied);
    if revealed.is_ok() {
        if let Err(e) = ctx.bounded("window", ctx.host.focus_window()).await {
            debug!("could not focus window: {e}");
        }
    }
    FileOutcome::from_result(&data.file, revealed)
}

/// `refresh`: have the host pick up changes made on disk.
pub async fn refresh(ctx: &BridgeContext) -> FileOutcome {
    let result = ctx
        .bounded("project", ctx.host.refresh())
        .await
        .map(|()| Outcome::Applied);
    match result {
        Ok(outcome) => FileOutcome::global(outcome),
        Err(e) => {
            error!("refresh failed: {e}");
            FileOutcome::global(Outcome::Failed(e.to_string()))
        }
    }
}
