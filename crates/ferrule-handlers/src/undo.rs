use ferrule_core::command::UndoRedoData;
use ferrule_core::{BridgeError, Direction, DocumentKey};
use ferrule_host::Edit;
use tracing::{debug, info};

use crate::outcome::{FileOutcome, Outcome};
use crate::BridgeContext;

/// `undo` / `redo`: step each listed file back or forward by one bridge step.
///
/// Files are handled one after the other in request order. Text files go
/// through the host's native history, which acts on the active editor, so the
/// editor that was active before the batch is restored afterwards.
pub async fn undo_redo(
    ctx: &BridgeContext,
    data: &UndoRedoData,
    direction: Direction,
) -> Vec<FileOutcome> {
    let previously_active = ctx.host.active_document();

    let mut results = Vec::with_capacity(data.files.len());
    for file in &data.files {
        results.push(step_file(ctx, file, direction).await);
    }

    if let Some(path) = previously_active {
        let changed = ctx.host.active_document().as_deref() != Some(path.as_path());
        if changed {
            if let Err(e) = ctx
                .bounded(path.display(), ctx.host.show_document(&path))
                .await
            {
                debug!(path = %path.display(), "could not restore active editor: {e}");
            }
        }
    }
    results
}

async fn step_file(ctx: &BridgeContext, file: &str, direction: Direction) -> FileOutcome {
    let key = match ctx.resolve(file) {
        Ok(key) => key,
        Err(e) => return FileOutcome::rejected(file, e),
    };
    let _doc = ctx.coordinator.acquire(&key).await;

    if !ctx.coordinator.can_perform(&key, direction) {
        info!(document = %key, %direction, "nothing to {direction}");
        return FileOutcome::new(file, Outcome::Skipped(format!("nothing to {direction}")));
    }

    let result = match ctx.coordinator.peek_snapshot(&key, direction) {
        Some(snapshot) => restore_snapshot(ctx, &key, direction, snapshot).await,
        None => native_step(ctx, &key, direction).await,
    };
    FileOutcome::from_result(file, result)
}

async fn native_step(
    ctx: &BridgeContext,
    key: &DocumentKey,
    direction: Direction,
) -> Result<Outcome, BridgeError> {
    ctx.bounded(key, ctx.host.show_document(key.as_path())).await?;
    ctx.bounded(key, ctx.host.native_undo_redo(direction)).await?;
    ctx.save_and_record(key, |c| {
        c.on_bridge_undo_redo_performed(key, direction);
        c.record_native_step(key, direction);
    })
    .await?;
    Ok(Outcome::Applied)
}

async fn restore_snapshot(
    ctx: &BridgeContext,
    key: &DocumentKey,
    direction: Direction,
    snapshot: Option<Vec<u8>>,
) -> Result<Outcome, BridgeError> {
    let current = ctx.read(key).await?;
    ctx.apply(key, Edit::Untracked(snapshot), Some(direction.as_str()))
        .await?;
    ctx.save_and_record(key, |c| {
        c.record_binary_restore(key, direction, current);
        c.on_bridge_undo_redo_performed(key, direction);
    })
    .await?;
    Ok(Outcome::Applied)
}
