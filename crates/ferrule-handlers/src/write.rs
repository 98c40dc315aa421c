use ferrule_core::command::{BinaryWriteData, WriteData};
use ferrule_core::{BridgeError, DocumentKey};
use ferrule_host::Edit;
use tracing::debug;

use crate::outcome::{FileOutcome, Outcome};
use crate::BridgeContext;

/// `write`: replace or create a text file.
pub async fn write_text(ctx: &BridgeContext, data: &WriteData) -> FileOutcome {
    let key = match ctx.resolve(&data.file) {
        Ok(key) => key,
        Err(e) => return FileOutcome::rejected(&data.file, e),
    };
    let _doc = ctx.coordinator.acquire(&key).await;
    FileOutcome::from_result(&data.file, write_text_locked(ctx, &key, data).await)
}

async fn write_text_locked(
    ctx: &BridgeContext,
    key: &DocumentKey,
    data: &WriteData,
) -> Result<Outcome, BridgeError> {
    let current = ctx.read(key).await?;
    if current.as_deref() == Some(data.content.as_bytes()) {
        debug!(document = %key, "content unchanged, skipping write");
        return Ok(Outcome::Unchanged);
    }

    let was_visible = ctx.host.is_document_visible(key.as_path());
    let edit = match current {
        Some(_) => Edit::ReplaceAll(data.content.clone()),
        None => Edit::Create(data.content.as_bytes().to_vec()),
    };
    ctx.apply(key, edit, data.undo_label.as_deref()).await?;
    ctx.save_and_record(key, |c| {
        c.on_bridge_write(key);
        c.record_native_write(key);
    })
    .await?;

    if !was_visible {
        if let Err(e) = ctx.bounded(key, ctx.host.show_document(key.as_path())).await {
            debug!(document = %key, "could not show document: {e}");
        }
    }
    Ok(Outcome::Applied)
}

/// `writeBase64`: replace or create a file with raw bytes, keeping a manual
/// snapshot of the previous content for undo.
pub async fn write_binary(ctx: &BridgeContext, data: &BinaryWriteData) -> FileOutcome {
    let key = match ctx.resolve(&data.file) {
        Ok(key) => key,
        Err(e) => return FileOutcome::rejected(&data.file, e),
    };
    let _doc = ctx.coordinator.acquire(&key).await;
    FileOutcome::from_result(&data.file, write_binary_locked(ctx, &key, data).await)
}

async fn write_binary_locked(
    ctx: &BridgeContext,
    key: &DocumentKey,
    data: &BinaryWriteData,
) -> Result<Outcome, BridgeError> {
    let current = ctx.read(key).await?;
    if current.as_deref() == Some(data.bytes.as_slice()) {
        debug!(document = %key, "content unchanged, skipping write");
        return Ok(Outcome::Unchanged);
    }

    // Binary content stays out of the native history; the coordinator keeps
    // the snapshot instead.
    let edit = Edit::Untracked(Some(data.bytes.clone()));
    ctx.apply(key, edit, data.undo_label.as_deref()).await?;
    ctx.save_and_record(key, |c| {
        c.record_binary_write(key, current);
        c.on_bridge_write(key);
    })
    .await?;
    Ok(Outcome::Applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use ferrule_core::Direction;
    use ferrule_host::{HostEditor, SaveBehaviour};
    use ferrule_undo::HistoryStep;
    use std::fs;
    use std::time::Duration;

    fn text(file: String, content: &str) -> WriteData {
        WriteData {
            file,
            content: content.to_string(),
            undo_label: Some("Bridge edit".into()),
        }
    }

    fn binary(file: String, bytes: &[u8]) -> BinaryWriteData {
        BinaryWriteData {
            file,
            bytes: bytes.to_vec(),
            undo_label: None,
        }
    }

    #[tokio::test]
    async fn creates_missing_file() {
        let fx = Fixture::new();
        let out = write_text(&fx.ctx, &text(fx.file("src/View.java"), "A")).await;
        assert_eq!(out.outcome, Outcome::Applied);
        assert_eq!(fs::read_to_string(fx.key("src/View.java").as_path()).unwrap(), "A");
        let state = fx.ctx.coordinator.state(&fx.key("src/View.java"));
        assert_eq!((state.undo_count, state.redo_count, state.locked), (1, 0, false));
    }

    #[tokio::test]
    async fn replaces_existing_and_counts_steps() {
        let fx = Fixture::new();
        write_text(&fx.ctx, &text(fx.file("a.txt"), "A")).await;
        let out = write_text(&fx.ctx, &text(fx.file("a.txt"), "B")).await;
        assert_eq!(out.outcome, Outcome::Applied);
        assert_eq!(fs::read_to_string(fx.key("a.txt").as_path()).unwrap(), "B");
        let state = fx.ctx.coordinator.state(&fx.key("a.txt"));
        assert_eq!((state.undo_count, state.redo_count), (2, 0));
    }

    #[tokio::test]
    async fn identical_text_is_a_no_op() {
        let fx = Fixture::new();
        fs::write(fx.key("a.txt").as_path(), "same").unwrap();
        let out = write_text(&fx.ctx, &text(fx.file("a.txt"), "same")).await;
        assert_eq!(out.outcome, Outcome::Unchanged);
        assert!(!fx.ctx.coordinator.can_perform(&fx.key("a.txt"), Direction::Undo));
        assert!(!fx.host.is_document_dirty(fx.key("a.txt").as_path()));
    }

    #[tokio::test]
    async fn surfaces_document_that_was_not_visible() {
        let fx = Fixture::new();
        write_text(&fx.ctx, &text(fx.file("a.txt"), "A")).await;
        assert!(fx.host.is_document_visible(fx.key("a.txt").as_path()));
    }

    #[tokio::test]
    async fn outside_path_touches_nothing() {
        let fx = Fixture::new();
        let other = tempfile::tempdir().unwrap();
        let target = other.path().join("evil.txt");
        let out = write_text(&fx.ctx, &text(target.to_string_lossy().into_owned(), "x")).await;
        assert!(matches!(out.outcome, Outcome::Skipped(_)));
        assert!(!target.exists());

        let out = write_binary(&fx.ctx, &binary(target.to_string_lossy().into_owned(), &[1])).await;
        assert!(matches!(out.outcome, Outcome::Skipped(_)));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn failed_save_leaves_ledger_and_releases_lock() {
        let fx = Fixture::new();
        fx.host.set_save_behaviour(SaveBehaviour::Fail);
        let out = write_text(&fx.ctx, &text(fx.file("a.txt"), "A")).await;
        assert!(out.is_failure());
        let key = fx.key("a.txt");
        assert_eq!(fx.ctx.coordinator.state(&key).undo_count, 0);
        assert!(!fx.ctx.coordinator.is_locked(&key));

        fx.host.set_save_behaviour(SaveBehaviour::Error);
        let out = write_binary(&fx.ctx, &binary(fx.file("b.bin"), &[1])).await;
        assert!(out.is_failure());
        assert!(!fx.ctx.coordinator.is_locked(&fx.key("b.bin")));
        assert!(fx.ctx.coordinator.binary_history(&fx.key("b.bin")).is_none());
    }

    #[tokio::test]
    async fn stalled_save_times_out_and_unlocks() {
        let fx = Fixture::with_timeout(Duration::from_millis(50));
        fx.host.set_save_behaviour(SaveBehaviour::Stall);
        let out = write_text(&fx.ctx, &text(fx.file("a.txt"), "A")).await;
        assert!(out.is_failure());
        let key = fx.key("a.txt");
        assert!(!fx.ctx.coordinator.is_locked(&key));

        // The document mutex was released too.
        tokio::time::timeout(Duration::from_secs(1), fx.ctx.coordinator.acquire(&key))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn binary_write_pushes_previous_bytes() {
        let fx = Fixture::new();
        let key = fx.key("img.bin");
        fs::write(key.as_path(), [0x00]).unwrap();

        let out = write_binary(&fx.ctx, &binary(fx.file("img.bin"), &[0x01])).await;
        assert_eq!(out.outcome, Outcome::Applied);
        assert_eq!(fs::read(key.as_path()).unwrap(), vec![0x01]);

        let history = fx.ctx.coordinator.binary_history(&key).unwrap();
        assert_eq!(history.undo_stack(), &[HistoryStep::Binary(Some(vec![0x00]))]);
        assert!(history.redo_stack().is_empty());
        assert_eq!(fx.ctx.coordinator.state(&key).undo_count, 1);
    }

    #[tokio::test]
    async fn identical_binary_is_a_no_op() {
        let fx = Fixture::new();
        let key = fx.key("img.bin");
        fs::write(key.as_path(), [7, 7]).unwrap();
        let out = write_binary(&fx.ctx, &binary(fx.file("img.bin"), &[7, 7])).await;
        assert_eq!(out.outcome, Outcome::Unchanged);
        assert!(fx.ctx.coordinator.binary_history(&key).is_none());
        assert_eq!(fx.ctx.coordinator.state(&key).undo_count, 0);
    }

    #[tokio::test]
    async fn text_write_after_binary_is_marked_native() {
        let fx = Fixture::new();
        let key = fx.key("mixed.txt");
        fs::write(key.as_path(), "zero").unwrap();
        write_binary(&fx.ctx, &binary(fx.file("mixed.txt"), b"one")).await;
        write_text(&fx.ctx, &text(fx.file("mixed.txt"), "two")).await;
        let history = fx.ctx.coordinator.binary_history(&key).unwrap();
        assert_eq!(
            history.undo_stack(),
            &[HistoryStep::Binary(Some(b"zero".to_vec())), HistoryStep::Native]
        );
        assert_eq!(fx.ctx.coordinator.state(&key).undo_count, 2);
    }

    #[tokio::test]
    async fn plain_text_writes_keep_no_step_history() {
        let fx = Fixture::new();
        write_text(&fx.ctx, &text(fx.file("a.txt"), "A")).await;
        write_text(&fx.ctx, &text(fx.file("a.txt"), "B")).await;
        assert!(fx.ctx.coordinator.binary_history(&fx.key("a.txt")).is_none());
    }

    #[tokio::test]
    async fn concurrent_writes_to_one_file_keep_the_ledger_consistent() {
        let fx = std::sync::Arc::new(Fixture::new());
        let mut tasks = Vec::new();
        for i in 0..8u8 {
            let fx = fx.clone();
            tasks.push(tokio::spawn(async move {
                write_binary(&fx.ctx, &binary(fx.file("race.bin"), &[i])).await
            }));
        }
        let mut applied = 0;
        for task in tasks {
            if task.await.unwrap().outcome == Outcome::Applied {
                applied += 1;
            }
        }
        let key = fx.key("race.bin");
        let state = fx.ctx.coordinator.state(&key);
        let history = fx.ctx.coordinator.binary_history(&key).unwrap();
        assert_eq!(state.undo_count as usize, applied);
        assert_eq!(history.undo_stack().len(), applied);
        assert!(!state.locked);
    }
}
