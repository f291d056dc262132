use super::parse_snapshot_id;
use crate::storage::RestoreMode;
use crate::{TrackerContext, TrackerError, output};
use anyhow::{Result, bail};

/// Copies a snapshot back over the working tree.
///
/// Files the snapshot does not contain are left alone unless `reconcile`
/// is set, in which case tracked files absent from the snapshot are removed.
///
/// # Errors
///
/// Returns an error if another session is active, the snapshot does not
/// exist or cannot be read, or some of its stored files are missing.
pub fn execute(ctx: &TrackerContext, id: &str, reconcile: bool) -> Result<()> {
    let id = parse_snapshot_id(id)?;
    let mut tracker = ctx.exclusive_service()?;
    let mode = if reconcile {
        RestoreMode::Reconcile
    } else {
        RestoreMode::Overlay
    };

    match tracker.restore_to_with(&id, mode) {
        Ok(state) => {
            output::success(&format!("Restored snapshot {id} ({} files)", state.len()));
            tracker.shutdown()?;
            Ok(())
        }
        Err(TrackerError::PartialRestore {
            id,
            missing,
            restored,
        }) => {
            output::warning_list(
                &format!(
                    "Restored {} file(s) from {id}; these could not be restored:",
                    restored.len()
                ),
                &missing,
            );
            bail!("Snapshot {id} was only partially restored");
        }
        Err(e) => Err(e.into()),
    }
}
