pub mod autosave;
pub mod init;
pub mod list;
pub mod restore;
pub mod save;
pub mod show;
pub mod status;
pub mod verify;
pub mod watch;

use crate::storage::SnapshotId;
use anyhow::Result;

/// Parses a snapshot id given on the command line.
///
/// # Errors
///
/// Returns an error if `raw` is not a `YYYYMMDD_HHMMSS` timestamp.
pub fn parse_snapshot_id(raw: &str) -> Result<SnapshotId> {
    SnapshotId::parse(raw.trim()).ok_or_else(|| {
        anyhow::anyhow!("Invalid snapshot id '{raw}': expected YYYYMMDD_HHMMSS (see 'snaptrack list')")
    })
}
