use super::parse_snapshot_id;
use crate::storage::VerifyIssue;
use crate::{TrackerContext, output};
use anyhow::{Result, bail};
use colored::Colorize;

/// Rehashes a snapshot's stored copies and reports any that do not match
/// its metadata.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be loaded or any copy is
/// missing or corrupted.
pub fn execute(ctx: &TrackerContext, id: &str) -> Result<()> {
    ctx.check_initialized()?;
    let id = parse_snapshot_id(id)?;
    let store = ctx.store();
    let file_count = store.load(&id)?.files.len();
    let issues = store.verify(&id)?;

    if issues.is_empty() {
        output::success(&format!("Snapshot {id} is intact ({file_count} files checked)"));
        return Ok(());
    }

    for issue in &issues {
        let label = match issue {
            VerifyIssue::Missing(_) => "missing".red(),
            VerifyIssue::Corrupted { .. } => "corrupted".yellow(),
        };
        println!("{label:>10}  {}", issue.path());
        output::verbose(&format!("  {issue}"));
    }

    bail!(
        "Snapshot {id} failed verification: {} of {file_count} file(s) affected",
        issues.len()
    );
}
