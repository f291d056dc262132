use crate::TrackerContext;
use crate::output;
use crate::utils::formatters::{format_snapshot_time, truncate_with_ellipsis};
use anyhow::Result;
use colored::Colorize;

const COMMENT_WIDTH: usize = 50;

/// Lists snapshots, oldest first.
///
/// # Errors
///
/// Returns an error if the tree is not initialized or the store cannot be read.
pub fn execute(ctx: &TrackerContext) -> Result<()> {
    ctx.check_initialized()?;
    let snapshots = ctx.store().list()?;

    if snapshots.is_empty() {
        output::info("No snapshots yet");
        return Ok(());
    }

    for summary in &snapshots {
        let comment = if summary.comment.is_empty() {
            "(no comment)".dimmed().to_string()
        } else {
            truncate_with_ellipsis(&summary.comment, COMMENT_WIDTH)
        };
        println!(
            "{}  {}  {:>6} files  {}",
            summary.id.as_str().yellow(),
            format_snapshot_time(&summary.id).dimmed(),
            summary.file_count,
            comment
        );
    }

    output::verbose(&format!("{} snapshot(s)", snapshots.len()));
    Ok(())
}
