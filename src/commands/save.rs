use crate::TrackerContext;
use crate::output;
use anyhow::Result;

/// Saves a snapshot of the working tree with `message` as its comment.
///
/// # Errors
///
/// Returns an error if the tree is not initialized, another session is
/// active, or the snapshot cannot be written.
pub fn execute(ctx: &TrackerContext, message: &str) -> Result<()> {
    let mut tracker = ctx.exclusive_service()?;
    let changes = tracker.poll()?;
    let report = tracker.save_now(message)?;

    output::success(&format!("Saved snapshot {}", report.id));
    if changes.is_empty() {
        output::verbose("No changes since the previous snapshot");
    } else {
        output::verbose(&format!("{} change(s) since the previous snapshot", changes.len()));
    }
    output::warning_list(
        &format!("{} file(s) could not be copied and were left out:", report.omitted.len()),
        &report.omitted,
    );

    println!("{}", report.id);
    tracker.shutdown()?;
    Ok(())
}
