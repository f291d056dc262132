use crate::TrackerContext;
use crate::output;
use anyhow::Result;

/// Starts tracking the working tree.
///
/// On first run this creates the snapshot store and takes the initial
/// snapshot; afterwards it only reports that the tree is already tracked.
///
/// # Errors
///
/// Returns an error if another session is active in the tree or the
/// initial snapshot cannot be written.
pub fn execute(ctx: &TrackerContext) -> Result<()> {
    let was_initialized = ctx.is_initialized();

    let mut tracker = ctx.service()?;
    tracker.initialize()?;
    let tracked = tracker.status().tracked_files;
    tracker.shutdown()?;

    if was_initialized {
        output::info(&format!(
            "Already initialized: {} ({tracked} files tracked)",
            ctx.store_dir().display()
        ));
    } else {
        output::success(&format!(
            "Initialized snapshot store in {}",
            ctx.store_dir().display()
        ));
        output::action("Tracking", &format!("{tracked} files"));
    }

    Ok(())
}
