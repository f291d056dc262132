use crate::TrackerContext;
use crate::output;
use crate::tracking::{Change, ChangeKind, ChangeSet};
use crate::utils::formatters::{format_change, format_change_short};
use anyhow::Result;
use colored::Colorize;

/// Shows files added, modified or deleted since the newest snapshot.
///
/// # Errors
///
/// Returns an error if the tree is not initialized or the store cannot be read.
pub fn execute(ctx: &TrackerContext, short: bool) -> Result<()> {
    let tracker = ctx.attached_service()?;
    let changes = tracker.poll()?;

    if changes.is_empty() {
        output::info("No changes detected");
        if !short {
            println!("Working tree matches the newest snapshot");
        }
        return Ok(());
    }

    if short {
        for change in changes.iter() {
            println!("{}", format_change_short(&change));
        }
    } else {
        print_group(&changes, ChangeKind::Added, "New files:");
        print_group(&changes, ChangeKind::Modified, "Modified files:");
        print_group(&changes, ChangeKind::Deleted, "Deleted files:");
        output::verbose(&format!("{} change(s) in total", changes.len()));
    }

    Ok(())
}

fn print_group(changes: &ChangeSet, kind: ChangeKind, header: &str) {
    let group: Vec<Change> = changes.iter().filter(|c| c.kind == kind).collect();
    if group.is_empty() {
        return;
    }

    println!("{}", header.bold());
    for change in &group {
        println!("  {}", format_change(change));
    }
    println!();
}
