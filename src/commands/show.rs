use super::parse_snapshot_id;
use crate::TrackerContext;
use crate::utils::formatters::format_snapshot_time;
use anyhow::Result;
use colored::Colorize;

/// Prints a snapshot's metadata followed by its files and their hashes.
///
/// # Errors
///
/// Returns an error if the id is invalid or the snapshot cannot be loaded.
pub fn execute(ctx: &TrackerContext, id: &str) -> Result<()> {
    ctx.check_initialized()?;
    let id = parse_snapshot_id(id)?;
    let meta = ctx.store().load(&id)?;

    println!("{} {}", "snapshot".yellow(), id.as_str().yellow());
    println!("Date:    {}", format_snapshot_time(&id));
    println!("Files:   {}", meta.files.len());
    if !meta.comment.is_empty() {
        println!();
        println!("    {}", meta.comment);
    }
    println!();

    for (path, hash) in &meta.files {
        println!("{}  {path}", &hash[..hash.len().min(12)].dimmed());
    }

    Ok(())
}
