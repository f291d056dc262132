use crate::storage::SnapshotId;
use crate::tracking::{Change, ChangeKind};
use chrono::{Local, NaiveDateTime};
use colored::Colorize;

/// Returns the colored status character
#[must_use]
pub fn colored_letter(kind: ChangeKind) -> String {
    let letter = kind.letter().to_string();
    match kind {
        ChangeKind::Added => letter.green().to_string(),
        ChangeKind::Modified => letter.yellow().to_string(),
        ChangeKind::Deleted => letter.red().to_string(),
    }
}

/// Formats a changed path with its colored status
#[must_use]
pub fn format_change(change: &Change) -> String {
    format!("{} {}", colored_letter(change.kind), change.path)
}

/// Formats a changed path for short, uncolored output
#[must_use]
pub fn format_change_short(change: &Change) -> String {
    format!("{} {}", change.kind.letter(), change.path)
}

/// Formats a snapshot id as `YYYY-MM-DD HH:MM:SS (N units ago)`.
#[must_use]
pub fn format_snapshot_time(id: &SnapshotId) -> String {
    id.datetime().map_or_else(
        || id.to_string(),
        |at| {
            format!(
                "{} ({})",
                at.format("%Y-%m-%d %H:%M:%S"),
                format_relative_time(at, Local::now().naive_local())
            )
        },
    )
}

/// Formats the distance from `then` to `now`
#[must_use]
pub fn format_relative_time(then: NaiveDateTime, now: NaiveDateTime) -> String {
    let diff = (now - then).num_seconds();

    if diff < 0 {
        return "in the future".to_string();
    }

    let (value, unit) = if diff < 60 {
        (diff, "second")
    } else if diff < 3600 {
        (diff / 60, "minute")
    } else if diff < 86400 {
        (diff / 3600, "hour")
    } else if diff < 2_592_000 {
        (diff / 86400, "day")
    } else if diff < 31_536_000 {
        (diff / 2_592_000, "month")
    } else {
        (diff / 31_536_000, "year")
    };

    if value == 1 {
        format!("{value} {unit} ago")
    } else {
        format!("{value} {unit}s ago")
    }
}

/// Truncates a string to at most `max_chars` characters with ellipsis
#[must_use]
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else if max_chars < 3 {
        s.chars().take(max_chars).collect()
    } else {
        let head: String = s.chars().take(max_chars - 3).collect();
        format!("{head}...")
    }
}
