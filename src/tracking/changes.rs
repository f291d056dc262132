//! Differences between two [`FileState`]s.
//!
//! A path present only in the newer state is added, one present only in the
//! older state is deleted, and one whose hash differs is modified. Each list
//! of the resulting [`ChangeSet`] is sorted by path.

use super::FileState;
use serde::Serialize;
use std::fmt;

/// What happened to a single path between two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Single-letter status code, as printed by `status --short`.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Added => 'A',
            Self::Modified => 'M',
            Self::Deleted => 'D',
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// One changed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub path: String,
    pub kind: ChangeKind,
}

/// Differences between a previous and a current [`FileState`].
///
/// The three lists are disjoint and each is sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    /// Present now, absent before.
    pub added: Vec<String>,
    /// Present in both with different hashes.
    pub modified: Vec<String>,
    /// Present before, absent now.
    pub deleted: Vec<String>,
}

impl ChangeSet {
    /// Total number of changed paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// All changes, grouped as added, modified, deleted.
    pub fn iter(&self) -> impl Iterator<Item = Change> + '_ {
        let tag = |kind: ChangeKind| {
            move |path: &String| Change {
                path: path.clone(),
                kind,
            }
        };
        self.added
            .iter()
            .map(tag(ChangeKind::Added))
            .chain(self.modified.iter().map(tag(ChangeKind::Modified)))
            .chain(self.deleted.iter().map(tag(ChangeKind::Deleted)))
    }
}

/// Compares `prev` against `curr`.
///
/// Pure and total: no I/O, and every pair of states produces a result.
#[must_use]
pub fn diff(prev: &FileState, curr: &FileState) -> ChangeSet {
    let mut changes = ChangeSet::default();

    // Both maps iterate in path order, so each list comes out sorted.
    for (path, hash) in curr.iter() {
        match prev.get(path) {
            None => changes.added.push(path.to_string()),
            Some(old) if old != hash => changes.modified.push(path.to_string()),
            Some(_) => {}
        }
    }
    changes.deleted = prev
        .paths()
        .filter(|path| !curr.contains(path))
        .map(str::to_string)
        .collect();

    changes
}
