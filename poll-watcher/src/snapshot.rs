//! Point-in-time captures of a watched directory and the diff between two of them.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::WatchConfig;
use crate::error::{Result, WatcherError};
use crate::event::{ChangeEvent, ChangeKind};

/// Last-modification time of an entry.
pub type Timestamp = DateTime<Utc>;

/// Mapping of every entry under a root to its modification time.
///
/// The root itself is not part of the snapshot. Keys are full paths as
/// discovered by the walk, so two captures of the same root are directly
/// comparable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<PathBuf, Timestamp>,
}

impl Snapshot {
    /// An empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from explicit entries. Later duplicates win.
    pub fn from_entries<I, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, Timestamp)>,
        P: Into<PathBuf>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(path, modified)| (path.into(), modified))
                .collect(),
        }
    }

    /// Walk the configured root and record every entry's modification time.
    ///
    /// Fails with [`WatcherError::PathUnavailable`] if the root is missing,
    /// not a directory, cannot be listed, or disappears during the walk. A
    /// partial snapshot is never returned for a vanished root, since diffing
    /// it would report every entry as erased.
    pub fn capture(config: &WatchConfig) -> Result<Self> {
        let root = config.root.as_path();
        ensure_root(root)?;

        let mut walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(config.follow_symlinks);
        if let Some(depth) = config.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut entries = BTreeMap::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry under {}: {e}", root.display());
                    continue;
                }
            };

            let modified = entry
                .metadata()
                .map_err(io::Error::from)
                .and_then(|metadata| metadata.modified());
            match modified {
                Ok(modified) => {
                    entries.insert(entry.into_path(), to_timestamp(modified));
                }
                Err(e) => {
                    debug!("Skipping {}: {e}", entry.path().display());
                }
            }
        }

        // The root may have vanished mid-walk, leaving a truncated listing.
        ensure_root(root)?;

        Ok(Self { entries })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the snapshot has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Modification time recorded for a path.
    pub fn get(&self, path: &Path) -> Option<Timestamp> {
        self.entries.get(path).copied()
    }

    /// Check if a path was present.
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Iterate entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, Timestamp)> {
        self.entries
            .iter()
            .map(|(path, modified)| (path.as_path(), *modified))
    }

    /// Compare this (previous) snapshot against `current`.
    ///
    /// Created and modified events come first in path order, followed by
    /// erased events in path order. Paths with an unchanged timestamp produce
    /// nothing.
    pub fn diff(&self, current: &Snapshot) -> Vec<ChangeEvent> {
        let mut events = Vec::new();

        for (path, modified) in &current.entries {
            match self.entries.get(path) {
                None => events.push(ChangeEvent::new(path.clone(), ChangeKind::Created)),
                Some(previous) if previous != modified => {
                    events.push(ChangeEvent::new(path.clone(), ChangeKind::Modified));
                }
                Some(_) => {}
            }
        }

        events.extend(
            self.entries
                .keys()
                .filter(|path| !current.entries.contains_key(*path))
                .map(|path| ChangeEvent::new(path.clone(), ChangeKind::Erased)),
        );

        events
    }
}

/// Convert a filesystem time, saturating at the bounds `Timestamp` can hold.
///
/// Filesystems accept modification times far outside chrono's range, and such
/// an entry must still compare as changed against its previous value.
pub(crate) fn to_timestamp(modified: SystemTime) -> Timestamp {
    let converted = match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs())
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, after.subsec_nanos())),
        Err(e) => {
            let before = e.duration();
            i64::try_from(before.as_secs()).ok().and_then(|secs| {
                match before.subsec_nanos() {
                    0 => DateTime::from_timestamp(-secs, 0),
                    nanos => DateTime::from_timestamp(-secs - 1, 1_000_000_000 - nanos),
                }
            })
        }
    };

    converted.unwrap_or_else(|| {
        debug!("Modification time {modified:?} out of range, saturating");
        if modified < UNIX_EPOCH {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        }
    })
}

/// Check that `root` exists, is a directory, and can be listed.
pub(crate) fn ensure_root(root: &Path) -> Result<()> {
    let metadata =
        fs::metadata(root).map_err(|e| WatcherError::path_unavailable(root, e.to_string()))?;
    if !metadata.is_dir() {
        return Err(WatcherError::path_unavailable(root, "not a directory"));
    }
    fs::read_dir(root).map_err(|e| WatcherError::path_unavailable(root, e.to_string()))?;
    Ok(())
}
