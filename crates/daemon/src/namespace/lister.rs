//! Directory listing in presentation order.
//!
//! Every call reads live storage; nothing is cached between listings.

use std::cmp::Ordering;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use protocol::messages::Entry;
use tracing::debug;

use super::error::FsError;
use super::guard::{self, LinkPolicy};
use super::resolver::{ResolvedPath, Root};

/// A directory entry with metadata.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Full storage path.
    pub path: PathBuf,
    /// Whether the entry itself is a directory. Symlinks are not followed,
    /// so a link to a directory reports `false`.
    pub is_directory: bool,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modified timestamp.
    pub modified: SystemTime,
}

impl DirectoryEntry {
    /// Convert to protocol Entry.
    pub fn to_protocol(&self) -> Entry {
        let modified = self
            .modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Entry {
            name: self.name.clone(),
            is_directory: self.is_directory,
            size: self.size,
            modified,
        }
    }
}

/// Enumerates the immediate children of namespace directories.
#[derive(Debug, Clone)]
pub struct EntryLister {
    root: Root,
}

impl EntryLister {
    /// Create a lister bound to `root`.
    pub fn new(root: Root) -> Self {
        Self { root }
    }

    /// List the children of `directory`: directories first, then files,
    /// each group in [`compare_names`] order.
    pub fn list(&self, directory: &ResolvedPath) -> Result<Vec<DirectoryEntry>, FsError> {
        let shown = directory.to_string();
        guard::ensure_real_containment(
            self.root.path(),
            directory.as_path(),
            &shown,
            LinkPolicy::Follow,
        )?;

        let metadata =
            fs::metadata(directory.as_path()).map_err(|e| FsError::from_io(e, shown.clone()))?;
        if !metadata.is_dir() {
            return Err(FsError::NotADirectory(shown));
        }

        let entries =
            fs::read_dir(directory.as_path()).map_err(|e| FsError::from_io(e, shown.clone()))?;

        let mut results = Vec::new();

        for entry_result in entries {
            let entry = match entry_result {
                Ok(e) => e,
                Err(e) => {
                    debug!(path = %shown, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().to_string();

            // DirEntry::metadata does not traverse symlinks.
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    // Entry vanished between readdir and stat.
                    debug!(path = %shown, name = %name, error = %e, "Skipping entry");
                    continue;
                }
            };

            let is_directory = metadata.is_dir();
            let size = if metadata.is_file() { metadata.len() } else { 0 };

            results.push(DirectoryEntry {
                name,
                path: entry.path(),
                is_directory,
                size,
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        sort_entries(&mut results);

        debug!(path = %shown, count = results.len(), "Listed directory");
        Ok(results)
    }
}

/// Sort entries into presentation order.
pub fn sort_entries(entries: &mut [DirectoryEntry]) {
    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| compare_names(&a.name, &b.name))
    });
}

/// Case-insensitive name order with a deterministic tie-break.
///
/// Names are compared by their lowercase forms. Names that differ only by
/// case put lowercase first at the first differing character, then fall
/// back to raw byte order, so the result is a total order.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| case_tiebreak(a, b))
        .then_with(|| a.cmp(b))
}

fn case_tiebreak(a: &str, b: &str) -> Ordering {
    match a.chars().zip(b.chars()).find(|(x, y)| x != y) {
        Some((x, y)) => match (x.is_lowercase(), y.is_lowercase()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        },
        None => Ordering::Equal,
    }
}
