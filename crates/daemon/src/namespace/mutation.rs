//! Structural mutations of the namespace.
//!
//! Every operation takes [`ResolvedPath`] arguments and revalidates them
//! against the root (lexically and on disk) before touching storage. The
//! service keeps no state between calls; concurrent callers are serialized
//! only by the atomicity of the underlying syscalls.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use protocol::messages::{ClearFailure, ClearReport, MutationResult};
use tracing::{debug, info, warn};

use super::conflict::ConflictPolicy;
use super::error::FsError;
use super::guard::{self, LinkPolicy};
use super::resolver::{ResolvedPath, Root};

/// Default suffix enforced on text files.
pub const DEFAULT_TEXT_SUFFIX: &str = ".txt";

/// Create, write, delete, rename, and move entries under a [`Root`].
#[derive(Debug, Clone)]
pub struct MutationService {
    root: Root,
    rename_conflict: ConflictPolicy,
    text_suffix: String,
}

impl MutationService {
    /// Create a service with the default policies: renames and moves fail
    /// on an existing destination, text files get `.txt`.
    pub fn new(root: Root) -> Self {
        Self {
            root,
            rename_conflict: ConflictPolicy::Fail,
            text_suffix: DEFAULT_TEXT_SUFFIX.to_string(),
        }
    }

    /// Set the policy for renames and moves onto an existing destination.
    pub fn with_rename_conflict(mut self, policy: ConflictPolicy) -> Self {
        self.rename_conflict = policy;
        self
    }

    /// Set the suffix enforced on text files.
    pub fn with_text_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.text_suffix = suffix.into();
        self
    }

    /// The root this service mutates.
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Create a single directory. The parent is not created.
    pub fn create_directory(&self, path: &ResolvedPath) -> Result<MutationResult, FsError> {
        self.ensure_contained(path, LinkPolicy::NoFollow)?;

        fs::create_dir(path.as_path()).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(parent_display(path)),
            _ => FsError::from_io(e, path.to_string()),
        })?;

        info!(path = %path, "Created directory");
        Ok(MutationResult::created(
            "Folder created successfully",
            path.relative(),
        ))
    }

    /// Write `content` to a text file, appending the text suffix to the
    /// name when it is missing.
    ///
    /// With [`ConflictPolicy::Overwrite`] an existing file is replaced; with
    /// [`ConflictPolicy::Fail`] it is an `AlreadyExists` error.
    pub fn create_text_file(
        &self,
        path: &ResolvedPath,
        content: &str,
        conflict: ConflictPolicy,
    ) -> Result<MutationResult, FsError> {
        let path = ensure_text_suffix(path, &self.text_suffix)?;
        // Writes go through a final symlink, so its target must be contained.
        self.ensure_contained(&path, LinkPolicy::Follow)?;

        match fs::metadata(path.as_path()) {
            Ok(metadata) if metadata.is_dir() => {
                return Err(FsError::IsADirectory(path.to_string()));
            }
            _ => {}
        }

        let written = if conflict.allows_overwrite() {
            fs::write(path.as_path(), content)
        } else {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path.as_path())
                .and_then(|mut file| file.write_all(content.as_bytes()))
        };

        written.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(parent_display(&path)),
            _ => FsError::from_io(e, path.to_string()),
        })?;

        info!(path = %path, bytes = content.len(), "Wrote text file");
        Ok(MutationResult::created(
            "File created successfully",
            path.relative(),
        ))
    }

    /// Read a UTF-8 text file.
    pub fn read_text_file(&self, path: &ResolvedPath) -> Result<String, FsError> {
        self.ensure_contained(path, LinkPolicy::Follow)?;

        let metadata =
            fs::metadata(path.as_path()).map_err(|e| FsError::from_io(e, path.to_string()))?;
        if metadata.is_dir() {
            return Err(FsError::IsADirectory(path.to_string()));
        }

        fs::read_to_string(path.as_path()).map_err(|e| FsError::from_io(e, path.to_string()))
    }

    /// Delete a file, or a directory and everything beneath it.
    ///
    /// A symlink is removed itself; its target is untouched.
    pub fn delete_entry(&self, path: &ResolvedPath) -> Result<MutationResult, FsError> {
        if path.is_root() {
            return Err(FsError::Forbidden("cannot delete the namespace root".to_string()));
        }
        self.ensure_contained(path, LinkPolicy::NoFollow)?;

        let metadata = fs::symlink_metadata(path.as_path())
            .map_err(|e| FsError::from_io(e, path.to_string()))?;

        let removed = if metadata.is_dir() {
            fs::remove_dir_all(path.as_path())
        } else {
            fs::remove_file(path.as_path())
        };
        removed.map_err(|e| FsError::from_io(e, path.to_string()))?;

        info!(path = %path, directory = metadata.is_dir(), "Deleted entry");
        Ok(MutationResult::message("Deleted successfully"))
    }

    /// Rename an entry within its directory.
    pub fn rename_entry(
        &self,
        from: &ResolvedPath,
        to: &ResolvedPath,
    ) -> Result<MutationResult, FsError> {
        if from.is_root() || to.is_root() {
            return Err(FsError::Forbidden("cannot rename the namespace root".to_string()));
        }
        if from.parent_relative() != to.parent_relative() {
            return Err(FsError::InvalidName(format!(
                "rename must stay within one directory: {} -> {}",
                from, to
            )));
        }
        self.ensure_contained(from, LinkPolicy::NoFollow)?;
        self.ensure_contained(to, LinkPolicy::NoFollow)?;

        fs::symlink_metadata(from.as_path()).map_err(|e| FsError::from_io(e, from.to_string()))?;

        if from == to {
            debug!(path = %from, "Rename to same name, nothing to do");
            return Ok(MutationResult::message("Renamed successfully"));
        }

        self.rename_conflict.check_destination(to)?;
        fs::rename(from.as_path(), to.as_path()).map_err(|e| rename_error(e, from, to))?;

        info!(from = %from, to = %to, "Renamed entry");
        Ok(MutationResult::created("Renamed successfully", to.relative()))
    }

    /// Move an entry, creating any missing parents of the target first.
    pub fn move_entry(
        &self,
        source: &ResolvedPath,
        target: &ResolvedPath,
    ) -> Result<MutationResult, FsError> {
        if source.is_root() || target.is_root() {
            return Err(FsError::Forbidden("cannot move the namespace root".to_string()));
        }
        self.ensure_contained(source, LinkPolicy::NoFollow)?;
        self.ensure_contained(target, LinkPolicy::NoFollow)?;

        fs::symlink_metadata(source.as_path())
            .map_err(|e| FsError::from_io(e, source.to_string()))?;

        if source == target {
            debug!(path = %source, "Move onto itself, nothing to do");
            return Ok(MutationResult::message("Moved successfully"));
        }
        if target.is_within(source) {
            return Err(FsError::InvalidMove(format!(
                "cannot move {} into itself ({})",
                source, target
            )));
        }

        self.rename_conflict.check_destination(target)?;

        let created = create_missing_parents(target)?;

        if let Err(e) = fs::rename(source.as_path(), target.as_path()) {
            remove_created_parents(&created);
            return Err(rename_error(e, source, target));
        }

        info!(from = %source, to = %target, "Moved entry");
        Ok(MutationResult::created("Moved successfully", target.relative()))
    }

    /// Remove every child of the root, continuing past failures.
    ///
    /// Fails only if the root itself cannot be read; per-child failures are
    /// collected in the report.
    pub fn clear_all(&self) -> Result<ClearReport, FsError> {
        let entries = fs::read_dir(self.root.path()).map_err(|e| FsError::from_io(e, "/"))?;

        let mut report = ClearReport::default();

        for entry_result in entries {
            let entry = match entry_result {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "Failed to read root entry during clear");
                    report.failed.push(ClearFailure {
                        name: String::new(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().to_string();
            let removed = entry.file_type().and_then(|file_type| {
                if file_type.is_dir() {
                    fs::remove_dir_all(entry.path())
                } else {
                    fs::remove_file(entry.path())
                }
            });

            match removed {
                Ok(()) => report.removed.push(name),
                Err(e) => {
                    warn!(name = %name, error = %e, "Failed to remove entry during clear");
                    report.failed.push(ClearFailure {
                        name,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Cleared namespace root"
        );
        Ok(report)
    }

    fn ensure_contained(&self, path: &ResolvedPath, links: LinkPolicy) -> Result<(), FsError> {
        if !guard::contains(self.root.path(), path.as_path()) {
            warn!(path = %path.as_path().display(), "Path outside namespace root reached storage layer");
            return Err(FsError::Forbidden(path.to_string()));
        }
        guard::ensure_real_containment(self.root.path(), path.as_path(), &path.to_string(), links)
    }
}

/// Append `suffix` to the final segment unless it already ends with it
/// (ASCII case-insensitive). Applying this twice is the same as once.
pub fn ensure_text_suffix(path: &ResolvedPath, suffix: &str) -> Result<ResolvedPath, FsError> {
    let name = path
        .file_name()
        .ok_or_else(|| FsError::InvalidName("a file name is required".to_string()))?;

    if suffix.is_empty() || name.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase()) {
        return Ok(path.clone());
    }
    path.with_name_suffix(suffix)
}

/// Create the missing ancestors of `target`, returning them deepest first.
fn create_missing_parents(target: &ResolvedPath) -> Result<Vec<PathBuf>, FsError> {
    let mut missing = Vec::new();
    let mut current = target.as_path().parent();
    while let Some(dir) = current {
        if fs::symlink_metadata(dir).is_ok() {
            break;
        }
        missing.push(dir.to_path_buf());
        current = dir.parent();
    }

    if let Some(deepest) = missing.first() {
        fs::create_dir_all(deepest).map_err(|e| FsError::from_io(e, parent_display(target)))?;
    }
    Ok(missing)
}

/// Undo [`create_missing_parents`] after a failed move.
fn remove_created_parents(created: &[PathBuf]) {
    for dir in created {
        if let Err(e) = fs::remove_dir(dir) {
            debug!(path = %dir.display(), error = %e, "Left behind directory created for move");
            break;
        }
    }
}

fn parent_display(path: &ResolvedPath) -> String {
    format!("/{}", path.parent_relative().unwrap_or(""))
}

fn rename_error(err: io::Error, from: &ResolvedPath, to: &ResolvedPath) -> FsError {
    match err.kind() {
        io::ErrorKind::NotFound => FsError::NotFound(from.to_string()),
        _ => FsError::from_io(err, to.to_string()),
    }
}
