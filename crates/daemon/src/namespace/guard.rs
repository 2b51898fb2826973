//! Containment policy for the namespace.
//!
//! [`contains`] is the single security gate: every path handed to storage
//! must pass it after lexical normalization. [`ensure_real_containment`]
//! adds an on-disk check so a symlink inside the root cannot be used to
//! reach outside it.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use super::error::FsError;

/// Whether the final path component may be followed if it is a symlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPolicy {
    /// Resolve the final component (reading or listing through a link).
    Follow,
    /// Operate on the link itself (delete, rename, move, create).
    NoFollow,
}

/// Lexically normalize a path: drop `.`, resolve `..` against preceding
/// segments, and collapse redundant separators. Performs no I/O.
///
/// `..` at the filesystem root stays at the root, matching POSIX.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(segment) => normalized.push(segment),
        }
    }

    normalized
}

/// True iff `candidate`, once normalized, is `root` or lies beneath it.
///
/// Comparison is by whole components, so `/srv/root-other` is not inside
/// `/srv/root`. `root` must already be normalized (roots are canonicalized
/// when opened).
pub fn contains(root: &Path, candidate: &Path) -> bool {
    normalize(candidate).starts_with(root)
}

/// Verify that the real location of `target` stays under `canonical_root`.
///
/// The deepest existing ancestor of the path is canonicalized, which
/// resolves every symlink along the way. Components that do not exist yet
/// cannot be links, so checking the ancestor is sufficient. With
/// [`LinkPolicy::NoFollow`] the final component is left unresolved.
pub fn ensure_real_containment(
    canonical_root: &Path,
    target: &Path,
    shown: &str,
    links: LinkPolicy,
) -> Result<(), FsError> {
    let mut probe = match links {
        LinkPolicy::Follow => target,
        LinkPolicy::NoFollow if target == canonical_root => target,
        LinkPolicy::NoFollow => target.parent().unwrap_or(target),
    }
    .to_path_buf();
    let mut hops = 0;

    loop {
        match fs::canonicalize(&probe) {
            Ok(real) => {
                if contains(canonical_root, &real) {
                    return Ok(());
                }
                warn!(
                    path = %shown,
                    real = %real.display(),
                    "Symlink leads outside the namespace root"
                );
                return Err(FsError::Forbidden(shown.to_string()));
            }
            Err(e) if is_missing(&e) => {
                // A dangling link is still followed by writes, so check
                // where it points.
                if hops < MAX_LINK_HOPS && is_symlink(&probe) {
                    let dest = fs::read_link(&probe).map_err(|e| FsError::from_io(e, shown))?;
                    probe = match probe.parent() {
                        Some(parent) => parent.join(dest),
                        None => dest,
                    };
                    hops += 1;
                    continue;
                }
                match probe.parent() {
                    Some(parent) => probe = parent.to_path_buf(),
                    None => return Ok(()),
                }
            }
            Err(e) => return Err(FsError::from_io(e, shown)),
        }
    }
}

const MAX_LINK_HOPS: usize = 40;

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

fn is_missing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}
