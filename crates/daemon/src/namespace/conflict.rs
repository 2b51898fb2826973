//! Behavior when a mutation's destination already exists.

use std::fs;
use std::io;

use serde::{Deserialize, Serialize};

use super::error::FsError;
use super::resolver::ResolvedPath;

/// What to do when the destination of a rename, move, or write exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Refuse with `AlreadyExists`.
    #[default]
    Fail,
    /// Replace the destination.
    Overwrite,
}

impl ConflictPolicy {
    /// Policy for a client-supplied overwrite flag, falling back to `default`.
    pub fn from_overwrite_flag(overwrite: Option<bool>, default: ConflictPolicy) -> Self {
        match overwrite {
            Some(true) => ConflictPolicy::Overwrite,
            Some(false) => ConflictPolicy::Fail,
            None => default,
        }
    }

    /// Whether an existing destination may be replaced.
    pub fn allows_overwrite(self) -> bool {
        matches!(self, ConflictPolicy::Overwrite)
    }

    /// Check `destination` before a rename.
    ///
    /// Under [`ConflictPolicy::Fail`] anything at the destination (including
    /// a dangling symlink) is a conflict. There is a window between this
    /// check and the rename itself; a concurrent writer can still win it.
    pub fn check_destination(self, destination: &ResolvedPath) -> Result<(), FsError> {
        if self.allows_overwrite() {
            return Ok(());
        }

        match fs::symlink_metadata(destination.as_path()) {
            Ok(_) => Err(FsError::AlreadyExists(destination.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FsError::from_io(e, destination.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::resolver::Root;
    use tempfile::TempDir;

    #[test]
    fn test_default_is_fail() {
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::Fail);
    }

    #[test]
    fn test_from_overwrite_flag() {
        assert_eq!(
            ConflictPolicy::from_overwrite_flag(Some(true), ConflictPolicy::Fail),
            ConflictPolicy::Overwrite
        );
        assert_eq!(
            ConflictPolicy::from_overwrite_flag(Some(false), ConflictPolicy::Overwrite),
            ConflictPolicy::Fail
        );
        assert_eq!(
            ConflictPolicy::from_overwrite_flag(None, ConflictPolicy::Overwrite),
            ConflictPolicy::Overwrite
        );
    }

    #[test]
    fn test_check_destination() {
        let temp_dir = TempDir::new().unwrap();
        let root = Root::open(temp_dir.path(), false).unwrap();
        fs::write(root.path().join("taken.txt"), "x").unwrap();

        let taken = root.resolve("taken.txt").unwrap();
        let free = root.resolve("free.txt").unwrap();

        assert!(matches!(
            ConflictPolicy::Fail.check_destination(&taken),
            Err(FsError::AlreadyExists(p)) if p == "/taken.txt"
        ));
        assert!(ConflictPolicy::Fail.check_destination(&free).is_ok());
        assert!(ConflictPolicy::Overwrite.check_destination(&taken).is_ok());
    }

    #[test]
    fn test_serde_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: ConflictPolicy,
        }
        let w: Wrapper = toml::from_str("policy = \"overwrite\"").unwrap();
        assert_eq!(w.policy, ConflictPolicy::Overwrite);
    }
}
