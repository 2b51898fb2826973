//! Conversion of untrusted client paths into containment-checked paths.
//!
//! Client paths are `/`-separated and always relative to the [`Root`]; a
//! leading `/` is ignored and `\` is treated as a separator. Resolution is
//! purely lexical: nothing here touches storage except [`Root::open`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::FsError;
use super::guard;

/// The single trusted base directory of the namespace.
///
/// The path is canonical, so lexical containment checks against it cannot
/// be fooled by symlinks in the root's own ancestry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    path: PathBuf,
}

impl Root {
    /// Open the root directory, optionally creating it first.
    pub fn open(path: impl AsRef<Path>, create: bool) -> Result<Self, FsError> {
        let path = path.as_ref();
        let shown = path.display().to_string();

        if create && !path.exists() {
            fs::create_dir_all(path).map_err(|e| FsError::from_io(e, shown.clone()))?;
            debug!(root = %shown, "Created namespace root");
        }

        let canonical = fs::canonicalize(path).map_err(|e| FsError::from_io(e, shown.clone()))?;
        let metadata = fs::metadata(&canonical).map_err(|e| FsError::from_io(e, shown.clone()))?;
        if !metadata.is_dir() {
            return Err(FsError::NotADirectory(shown));
        }

        Ok(Self { path: canonical })
    }

    /// Canonical absolute path of the root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a client-relative path. See [`resolve`].
    pub fn resolve(&self, relative: &str) -> Result<ResolvedPath, FsError> {
        resolve(&self.path, relative)
    }

    /// Resolve `name` inside the client-relative directory `dir`.
    ///
    /// `name` may itself contain separators; the combined path is still
    /// subject to containment. Its last segment must name an entry, so
    /// `a/..` or `.` never resolve back to `dir` or one of its ancestors.
    pub fn resolve_child(&self, dir: &str, name: &str) -> Result<ResolvedPath, FsError> {
        if name.trim().is_empty() {
            return Err(FsError::InvalidName("name must not be empty".to_string()));
        }
        let resolved = self.resolve(&format!("{}/{}", dir, name))?;
        if resolved.is_root() {
            return Err(FsError::Forbidden(format!("{} names the namespace root", name)));
        }

        let last = name
            .rsplit(['/', '\\'])
            .find(|segment| !segment.is_empty())
            .unwrap_or("");
        if last.is_empty() || last == "." || last == ".." {
            return Err(FsError::InvalidName(format!(
                "name does not end in an entry name: {}",
                name
            )));
        }
        Ok(resolved)
    }

    /// The root itself as a resolved path.
    pub fn resolved(&self) -> ResolvedPath {
        ResolvedPath {
            absolute: self.path.clone(),
            relative: String::new(),
        }
    }
}

/// An absolute path proven to be the root or one of its descendants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    absolute: PathBuf,
    relative: String,
}

impl ResolvedPath {
    /// Absolute storage path.
    pub fn as_path(&self) -> &Path {
        &self.absolute
    }

    /// Normalized client-relative form, `""` for the root.
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Whether this is the root itself.
    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }

    /// Final path segment, `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.relative.rsplit('/').next().filter(|s| !s.is_empty())
    }

    /// Client-relative path of the parent directory, `None` for the root.
    pub fn parent_relative(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        Some(self.relative.rsplit_once('/').map(|(parent, _)| parent).unwrap_or(""))
    }

    /// Whether `self` is `ancestor` or lies beneath it.
    pub fn is_within(&self, ancestor: &ResolvedPath) -> bool {
        self.absolute.starts_with(&ancestor.absolute)
    }

    /// Append `suffix` to the final segment. Appending never changes the
    /// parent, so the result stays contained.
    pub fn with_name_suffix(&self, suffix: &str) -> Result<ResolvedPath, FsError> {
        let name = self
            .file_name()
            .ok_or_else(|| FsError::InvalidName("the root has no file name".to_string()))?;
        let renamed = format!("{}{}", name, suffix);
        validate_name(&renamed)?;

        let mut absolute = self.absolute.clone();
        absolute.set_file_name(&renamed);
        let relative = match self.parent_relative() {
            Some("") | None => renamed,
            Some(parent) => format!("{}/{}", parent, renamed),
        };

        Ok(ResolvedPath { absolute, relative })
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.absolute
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.relative)
    }
}

/// Resolve `relative` against `root`, rejecting anything that normalizes
/// outside it. Escapes are refused, never clamped.
pub fn resolve(root: &Path, relative: &str) -> Result<ResolvedPath, FsError> {
    if relative.contains('\0') {
        warn!(path = %relative.escape_debug(), "Rejected path containing NUL");
        return Err(FsError::Forbidden(relative.escape_debug().to_string()));
    }

    let unified = relative.replace('\\', "/");
    let candidate = unified
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment));

    let normalized = guard::normalize(&candidate);
    if !guard::contains(root, &normalized) {
        warn!(path = %relative, "Rejected path outside namespace root");
        return Err(FsError::Forbidden(relative.to_string()));
    }

    let relative_path = normalized
        .strip_prefix(root)
        .map_err(|_| FsError::Forbidden(relative.to_string()))?;
    let relative = relative_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");

    Ok(ResolvedPath {
        absolute: normalized,
        relative,
    })
}

/// Check that `name` is exactly one path segment.
pub fn validate_name(name: &str) -> Result<&str, FsError> {
    if name.is_empty() {
        return Err(FsError::InvalidName("name must not be empty".to_string()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(FsError::InvalidName(format!(
            "name contains a path separator: {}",
            name
        )));
    }
    if name == "." || name == ".." || name.contains('\0') {
        return Err(FsError::InvalidName(format!("invalid name: {}", name.escape_debug())));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_root() -> (TempDir, Root) {
        let temp_dir = TempDir::new().unwrap();
        let root = Root::open(temp_dir.path(), false).unwrap();
        (temp_dir, root)
    }

    #[test]
    fn test_empty_path_is_root() {
        let (_temp, root) = open_root();
        let resolved = root.resolve("").unwrap();
        assert!(resolved.is_root());
        assert_eq!(resolved.as_path(), root.path());
        assert_eq!(resolved.to_string(), "/");
    }

    #[test]
    fn test_nested_path() {
        let (_temp, root) = open_root();
        let resolved = root.resolve("docs/2024/report.txt").unwrap();
        assert_eq!(resolved.relative(), "docs/2024/report.txt");
        assert_eq!(resolved.as_path(), root.path().join("docs/2024/report.txt"));
        assert_eq!(resolved.file_name(), Some("report.txt"));
        assert_eq!(resolved.parent_relative(), Some("docs/2024"));
    }

    #[test]
    fn test_redundant_separators_and_dots() {
        let (_temp, root) = open_root();
        let resolved = root.resolve("//docs/./a/../b//").unwrap();
        assert_eq!(resolved.relative(), "docs/b");
    }

    #[test]
    fn test_leading_slash_stays_under_root() {
        let (_temp, root) = open_root();
        let resolved = root.resolve("/etc/passwd").unwrap();
        assert_eq!(resolved.as_path(), root.path().join("etc/passwd"));
    }

    #[test]
    fn test_backslash_is_separator() {
        let (_temp, root) = open_root();
        let resolved = root.resolve("docs\\notes.txt").unwrap();
        assert_eq!(resolved.relative(), "docs/notes.txt");

        let result = root.resolve("docs\\..\\..\\etc");
        assert!(matches!(result, Err(FsError::Forbidden(_))));
    }

    #[test]
    fn test_traversal_is_forbidden() {
        let (_temp, root) = open_root();
        for path in [
            "..",
            "../",
            "../etc/passwd",
            "a/../..",
            "a/b/../../../x",
            "./../sibling",
            "/..",
            "a/./../../",
        ] {
            let result = root.resolve(path);
            assert!(
                matches!(result, Err(FsError::Forbidden(_))),
                "expected {:?} to be forbidden, got {:?}",
                path,
                result
            );
        }
    }

    #[test]
    fn test_dotdot_inside_root_is_allowed() {
        let (_temp, root) = open_root();
        assert!(root.resolve("a/..").unwrap().is_root());
        assert_eq!(root.resolve("a/b/../c").unwrap().relative(), "a/c");
    }

    #[test]
    fn test_nul_is_forbidden() {
        let (_temp, root) = open_root();
        assert!(matches!(root.resolve("a\0b"), Err(FsError::Forbidden(_))));
    }

    #[test]
    fn test_resolve_child() {
        let (_temp, root) = open_root();
        let resolved = root.resolve_child("docs", "new").unwrap();
        assert_eq!(resolved.relative(), "docs/new");

        let resolved = root.resolve_child("", "top").unwrap();
        assert_eq!(resolved.relative(), "top");

        assert!(matches!(root.resolve_child("docs", ""), Err(FsError::InvalidName(_))));
        assert!(matches!(
            root.resolve_child("", "../../escape"),
            Err(FsError::Forbidden(_))
        ));
    }

    #[test]
    fn test_resolve_child_must_end_in_a_name() {
        let (_temp, root) = open_root();
        assert!(matches!(root.resolve_child("docs", ".."), Err(FsError::Forbidden(_))));
        for name in ["a/..", ".", "a/.", "x/y/../..", "/"] {
            assert!(
                matches!(root.resolve_child("docs", name), Err(FsError::InvalidName(_))),
                "{} should be rejected",
                name
            );
        }

        let resolved = root.resolve_child("docs", "sub/new").unwrap();
        assert_eq!(resolved.relative(), "docs/sub/new");
        let resolved = root.resolve_child("docs", "new/").unwrap();
        assert_eq!(resolved.relative(), "docs/new");
    }

    #[test]
    fn test_with_name_suffix() {
        let (_temp, root) = open_root();
        let resolved = root.resolve("docs/notes").unwrap();
        let suffixed = resolved.with_name_suffix(".txt").unwrap();
        assert_eq!(suffixed.relative(), "docs/notes.txt");
        assert_eq!(suffixed.as_path(), root.path().join("docs/notes.txt"));

        let top = root.resolve("notes").unwrap().with_name_suffix(".txt").unwrap();
        assert_eq!(top.relative(), "notes.txt");

        assert!(root.resolved().with_name_suffix(".txt").is_err());
    }

    #[test]
    fn test_is_within() {
        let (_temp, root) = open_root();
        let dir = root.resolve("a").unwrap();
        assert!(root.resolve("a/b").unwrap().is_within(&dir));
        assert!(dir.is_within(&dir));
        assert!(!root.resolve("ab").unwrap().is_within(&dir));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("report.txt").is_ok());
        assert!(validate_name("..hidden").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(".").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
    }

    #[test]
    fn test_open_creates_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("uploads");

        assert!(matches!(Root::open(&path, false), Err(FsError::NotFound(_))));
        let root = Root::open(&path, true).unwrap();
        assert!(root.path().is_dir());
    }

    #[test]
    fn test_open_rejects_file_root() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file");
        fs::write(&path, "x").unwrap();
        assert!(matches!(Root::open(&path, false), Err(FsError::NotADirectory(_))));
    }
}
