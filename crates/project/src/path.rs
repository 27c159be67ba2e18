use std::ffi::OsStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

use crate::error::WorkspaceError;

/// Whether the host file system treats names case-insensitively.
const CASE_INSENSITIVE: bool = cfg!(any(windows, target_os = "macos"));

/// Canonical, purely lexical form of an absolute path.
/// 絕對路徑的正規化形式，作為所有項目的識別鍵。
///
/// `.` segments are dropped, `..` segments are resolved lexically and
/// repeated or trailing separators disappear. Symlinks are left alone. Two
/// values are equal when they name the same entry, which on Windows and macOS
/// ignores letter case while the original spelling is kept for display.
#[derive(Clone)]
pub struct NormalizedPath {
    path: PathBuf,
    key: PathBuf,
}

/// Normalizes a raw path. Pure: performs no I/O.
/// 正規化路徑（不做任何 I/O）。
pub fn normalize(raw: impl AsRef<Path>) -> Result<NormalizedPath, WorkspaceError> {
    NormalizedPath::new(raw)
}

impl NormalizedPath {
    pub fn new(raw: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let raw = raw.as_ref();
        let invalid = |reason| WorkspaceError::InvalidPath {
            raw: raw.to_string_lossy().into_owned(),
            reason,
        };

        if raw.as_os_str().is_empty() {
            return Err(invalid("path is empty"));
        }
        if raw.to_string_lossy().contains('\0') {
            return Err(invalid("path contains a NUL byte"));
        }
        if !raw.is_absolute() {
            return Err(invalid("path is not absolute"));
        }

        let mut parts: Vec<Component<'_>> = Vec::new();
        for component in raw.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if matches!(parts.last(), Some(Component::Normal(_))) {
                        parts.pop();
                    }
                }
                other => parts.push(other),
            }
        }
        let path: PathBuf = parts.iter().collect();
        Ok(Self::from_normalized(path))
    }

    fn from_normalized(path: PathBuf) -> Self {
        let key = if CASE_INSENSITIVE {
            PathBuf::from(path.to_string_lossy().to_lowercase())
        } else {
            path.clone()
        };
        Self { path, key }
    }

    /// Joins a name taken from a directory listing of `parent`.
    pub(crate) fn from_child(parent: &NormalizedPath, name: &OsStr) -> Self {
        Self::from_normalized(parent.path.join(name))
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.path.clone()
    }

    /// Tab label: the last component, or the whole path for a file-system root.
    pub fn display_label(&self) -> String {
        match self.path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.path.display().to_string(),
        }
    }

    pub fn parent(&self) -> Option<NormalizedPath> {
        self.path
            .parent()
            .map(|parent| Self::from_normalized(parent.to_path_buf()))
    }

    /// Appends a single entry name, rejecting separators and `.`/`..`.
    pub fn join_name(&self, name: &str) -> Result<NormalizedPath, WorkspaceError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {
                Ok(Self::from_normalized(self.path.join(name)))
            }
            _ => Err(WorkspaceError::InvalidPath {
                raw: name.to_string(),
                reason: "entry name must be a single path component",
            }),
        }
    }

    /// Component-wise prefix test; a path starts with itself.
    pub fn starts_with(&self, ancestor: &NormalizedPath) -> bool {
        self.key.starts_with(&ancestor.key)
    }

    /// Moves this path from beneath `from` to beneath `to`.
    /// Returns `None` when the path does not live under `from`.
    pub fn rebase(&self, from: &NormalizedPath, to: &NormalizedPath) -> Option<NormalizedPath> {
        if !self.starts_with(from) {
            return None;
        }
        let skip = from.path.components().count();
        let mut rebased = to.path.clone();
        rebased.extend(self.path.components().skip(skip));
        Some(Self::from_normalized(rebased))
    }
}

impl PartialEq for NormalizedPath {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for NormalizedPath {}

impl Hash for NormalizedPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Debug for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.path, f)
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn n(raw: &str) -> NormalizedPath {
        normalize(raw).unwrap()
    }

    #[test]
    fn lexical_forms_collapse_to_one_identity() {
        let plain = n("/a/b/x.txt");
        assert_eq!(plain, n("/a/b/x.txt/"));
        assert_eq!(plain, n("/a//b/./x.txt"));
        assert_eq!(plain, n("/a/c/../b/x.txt"));
        assert_eq!(plain.as_path(), Path::new("/a/b/x.txt"));
    }

    #[test]
    fn parent_segments_stop_at_root() {
        assert_eq!(n("/../../etc").as_path(), Path::new("/etc"));
    }

    #[test]
    fn rejects_empty_relative_and_nul() {
        for raw in ["", "relative/path", "/tmp/a\0b"] {
            let err = normalize(raw).unwrap_err();
            assert!(matches!(err, WorkspaceError::InvalidPath { .. }), "{raw:?}");
        }
    }

    #[test]
    fn unix_paths_are_case_sensitive() {
        assert_ne!(n("/tmp/Readme"), n("/tmp/readme"));
    }

    #[test]
    fn starts_with_is_component_wise() {
        assert!(n("/a/b/x.txt").starts_with(&n("/a/b")));
        assert!(n("/a/b").starts_with(&n("/a/b")));
        assert!(!n("/a/bc/x.txt").starts_with(&n("/a/b")));
    }

    #[test]
    fn rebase_moves_descendants() {
        let moved = n("/a/b/deep/x.txt").rebase(&n("/a/b"), &n("/a/c")).unwrap();
        assert_eq!(moved, n("/a/c/deep/x.txt"));
        assert!(n("/a/other.txt").rebase(&n("/a/b"), &n("/a/c")).is_none());
    }

    #[test]
    fn labels_and_names() {
        assert_eq!(n("/a/b/x.txt").display_label(), "x.txt");
        assert_eq!(n("/").display_label(), "/");
        assert_eq!(n("/a").join_name("new.txt").unwrap(), n("/a/new.txt"));
        assert!(n("/a").join_name("../escape").is_err());
        assert!(n("/a").join_name("b/c").is_err());
    }
}
