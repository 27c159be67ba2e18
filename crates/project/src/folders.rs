use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};

use crate::error::{LifecycleError, WorkspaceError};
use crate::events::{LifecycleEvent, LifecycleSubscriber};
use crate::fs::FileSystemProvider;
use crate::path::{normalize, NormalizedPath};
use crate::tabs::{self, Tab};
use crate::tree::DirectoryTree;

static NEXT_FOLDER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one open folder; never reused within a process.
/// 已開啟資料夾的識別碼。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FolderId(u64);

impl FolderId {
    fn next() -> Self {
        Self(NEXT_FOLDER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "folder-{}", self.0)
    }
}

/// An open root folder shown as a tab in the tree view.
/// 樹狀檢視中的一個資料夾分頁。
#[derive(Debug)]
pub struct FolderEntry {
    id: FolderId,
    root_path: NormalizedPath,
    display_label: String,
    is_current: bool,
    tree: DirectoryTree,
}

impl FolderEntry {
    fn new(root_path: NormalizedPath) -> Self {
        Self {
            id: FolderId::next(),
            display_label: root_path.display_label(),
            tree: DirectoryTree::new(root_path.clone()),
            root_path,
            is_current: false,
        }
    }

    pub fn id(&self) -> FolderId {
        self.id
    }

    pub fn root_path(&self) -> &NormalizedPath {
        &self.root_path
    }

    pub fn display_label(&self) -> &str {
        &self.display_label
    }

    pub fn is_current(&self) -> bool {
        self.is_current
    }

    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    fn rebase(&mut self, from: &NormalizedPath, to: &NormalizedPath) {
        self.tree.rebase(from, to);
        let root = self.tree.root().path.clone();
        if root != self.root_path {
            self.display_label = root.display_label();
            self.root_path = root;
        }
    }
}

impl Tab for FolderEntry {
    fn is_current(&self) -> bool {
        self.is_current
    }

    fn set_current(&mut self, current: bool) {
        self.is_current = current;
    }
}

/// The set of open root folders and their directory trees.
/// 已開啟根資料夾及其目錄樹的登錄表。
///
/// Folder identity is the normalized root path: opening a folder twice
/// surfaces the first entry. Entries disappear only through
/// [`close_folder`](Self::close_folder); deleting the directory on disk leaves
/// the tab in place with a tree that fails to list.
pub struct FolderTreeRegistry {
    fs: Rc<dyn FileSystemProvider>,
    entries: Vec<FolderEntry>,
}

impl FolderTreeRegistry {
    pub fn new(fs: Rc<dyn FileSystemProvider>) -> Self {
        Self {
            fs,
            entries: Vec::new(),
        }
    }

    fn position(&self, path: &NormalizedPath) -> Option<usize> {
        self.entries.iter().position(|entry| entry.root_path == *path)
    }

    fn entry_index(&self, raw: &Path) -> Result<usize, WorkspaceError> {
        let path = normalize(raw)?;
        self.position(&path).ok_or_else(|| WorkspaceError::NotOpen {
            path: path.to_path_buf(),
        })
    }

    /// Opens `raw` as a root folder, or focuses it when already open.
    ///
    /// Only the root directory is listed. When that listing fails the entry
    /// stays registered and current and `DirectoryUnreadable` is returned.
    pub fn open_folder(&mut self, raw: impl AsRef<Path>) -> Result<&FolderEntry, WorkspaceError> {
        let path = normalize(raw)?;
        if let Some(index) = self.position(&path) {
            debug!("folder {path} already open, focusing it");
            tabs::select(&mut self.entries, index);
            return Ok(&self.entries[index]);
        }
        if !self.fs.is_directory(path.as_path()) {
            return Err(WorkspaceError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        let mut entry = FolderEntry::new(path);
        let listing = entry.tree.load_root(self.fs.as_ref());
        debug!("opened folder {} as {}", entry.root_path, entry.id);
        self.entries.push(entry);
        let index = self.entries.len() - 1;
        tabs::select(&mut self.entries, index);
        listing.map(|_| &self.entries[index])
    }

    /// Closes the folder tab. Open files under it stay open.
    pub fn close_folder(&mut self, raw: impl AsRef<Path>) -> Result<bool, WorkspaceError> {
        let path = normalize(raw)?;
        match self.position(&path) {
            Some(index) => {
                let removed = tabs::remove(&mut self.entries, index);
                debug!("closed folder {}", removed.root_path);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn select_folder(&mut self, raw: impl AsRef<Path>) -> Result<bool, WorkspaceError> {
        let path = normalize(raw)?;
        match self.position(&path) {
            Some(index) => {
                tabs::select(&mut self.entries, index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn current_folder(&self) -> Option<&FolderEntry> {
        tabs::current(&self.entries)
    }

    /// Open folders in the order they were opened.
    pub fn list_open_folders(&self) -> Vec<&FolderEntry> {
        self.entries.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, raw: impl AsRef<Path>) -> Option<&FolderEntry> {
        let path = normalize(raw).ok()?;
        self.position(&path).map(|index| &self.entries[index])
    }

    /// Expands `dir` inside the tree of the open folder `root`.
    pub fn expand(
        &mut self,
        root: impl AsRef<Path>,
        dir: impl AsRef<Path>,
    ) -> Result<bool, WorkspaceError> {
        let index = self.entry_index(root.as_ref())?;
        let dir = normalize(dir)?;
        self.entries[index].tree.expand(&dir, self.fs.as_ref())
    }

    pub fn collapse(
        &mut self,
        root: impl AsRef<Path>,
        dir: impl AsRef<Path>,
    ) -> Result<bool, WorkspaceError> {
        let index = self.entry_index(root.as_ref())?;
        let dir = normalize(dir)?;
        Ok(self.entries[index].tree.collapse(&dir))
    }

    /// Lists the root of `root` again and reloads stale expanded directories.
    pub fn refresh(&mut self, root: impl AsRef<Path>) -> Result<Vec<WorkspaceError>, WorkspaceError> {
        let index = self.entry_index(root.as_ref())?;
        let entry = &mut self.entries[index];
        let root_path = entry.root_path.clone();
        entry.tree.invalidate(&root_path);
        Ok(entry.tree.refresh(self.fs.as_ref()))
    }

    /// Reloads every stale listing in every open tree. Failures are logged.
    pub fn refresh_all(&mut self) -> usize {
        let mut failed = 0;
        for entry in &mut self.entries {
            for err in entry.tree.refresh(self.fs.as_ref()) {
                warn!("refreshing {} failed: {err}", entry.root_path);
                failed += 1;
            }
        }
        failed
    }

    /// Marks `dir` stale in every tree that shows it.
    pub fn invalidate_directory(&mut self, dir: &NormalizedPath) -> usize {
        self.entries
            .iter_mut()
            .map(|entry| entry.tree.invalidate(dir))
            .filter(|hit| *hit)
            .count()
    }
}

impl fmt::Debug for FolderTreeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FolderTreeRegistry")
            .field("entries", &self.entries)
            .finish()
    }
}

impl LifecycleSubscriber for FolderTreeRegistry {
    fn on_lifecycle(&mut self, event: &LifecycleEvent) -> Result<(), LifecycleError> {
        if let LifecycleEvent::FolderRenamed { from, to } = event {
            // 目標位置已有同一根目錄時，保留改名後的那一個。 / Keep the moved root when another tab already shows the target.
            let moved: Vec<_> = self
                .entries
                .iter()
                .filter_map(|entry| entry.root_path.rebase(from, to))
                .collect();
            self.entries.retain(|entry| {
                let shadowed = !entry.root_path.starts_with(from) && moved.contains(&entry.root_path);
                if shadowed {
                    debug!("dropping folder {} replaced by a rename", entry.root_path);
                }
                !shadowed
            });
            for entry in &mut self.entries {
                entry.rebase(from, to);
            }
            if !self.entries.is_empty() && tabs::current(&self.entries).is_none() {
                let last = self.entries.len() - 1;
                tabs::select(&mut self.entries, last);
            }
        }

        // 被刪除或搬移的根目錄本身也需重新列出。 / Roots at or under a deleted or moved folder are relisted too.
        let moved_root = match event {
            LifecycleEvent::FolderDeleted { path } => Some(path),
            LifecycleEvent::FolderRenamed { to, .. } => Some(to),
            _ => None,
        };
        if let Some(prefix) = moved_root {
            for entry in &mut self.entries {
                if entry.root_path.starts_with(prefix) {
                    entry.tree.invalidate(&entry.root_path);
                }
            }
        }

        for dir in event.affected_directories() {
            self.invalidate_directory(&dir);
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fs::LocalFileSystem;
    use crate::tree::Listing;
    use std::fs;
    use tempfile::tempdir;

    fn registry() -> FolderTreeRegistry {
        FolderTreeRegistry::new(Rc::new(LocalFileSystem))
    }

    #[test]
    fn reopening_focuses_existing_entry() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        let mut folders = registry();

        let first = folders.open_folder(a.path()).unwrap().id();
        folders.open_folder(b.path()).unwrap();
        let again = folders.open_folder(a.path().join(".")).unwrap();

        assert_eq!(again.id(), first);
        assert!(again.is_current());
        assert_eq!(folders.len(), 2);
        assert_eq!(folders.current_folder().unwrap().id(), first);
    }

    #[test]
    fn close_then_reopen_creates_a_fresh_listing() {
        let dir = tempdir().unwrap();
        let mut folders = registry();
        let first = folders.open_folder(dir.path()).unwrap().id();
        assert!(folders.open_folder(dir.path()).unwrap().tree().root().children().is_empty());

        assert!(folders.close_folder(dir.path()).unwrap());
        assert!(folders.is_empty());
        fs::write(dir.path().join("late.txt"), "").unwrap();

        let reopened = folders.open_folder(dir.path()).unwrap();
        assert_ne!(reopened.id(), first);
        assert_eq!(reopened.tree().root().children()[0].name, "late.txt");
    }

    #[test]
    fn non_directory_is_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();
        let mut folders = registry();

        let err = folders.open_folder(&file).unwrap_err();
        assert!(matches!(err, WorkspaceError::NotADirectory { .. }));
        assert!(folders.is_empty());
        assert!(!folders.close_folder(&file).unwrap());
    }

    #[test]
    fn display_label_is_last_component() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("project");
        fs::create_dir(&sub).unwrap();
        let mut folders = registry();
        assert_eq!(folders.open_folder(&sub).unwrap().display_label(), "project");
    }

    #[test]
    fn folder_rename_rebases_open_roots() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old");
        fs::create_dir(&old).unwrap();
        let mut folders = registry();
        folders.open_folder(&old).unwrap();

        let new = dir.path().join("new");
        fs::rename(&old, &new).unwrap();
        folders
            .on_lifecycle(&LifecycleEvent::FolderRenamed {
                from: normalize(&old).unwrap(),
                to: normalize(&new).unwrap(),
            })
            .unwrap();

        let entry = folders.current_folder().unwrap();
        assert_eq!(entry.root_path().as_path(), new.as_path());
        assert_eq!(entry.display_label(), "new");
        assert!(folders.get(&old).is_none());
    }

    #[test]
    fn events_mark_parent_listing_stale() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        let mut folders = registry();
        folders.open_folder(dir.path()).unwrap();

        fs::remove_file(dir.path().join("a.txt")).unwrap();
        folders
            .on_lifecycle(&LifecycleEvent::FileDeleted {
                path: normalize(dir.path().join("a.txt")).unwrap(),
            })
            .unwrap();
        assert!(folders.current_folder().unwrap().tree().root().stale);

        assert_eq!(folders.refresh_all(), 0);
        let root = folders.current_folder().unwrap().tree().root();
        assert!(root.children().is_empty());
        assert!(!root.stale);
    }

    #[test]
    fn deleting_an_ancestor_marks_the_root_itself_stale() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("outer").join("proj");
        fs::create_dir_all(&root).unwrap();
        let mut folders = registry();
        folders.open_folder(&root).unwrap();

        fs::remove_dir_all(dir.path().join("outer")).unwrap();
        folders
            .on_lifecycle(&LifecycleEvent::FolderDeleted {
                path: normalize(dir.path().join("outer")).unwrap(),
            })
            .unwrap();
        assert!(folders.get(&root).unwrap().tree().root().stale);

        assert_eq!(folders.refresh_all(), 1);
        let node = folders.get(&root).unwrap().tree().root();
        assert!(matches!(node.listing, Listing::Unreadable(_)));
    }

    #[test]
    fn invalidation_reaches_every_tree_showing_the_directory() {
        let dir = tempdir().unwrap();
        let outer = dir.path().join("outer");
        let inner = outer.join("inner");
        fs::create_dir_all(&inner).unwrap();
        let mut folders = registry();
        folders.open_folder(&outer).unwrap();
        folders.open_folder(&inner).unwrap();
        assert!(folders.expand(&outer, &inner).unwrap());

        let key = normalize(&inner).unwrap();
        assert_eq!(folders.invalidate_directory(&key), 2);
        assert!(folders.get(&outer).unwrap().tree().find(&key).unwrap().stale);
        assert!(folders.get(&inner).unwrap().tree().root().stale);
    }
}
