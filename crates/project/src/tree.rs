use std::cmp::Ordering;

use crate::error::WorkspaceError;
use crate::fs::FileSystemProvider;
use crate::path::NormalizedPath;

/// The kind of tree node.
/// 樹節點的類型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

/// Lazily populated children of a directory node.
/// 目錄節點的延遲載入狀態。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Unloaded,
    Loaded(Vec<TreeNode>),
    /// Listing failed; the message is kept for display.
    Unreadable(String),
}

/// One entry inside an open folder's tree.
/// 已開啟資料夾中的單一節點。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub path: NormalizedPath,
    pub kind: NodeKind,
    pub listing: Listing,
    /// Set once the user expanded the directory; survives invalidation.
    pub expanded: bool,
    /// The listing no longer matches the disk after a lifecycle change.
    pub stale: bool,
}

impl TreeNode {
    fn directory(path: NormalizedPath) -> Self {
        Self {
            name: path.display_label(),
            path,
            kind: NodeKind::Directory,
            listing: Listing::Unloaded,
            expanded: false,
            stale: false,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Children when loaded, empty otherwise.
    pub fn children(&self) -> &[TreeNode] {
        match &self.listing {
            Listing::Loaded(children) => children,
            _ => &[],
        }
    }

    fn find(&self, path: &NormalizedPath) -> Option<&TreeNode> {
        if self.path == *path {
            return Some(self);
        }
        if !path.starts_with(&self.path) {
            return None;
        }
        self.children().iter().find_map(|child| child.find(path))
    }

    fn find_mut(&mut self, path: &NormalizedPath) -> Option<&mut TreeNode> {
        if self.path == *path {
            return Some(self);
        }
        if !path.starts_with(&self.path) {
            return None;
        }
        match &mut self.listing {
            Listing::Loaded(children) => children.iter_mut().find_map(|child| child.find_mut(path)),
            _ => None,
        }
    }

    fn needs_listing(&self) -> bool {
        self.stale || !matches!(self.listing, Listing::Loaded(_))
    }

    fn load(&mut self, fs: &dyn FileSystemProvider) -> Result<(), WorkspaceError> {
        self.stale = false;
        let previous = std::mem::replace(&mut self.listing, Listing::Unloaded);
        let mut carried = match previous {
            Listing::Loaded(children) => children,
            _ => Vec::new(),
        };

        match fs.list_entries(self.path.as_path()) {
            Ok(entries) => {
                let mut children = Vec::with_capacity(entries.len());
                for entry in entries {
                    let path = NormalizedPath::from_child(&self.path, &entry.name);
                    // 保留既有子節點的展開狀態。 / Keep the expansion state of children that survived.
                    if let Some(pos) = carried.iter().position(|old| old.path == path) {
                        let mut old = carried.swap_remove(pos);
                        if old.is_directory() == entry.is_directory {
                            old.name = entry.name.to_string_lossy().into_owned();
                            children.push(old);
                            continue;
                        }
                    }
                    children.push(TreeNode {
                        name: entry.name.to_string_lossy().into_owned(),
                        path,
                        kind: if entry.is_directory {
                            NodeKind::Directory
                        } else {
                            NodeKind::File
                        },
                        listing: Listing::Unloaded,
                        expanded: false,
                        stale: false,
                    });
                }
                children.sort_by(compare_nodes);
                self.listing = Listing::Loaded(children);
                Ok(())
            }
            Err(err) => {
                self.listing = Listing::Unreadable(err.to_string());
                Err(err)
            }
        }
    }

    /// Reloads every expanded directory whose listing is no longer loaded.
    fn refresh(&mut self, fs: &dyn FileSystemProvider, failures: &mut Vec<WorkspaceError>) {
        if !self.is_directory() || !self.expanded {
            return;
        }
        if self.needs_listing() {
            if let Err(err) = self.load(fs) {
                failures.push(err);
                return;
            }
        }
        if let Listing::Loaded(children) = &mut self.listing {
            for child in children {
                child.refresh(fs, failures);
            }
        }
    }

    fn rebase(&mut self, from: &NormalizedPath, to: &NormalizedPath) {
        if let Some(moved) = self.path.rebase(from, to) {
            self.path = moved;
        }
        if let Listing::Loaded(children) = &mut self.listing {
            for child in children {
                child.rebase(from, to);
            }
        }
    }
}

fn compare_nodes(a: &TreeNode, b: &TreeNode) -> Ordering {
    b.is_directory()
        .cmp(&a.is_directory())
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

/// Lazily loaded directory tree rooted at an open folder.
/// 以已開啟資料夾為根的延遲載入目錄樹。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTree {
    revision: u64,
    root: TreeNode,
}

impl DirectoryTree {
    pub fn new(root_path: NormalizedPath) -> Self {
        let mut root = TreeNode::directory(root_path);
        root.expanded = true;
        Self { revision: 0, root }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Bumped on every listing change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn find(&self, path: &NormalizedPath) -> Option<&TreeNode> {
        self.root.find(path)
    }

    pub fn contains(&self, path: &NormalizedPath) -> bool {
        self.find(path).is_some()
    }

    /// Lists the root directory.
    pub fn load_root(&mut self, fs: &dyn FileSystemProvider) -> Result<(), WorkspaceError> {
        self.revision = self.revision.wrapping_add(1);
        self.root.load(fs)
    }

    /// Expands a directory node, listing it if needed.
    /// Returns `Ok(false)` when the node is not part of this tree.
    pub fn expand(
        &mut self,
        dir: &NormalizedPath,
        fs: &dyn FileSystemProvider,
    ) -> Result<bool, WorkspaceError> {
        let Some(node) = self.root.find_mut(dir) else {
            return Ok(false);
        };
        if !node.is_directory() {
            return Err(WorkspaceError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }
        node.expanded = true;
        if !node.needs_listing() {
            return Ok(true);
        }
        self.revision = self.revision.wrapping_add(1);
        node.load(fs).map(|_| true)
    }

    /// Collapses a directory; its listing is kept.
    pub fn collapse(&mut self, dir: &NormalizedPath) -> bool {
        if *dir == self.root.path {
            return false;
        }
        match self.root.find_mut(dir) {
            Some(node) if node.is_directory() => {
                node.expanded = false;
                true
            }
            _ => false,
        }
    }

    /// Marks the cached listing of `dir` stale so the next refresh or expand
    /// lists it again. Children are kept until then.
    pub fn invalidate(&mut self, dir: &NormalizedPath) -> bool {
        match self.root.find_mut(dir) {
            Some(node) if node.is_directory() && node.listing != Listing::Unloaded => {
                node.stale = true;
                self.revision = self.revision.wrapping_add(1);
                true
            }
            _ => false,
        }
    }

    /// Reloads invalidated directories that are expanded. Failures are
    /// recorded on the affected nodes and returned.
    pub fn refresh(&mut self, fs: &dyn FileSystemProvider) -> Vec<WorkspaceError> {
        let mut failures = Vec::new();
        self.root.refresh(fs, &mut failures);
        self.revision = self.revision.wrapping_add(1);
        failures
    }

    /// Rewrites node paths after the tree (or a part of it) moved.
    pub fn rebase(&mut self, from: &NormalizedPath, to: &NormalizedPath) {
        self.root.rebase(from, to);
        self.root.name = self.root.path.display_label();
        self.revision = self.revision.wrapping_add(1);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fs::LocalFileSystem;
    use crate::path::normalize;
    use std::fs;
    use tempfile::tempdir;

    fn names(node: &TreeNode) -> Vec<&str> {
        node.children().iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn root_listing_sorts_directories_first() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::write(dir.path().join("A.txt"), "").unwrap();
        fs::create_dir(dir.path().join("zeta")).unwrap();

        let mut tree = DirectoryTree::new(normalize(dir.path()).unwrap());
        tree.load_root(&LocalFileSystem).unwrap();

        assert_eq!(names(tree.root()), vec!["zeta", "A.txt", "b.txt"]);
        assert_eq!(tree.root().children()[1].kind, NodeKind::File);
    }

    #[test]
    fn expand_lists_lazily_and_invalidation_keeps_expansion() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("src");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("main.rs"), "").unwrap();

        let fs_provider = LocalFileSystem;
        let mut tree = DirectoryTree::new(normalize(dir.path()).unwrap());
        tree.load_root(&fs_provider).unwrap();
        let sub_path = normalize(&sub).unwrap();
        assert_eq!(tree.find(&sub_path).unwrap().listing, Listing::Unloaded);

        assert!(tree.expand(&sub_path, &fs_provider).unwrap());
        assert_eq!(names(tree.find(&sub_path).unwrap()), vec!["main.rs"]);

        fs::write(sub.join("lib.rs"), "").unwrap();
        assert!(tree.invalidate(&sub_path));
        assert!(tree.refresh(&fs_provider).is_empty());
        assert_eq!(names(tree.find(&sub_path).unwrap()), vec!["lib.rs", "main.rs"]);

        let root = normalize(dir.path()).unwrap();
        assert!(tree.invalidate(&root));
        tree.refresh(&fs_provider);
        let node = tree.find(&sub_path).unwrap();
        assert!(node.expanded, "expansion survives a parent reload");
        assert_eq!(names(node), vec!["lib.rs", "main.rs"]);
    }

    #[test]
    fn unreadable_listing_is_marked() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("gone");
        let mut tree = DirectoryTree::new(normalize(&gone).unwrap());
        let err = tree.load_root(&LocalFileSystem).unwrap_err();
        assert!(matches!(err, WorkspaceError::DirectoryUnreadable { .. }));
        assert!(matches!(tree.root().listing, Listing::Unreadable(_)));
    }

    #[test]
    fn rebase_rewrites_descendant_paths() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("old")).unwrap();
        fs::write(dir.path().join("old").join("f.txt"), "").unwrap();

        let old = normalize(dir.path().join("old")).unwrap();
        let new = normalize(dir.path().join("new")).unwrap();
        let mut tree = DirectoryTree::new(old.clone());
        tree.load_root(&LocalFileSystem).unwrap();
        tree.rebase(&old, &new);

        assert_eq!(tree.root().path, new);
        assert_eq!(tree.root().name, "new");
        assert_eq!(
            tree.root().children()[0].path,
            new.join_name("f.txt").unwrap()
        );
    }
}
