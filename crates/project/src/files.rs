use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use neoeditor_core::{SurfaceFactory, TextSurface};

use crate::error::{LifecycleError, WorkspaceError};
use crate::events::{LifecycleEvent, LifecycleSubscriber};
use crate::fs::FileSystemProvider;
use crate::path::{normalize, NormalizedPath};
use crate::tabs::{self, Tab};

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one open file tab.
/// 已開啟檔案分頁的識別碼。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u64);

impl FileId {
    fn next() -> Self {
        Self(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file-{}", self.0)
    }
}

/// An open file tab owning its text surface.
/// 一個已開啟的檔案分頁，獨佔其文字編輯表面。
///
/// Dropping the entry disposes the surface.
#[derive(Debug)]
pub struct FileEntry {
    id: FileId,
    path: NormalizedPath,
    display_label: String,
    is_current: bool,
    surface: Box<dyn TextSurface>,
}

impl FileEntry {
    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }

    pub fn display_label(&self) -> &str {
        &self.display_label
    }

    pub fn is_current(&self) -> bool {
        self.is_current
    }

    /// Unsaved changes, as reported by the surface.
    pub fn is_dirty(&self) -> bool {
        self.surface.is_dirty()
    }

    pub fn surface(&self) -> &dyn TextSurface {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> &mut dyn TextSurface {
        self.surface.as_mut()
    }

    fn relocate(&mut self, path: NormalizedPath) {
        debug!("file tab {} moved from {} to {path}", self.id, self.path);
        self.surface.set_path(path.as_path());
        self.display_label = path.display_label();
        self.path = path;
    }

    fn save(&mut self, fs: &dyn FileSystemProvider) -> Result<(), WorkspaceError> {
        let bytes = self
            .surface
            .serialize()
            .map_err(|err| WorkspaceError::FileWrite {
                path: self.path.to_path_buf(),
                source: err.into(),
            })?;
        fs.write_file(self.path.as_path(), &bytes)?;
        self.surface.mark_saved();
        debug!("saved {} ({} bytes)", self.path, bytes.len());
        Ok(())
    }
}

impl Tab for FileEntry {
    fn is_current(&self) -> bool {
        self.is_current
    }

    fn set_current(&mut self, current: bool) {
        self.is_current = current;
    }
}

impl Drop for FileEntry {
    fn drop(&mut self) {
        self.surface.dispose();
    }
}

/// The set of open file tabs.
/// 已開啟檔案分頁的登錄表。
///
/// At most one entry exists per normalized path. An entry's surface is the
/// authority for its content once opened: reopening the same path focuses the
/// tab without reading the disk again.
pub struct OpenFileRegistry {
    fs: Rc<dyn FileSystemProvider>,
    factory: Rc<dyn SurfaceFactory>,
    entries: Vec<FileEntry>,
}

impl OpenFileRegistry {
    pub fn new(fs: Rc<dyn FileSystemProvider>, factory: Rc<dyn SurfaceFactory>) -> Self {
        Self {
            fs,
            factory,
            entries: Vec::new(),
        }
    }

    fn position(&self, path: &NormalizedPath) -> Option<usize> {
        self.entries.iter().position(|entry| entry.path == *path)
    }

    pub fn open_file(&mut self, raw: impl AsRef<Path>) -> Result<&FileEntry, WorkspaceError> {
        let path = normalize(raw)?;
        if let Some(index) = self.position(&path) {
            tabs::select(&mut self.entries, index);
            return Ok(&self.entries[index]);
        }

        let bytes = self.fs.read_file(path.as_path())?;
        let surface = self
            .factory
            .create(&bytes, path.as_path())
            .map_err(|err| WorkspaceError::FileUnreadable {
                path: path.to_path_buf(),
                source: err.into(),
            })?;
        let entry = FileEntry {
            id: FileId::next(),
            display_label: path.display_label(),
            path,
            is_current: false,
            surface,
        };
        debug!("opened {} as {}", entry.path, entry.id);
        self.entries.push(entry);
        let index = self.entries.len() - 1;
        tabs::select(&mut self.entries, index);
        Ok(&self.entries[index])
    }

    /// Saves the current tab. Returns `Ok(false)` when no tab is current.
    /// A failed write leaves the dirty flag untouched.
    pub fn save_current_file(&mut self) -> Result<bool, WorkspaceError> {
        match self.entries.iter_mut().find(|entry| entry.is_current) {
            Some(entry) => entry.save(self.fs.as_ref()).map(|_| true),
            None => Ok(false),
        }
    }

    pub fn save_file(&mut self, raw: impl AsRef<Path>) -> Result<(), WorkspaceError> {
        let path = normalize(raw)?;
        let index = self.position(&path).ok_or_else(|| WorkspaceError::NotOpen {
            path: path.to_path_buf(),
        })?;
        self.entries[index].save(self.fs.as_ref())
    }

    /// Closes the tab without saving and releases its surface.
    pub fn close_file(&mut self, raw: impl AsRef<Path>) -> Result<bool, WorkspaceError> {
        let path = normalize(raw)?;
        Ok(self.close_at_path(&path))
    }

    fn close_at_path(&mut self, path: &NormalizedPath) -> bool {
        match self.position(path) {
            Some(index) => {
                let removed = tabs::remove(&mut self.entries, index);
                debug!("closed file tab {} ({})", removed.id, removed.path);
                true
            }
            None => false,
        }
    }

    /// Closes every tab, in order. Returns how many were closed.
    pub fn close_all(&mut self) -> usize {
        let closed = self.entries.len();
        for entry in self.entries.drain(..) {
            debug!("closing file tab {} ({})", entry.id, entry.path);
        }
        closed
    }

    pub fn select_file(&mut self, raw: impl AsRef<Path>) -> Result<bool, WorkspaceError> {
        let path = normalize(raw)?;
        match self.position(&path) {
            Some(index) => {
                tabs::select(&mut self.entries, index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn current_file(&self) -> Option<&FileEntry> {
        tabs::current(&self.entries)
    }

    /// Open files in the order they were opened.
    pub fn list_open_files(&self) -> Vec<&FileEntry> {
        self.entries.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, raw: impl AsRef<Path>) -> Option<&FileEntry> {
        let path = normalize(raw).ok()?;
        let index = self.position(&path)?;
        Some(&self.entries[index])
    }

    pub fn get_mut(&mut self, raw: impl AsRef<Path>) -> Option<&mut FileEntry> {
        let path = normalize(raw).ok()?;
        let index = self.position(&path)?;
        Some(&mut self.entries[index])
    }

    fn close_under(&mut self, dir: &NormalizedPath) -> usize {
        let mut closed = 0;
        while let Some(index) = self.entries.iter().position(|entry| entry.path.starts_with(dir)) {
            tabs::remove(&mut self.entries, index);
            closed += 1;
        }
        closed
    }
}

impl fmt::Debug for OpenFileRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenFileRegistry")
            .field("entries", &self.entries)
            .finish()
    }
}

impl LifecycleSubscriber for OpenFileRegistry {
    fn on_lifecycle(&mut self, event: &LifecycleEvent) -> Result<(), LifecycleError> {
        match event {
            LifecycleEvent::FileDeleted { path } => {
                self.close_at_path(path);
            }
            LifecycleEvent::FolderDeleted { path } => {
                let closed = self.close_under(path);
                debug!("closed {closed} tab(s) under deleted folder {path}");
            }
            LifecycleEvent::FileRenamed { from, to } => {
                if self.position(from).is_none() {
                    return Ok(());
                }
                if from != to {
                    self.close_at_path(to);
                }
                // 關閉目標分頁後索引可能改變。 / Closing the target tab may shift indices.
                if let Some(index) = self.position(from) {
                    self.entries[index].relocate(to.clone());
                }
            }
            LifecycleEvent::FolderRenamed { from, to } => {
                let moved: Vec<NormalizedPath> = self
                    .entries
                    .iter()
                    .filter_map(|entry| entry.path.rebase(from, to))
                    .collect();
                let shadowed: Vec<NormalizedPath> = self
                    .entries
                    .iter()
                    .filter(|entry| !entry.path.starts_with(from) && moved.contains(&entry.path))
                    .map(|entry| entry.path.clone())
                    .collect();
                for path in &shadowed {
                    self.close_at_path(path);
                }
                for entry in &mut self.entries {
                    if let Some(target) = entry.path.rebase(from, to) {
                        entry.relocate(target);
                    }
                }
            }
        }
        Ok(())
    }
}
