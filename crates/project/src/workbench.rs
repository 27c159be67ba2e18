use std::cell::{Ref, RefCell, RefMut};
use std::path::Path;
use std::rc::Rc;

use log::{debug, info, warn};
use neoeditor_core::{DocumentFactory, SurfaceFactory};
use neoeditor_settings::KeyValueStore;

use crate::error::WorkspaceError;
use crate::events::{LifecycleEvent, LifecycleEventBus, LifecycleSubscriber, SubscriptionId};
use crate::files::{FileId, OpenFileRegistry};
use crate::folders::{FolderId, FolderTreeRegistry};
use crate::fs::{FileSystemProvider, LocalFileSystem};
use crate::path::{normalize, NormalizedPath};
use crate::session::{
    RestoreReport, SessionDocument, SessionError, SessionSerializer, SessionSnapshot,
    SessionStore, UiLayout,
};

/// Layout and restore outcome handed back by [`Workbench::startup`].
#[derive(Debug, Clone, Default)]
pub struct StartupState {
    pub layout: UiLayout,
    pub report: RestoreReport,
}

/// Application controller owning the session model.
/// 應用程式控制器：持有資料夾與檔案登錄表、事件匯流排與外部協作者。
///
/// Every user action enters here. Rename and delete go through the file
/// system provider first and, only once it succeeded, publish the matching
/// lifecycle event so both registries follow the change before the call
/// returns. The folder registry is subscribed before the file registry.
pub struct Workbench {
    fs: Rc<dyn FileSystemProvider>,
    folders: Rc<RefCell<FolderTreeRegistry>>,
    files: Rc<RefCell<OpenFileRegistry>>,
    bus: LifecycleEventBus,
}

impl Workbench {
    pub fn new(fs: Rc<dyn FileSystemProvider>, factory: Rc<dyn SurfaceFactory>) -> Self {
        let folders = Rc::new(RefCell::new(FolderTreeRegistry::new(Rc::clone(&fs))));
        let files = Rc::new(RefCell::new(OpenFileRegistry::new(Rc::clone(&fs), factory)));
        let mut bus = LifecycleEventBus::new();
        bus.subscribe(&folders);
        bus.subscribe(&files);
        Self {
            fs,
            folders,
            files,
            bus,
        }
    }

    /// Local disk with [`neoeditor_core::Document`] surfaces.
    pub fn local() -> Self {
        Self::new(Rc::new(LocalFileSystem), Rc::new(DocumentFactory))
    }

    pub fn folders(&self) -> Ref<'_, FolderTreeRegistry> {
        self.folders.borrow()
    }

    pub fn files(&self) -> Ref<'_, OpenFileRegistry> {
        self.files.borrow()
    }

    /// Mutable access for editing surfaces. Drop the guard before calling
    /// another workbench action.
    pub fn files_mut(&self) -> RefMut<'_, OpenFileRegistry> {
        self.files.borrow_mut()
    }

    /// Attaches an extra subscriber after the two registries.
    pub fn subscribe<S>(&mut self, subscriber: &Rc<RefCell<S>>) -> SubscriptionId
    where
        S: LifecycleSubscriber + 'static,
    {
        self.bus.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn open_folder(&mut self, path: impl AsRef<Path>) -> Result<FolderId, WorkspaceError> {
        self.folders.borrow_mut().open_folder(path).map(|entry| entry.id())
    }

    pub fn close_folder(&mut self, path: impl AsRef<Path>) -> Result<bool, WorkspaceError> {
        self.folders.borrow_mut().close_folder(path)
    }

    pub fn select_folder(&mut self, path: impl AsRef<Path>) -> Result<bool, WorkspaceError> {
        self.folders.borrow_mut().select_folder(path)
    }

    pub fn expand_folder(
        &mut self,
        root: impl AsRef<Path>,
        dir: impl AsRef<Path>,
    ) -> Result<bool, WorkspaceError> {
        self.folders.borrow_mut().expand(root, dir)
    }

    pub fn open_file(&mut self, path: impl AsRef<Path>) -> Result<FileId, WorkspaceError> {
        self.files.borrow_mut().open_file(path).map(|entry| entry.id())
    }

    pub fn close_file(&mut self, path: impl AsRef<Path>) -> Result<bool, WorkspaceError> {
        self.files.borrow_mut().close_file(path)
    }

    pub fn select_file(&mut self, path: impl AsRef<Path>) -> Result<bool, WorkspaceError> {
        self.files.borrow_mut().select_file(path)
    }

    pub fn save_current_file(&mut self) -> Result<bool, WorkspaceError> {
        self.files.borrow_mut().save_current_file()
    }

    pub fn save_file(&mut self, path: impl AsRef<Path>) -> Result<(), WorkspaceError> {
        self.files.borrow_mut().save_file(path)
    }

    /// Renames or moves a file or directory, then updates every open tab.
    pub fn rename_entry(
        &mut self,
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
    ) -> Result<(), WorkspaceError> {
        let from = normalize(from)?;
        let to = normalize(to)?;
        let is_directory = self.fs.is_directory(from.as_path());
        self.fs.rename_entry(from.as_path(), to.as_path())?;
        let event = if is_directory {
            LifecycleEvent::FolderRenamed { from, to }
        } else {
            LifecycleEvent::FileRenamed { from, to }
        };
        self.publish(event)
    }

    /// Deletes a file or a directory tree. Tabs under it close unsaved.
    pub fn delete_entry(&mut self, path: impl AsRef<Path>) -> Result<(), WorkspaceError> {
        let path = normalize(path)?;
        let is_directory = self.fs.is_directory(path.as_path());
        self.fs.delete_entry(path.as_path())?;
        let event = if is_directory {
            LifecycleEvent::FolderDeleted { path }
        } else {
            LifecycleEvent::FileDeleted { path }
        };
        self.publish(event)
    }

    /// Creates an empty file named `name` in `dir`. The file is not opened.
    pub fn create_file(
        &mut self,
        dir: impl AsRef<Path>,
        name: &str,
    ) -> Result<NormalizedPath, WorkspaceError> {
        let dir = normalize(dir)?;
        let path = dir.join_name(name)?;
        self.fs.create_file(path.as_path())?;
        self.relist(&dir);
        Ok(path)
    }

    pub fn create_folder(
        &mut self,
        dir: impl AsRef<Path>,
        name: &str,
    ) -> Result<NormalizedPath, WorkspaceError> {
        let dir = normalize(dir)?;
        let path = dir.join_name(name)?;
        self.fs.create_directory(path.as_path())?;
        self.relist(&dir);
        Ok(path)
    }

    fn relist(&mut self, dir: &NormalizedPath) {
        let mut folders = self.folders.borrow_mut();
        if folders.invalidate_directory(dir) > 0 {
            folders.refresh_all();
        }
    }

    fn publish(&mut self, event: LifecycleEvent) -> Result<(), WorkspaceError> {
        debug!("{event}");
        self.bus.publish(&event)?;
        self.folders.borrow_mut().refresh_all();
        Ok(())
    }

    pub fn capture(&self) -> SessionSnapshot {
        SessionSerializer::capture(&self.folders.borrow(), &self.files.borrow())
    }

    pub fn restore(&mut self, snapshot: &SessionSnapshot) -> RestoreReport {
        SessionSerializer::restore(
            snapshot,
            &mut self.folders.borrow_mut(),
            &mut self.files.borrow_mut(),
        )
    }

    /// Loads the stored session and replays it. A missing or unreadable
    /// session restores nothing.
    pub fn startup(&mut self, store: &dyn KeyValueStore, sessions: &SessionStore) -> StartupState {
        let document = sessions.load_or_empty(store);
        let report = self.restore(&document.snapshot);
        StartupState {
            layout: document.layout,
            report,
        }
    }

    /// Persists the session, then closes every file tab. When persisting
    /// fails nothing is closed and the error is returned.
    pub fn shutdown(
        &mut self,
        store: &mut dyn KeyValueStore,
        sessions: &SessionStore,
        layout: UiLayout,
    ) -> Result<usize, SessionError> {
        let document = SessionDocument {
            snapshot: self.capture(),
            layout,
        };
        if let Err(err) = sessions.save(store, &document) {
            warn!("session not saved, keeping tabs open: {err}");
            return Err(err);
        }
        let closed = self.files.borrow_mut().close_all();
        info!("shutdown closed {closed} file tab(s)");
        Ok(closed)
    }
}

impl std::fmt::Debug for Workbench {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbench")
            .field("fs", &self.fs)
            .field("folders", &self.folders)
            .field("files", &self.files)
            .field("bus", &self.bus)
            .finish()
    }
}
