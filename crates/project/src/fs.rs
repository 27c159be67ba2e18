use std::ffi::OsString;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::Path;

use neoeditor_settings::write_atomic;

use crate::error::WorkspaceError;

/// One directory listing entry.
/// 目錄清單中的單一項目。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: OsString,
    pub is_directory: bool,
}

impl DirEntry {
    pub fn new(name: impl Into<OsString>, is_directory: bool) -> Self {
        Self {
            name: name.into(),
            is_directory,
        }
    }
}

/// File-system access used by the workspace model.
/// 工作區模型所依賴的檔案系統介面。
///
/// Every fallible call reports the matching [`WorkspaceError`] variant so the
/// registries can forward it untouched. Successful `delete_entry` and
/// `rename_entry` calls are followed by a lifecycle event published by the
/// caller, never by the provider.
pub trait FileSystemProvider: fmt::Debug {
    fn is_directory(&self, path: &Path) -> bool;

    /// Fails with [`WorkspaceError::DirectoryUnreadable`].
    fn list_entries(&self, path: &Path) -> Result<Vec<DirEntry>, WorkspaceError>;

    /// Fails with [`WorkspaceError::FileNotFound`] or [`WorkspaceError::FileUnreadable`].
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, WorkspaceError>;

    /// Fails with [`WorkspaceError::FileWrite`].
    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), WorkspaceError>;

    /// Removes a file or a whole directory tree.
    fn delete_entry(&self, path: &Path) -> Result<(), WorkspaceError>;

    /// Never overwrites an existing target.
    fn rename_entry(&self, from: &Path, to: &Path) -> Result<(), WorkspaceError>;

    fn create_file(&self, path: &Path) -> Result<(), WorkspaceError>;

    fn create_directory(&self, path: &Path) -> Result<(), WorkspaceError>;
}

/// [`FileSystemProvider`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl FileSystemProvider for LocalFileSystem {
    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_entries(&self, path: &Path) -> Result<Vec<DirEntry>, WorkspaceError> {
        let unreadable = |source| WorkspaceError::DirectoryUnreadable {
            path: path.to_path_buf(),
            source,
        };
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(unreadable)? {
            // 單一項目無法讀取時略過，不讓整個清單失敗。 / Skip entries that vanish or deny access mid-listing.
            let Ok(entry) = entry else { continue };
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let is_directory = if file_type.is_symlink() {
                entry.path().is_dir()
            } else {
                file_type.is_dir()
            };
            entries.push(DirEntry::new(entry.file_name(), is_directory));
        }
        Ok(entries)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, WorkspaceError> {
        if path.is_dir() {
            return Err(WorkspaceError::FileUnreadable {
                path: path.to_path_buf(),
                source: io::Error::new(ErrorKind::Other, "path is a directory").into(),
            });
        }
        fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => WorkspaceError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => WorkspaceError::FileUnreadable {
                path: path.to_path_buf(),
                source: err.into(),
            },
        })
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), WorkspaceError> {
        write_atomic(path, bytes).map_err(|err| WorkspaceError::FileWrite {
            path: path.to_path_buf(),
            source: err.into(),
        })
    }

    fn delete_entry(&self, path: &Path) -> Result<(), WorkspaceError> {
        let result = match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
            Ok(_) => fs::remove_file(path),
            Err(err) => Err(err),
        };
        result.map_err(|source| WorkspaceError::DeleteOperationFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    fn rename_entry(&self, from: &Path, to: &Path) -> Result<(), WorkspaceError> {
        let failed = |source| WorkspaceError::RenameOperationFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        };
        if fs::symlink_metadata(to).is_ok() {
            return Err(failed(io::Error::new(
                ErrorKind::AlreadyExists,
                "target already exists",
            )));
        }
        fs::rename(from, to).map_err(failed)
    }

    fn create_file(&self, path: &Path) -> Result<(), WorkspaceError> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map(|_| ())
            .map_err(|source| WorkspaceError::CreateOperationFailed {
                path: path.to_path_buf(),
                source,
            })
    }

    fn create_directory(&self, path: &Path) -> Result<(), WorkspaceError> {
        fs::create_dir(path).map_err(|source| WorkspaceError::CreateOperationFailed {
            path: path.to_path_buf(),
            source,
        })
    }
}
