use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{info, warn};
use neoeditor_settings::{KeyValueStore, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::WorkspaceError;
use crate::files::OpenFileRegistry;
use crate::folders::FolderTreeRegistry;

/// Current session format version.
pub const SESSION_FORMAT_VERSION: u32 = 1;

/// Layout keys written by the window shell.
pub mod layout_keys {
    pub const GEOMETRY: &str = "geometry";
    pub const WINDOW_STATE: &str = "window_state";
    pub const SPLITTER_STATE: &str = "splitter_state";
}

/// Point-in-time capture of the open folders and files.
/// 已開啟資料夾與檔案的快照。
///
/// Only paths and selections are recorded: dirty flags, scroll positions and
/// buffer contents are not part of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub format_version: u32,
    #[serde(default, with = "crate::serde_path::vec")]
    pub folders: Vec<PathBuf>,
    #[serde(
        default,
        with = "crate::serde_path::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_folder: Option<PathBuf>,
    #[serde(default, with = "crate::serde_path::vec")]
    pub files: Vec<PathBuf>,
    #[serde(
        default,
        with = "crate::serde_path::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_file: Option<PathBuf>,
}

impl SessionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.files.is_empty()
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            format_version: SESSION_FORMAT_VERSION,
            folders: Vec::new(),
            current_folder: None,
            files: Vec::new(),
            current_file: None,
        }
    }
}

/// Opaque window layout values persisted next to the snapshot.
/// 視窗配置（位置、狀態、分割器）等不透明資料，核心不做解讀。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UiLayout {
    #[serde(with = "base64_values")]
    values: BTreeMap<String, Vec<u8>>,
}

impl UiLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.values.get(key).map(Vec::as_slice)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<u8>> {
        self.values.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

mod base64_values {
    use std::collections::BTreeMap;

    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        values: &BTreeMap<String, Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        values
            .iter()
            .map(|(key, bytes)| (key.as_str(), BASE64.encode(bytes)))
            .collect::<BTreeMap<_, _>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, Vec<u8>>, D::Error> {
        BTreeMap::<String, String>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, text)| {
                BASE64
                    .decode(text)
                    .map(|bytes| (key, bytes))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}

/// The blob written to the key-value store.
/// 寫入鍵值儲存的工作階段文件。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub snapshot: SessionSnapshot,
    #[serde(default)]
    pub layout: UiLayout,
}

/// Error type for session persistence.
/// 工作階段持久化時可能出現的錯誤。
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid session payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("session format {found} is newer than supported format {}", SESSION_FORMAT_VERSION)]
    UnsupportedVersion { found: u32 },
}

/// Reads and writes the session document under one key.
#[derive(Debug, Clone)]
pub struct SessionStore {
    key: String,
}

impl SessionStore {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Loads the session document. A missing key returns `Ok(None)`.
    pub fn load(&self, store: &dyn KeyValueStore) -> Result<Option<SessionDocument>, SessionError> {
        let Some(blob) = store.get(&self.key)? else {
            return Ok(None);
        };
        let document: SessionDocument = serde_json::from_slice(&blob)?;
        if document.snapshot.format_version > SESSION_FORMAT_VERSION {
            return Err(SessionError::UnsupportedVersion {
                found: document.snapshot.format_version,
            });
        }
        Ok(Some(document))
    }

    /// Loads the session, treating any failure as an empty session.
    pub fn load_or_empty(&self, store: &dyn KeyValueStore) -> SessionDocument {
        match self.load(store) {
            Ok(Some(document)) => document,
            Ok(None) => SessionDocument::default(),
            Err(err) => {
                warn!("discarding unreadable session '{}': {err}", self.key);
                SessionDocument::default()
            }
        }
    }

    pub fn save(
        &self,
        store: &mut dyn KeyValueStore,
        document: &SessionDocument,
    ) -> Result<(), SessionError> {
        let mut document = document.clone();
        document.snapshot.format_version = SESSION_FORMAT_VERSION;
        let json = serde_json::to_vec_pretty(&document)?;
        store.set(&self.key, json)?;
        info!(
            "saved session '{}' ({} folder(s), {} file(s))",
            self.key,
            document.snapshot.folders.len(),
            document.snapshot.files.len()
        );
        Ok(())
    }
}

/// An entry that could not be restored, or restored only partially.
/// 還原時略過（或部分還原）的項目。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreIssue {
    #[serde(with = "crate::serde_path")]
    pub path: PathBuf,
    pub message: String,
    /// The entry is open despite the issue.
    #[serde(default)]
    pub kept: bool,
}

impl RestoreIssue {
    fn new(path: &Path, err: &WorkspaceError, kept: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            message: err.to_string(),
            kept,
        }
    }
}

impl fmt::Display for RestoreIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = if self.kept { "kept" } else { "skipped" };
        write!(f, "{action} {}: {}", self.path.display(), self.message)
    }
}

/// Outcome of [`SessionSerializer::restore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub folders_restored: usize,
    pub files_restored: usize,
    #[serde(default)]
    pub issues: Vec<RestoreIssue>,
}

impl RestoreReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Captures the registries into a snapshot and replays a snapshot into them.
/// 擷取與還原工作階段。
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionSerializer;

impl SessionSerializer {
    pub fn capture(folders: &FolderTreeRegistry, files: &OpenFileRegistry) -> SessionSnapshot {
        SessionSnapshot {
            format_version: SESSION_FORMAT_VERSION,
            folders: folders
                .list_open_folders()
                .iter()
                .map(|entry| entry.root_path().to_path_buf())
                .collect(),
            current_folder: folders
                .current_folder()
                .map(|entry| entry.root_path().to_path_buf()),
            files: files
                .list_open_files()
                .iter()
                .map(|entry| entry.path().to_path_buf())
                .collect(),
            current_file: files.current_file().map(|entry| entry.path().to_path_buf()),
        }
    }

    /// Replays `snapshot`: folders first, then files. Entries that fail to
    /// open are skipped and listed in the report.
    pub fn restore(
        snapshot: &SessionSnapshot,
        folders: &mut FolderTreeRegistry,
        files: &mut OpenFileRegistry,
    ) -> RestoreReport {
        let mut report = RestoreReport::default();

        for path in &snapshot.folders {
            match folders.open_folder(path) {
                Ok(_) => report.folders_restored += 1,
                Err(err @ WorkspaceError::DirectoryUnreadable { .. }) => {
                    report.folders_restored += 1;
                    report.issues.push(RestoreIssue::new(path, &err, true));
                }
                Err(err) => report.issues.push(RestoreIssue::new(path, &err, false)),
            }
        }
        if let Some(current) = &snapshot.current_folder {
            let _ = folders.select_folder(current);
        }

        for path in &snapshot.files {
            match files.open_file(path) {
                Ok(_) => report.files_restored += 1,
                Err(err) => report.issues.push(RestoreIssue::new(path, &err, false)),
            }
        }
        if let Some(current) = &snapshot.current_file {
            let _ = files.select_file(current);
        }

        for issue in &report.issues {
            warn!("session restore: {issue}");
        }
        info!(
            "restored {} folder(s) and {} file(s)",
            report.folders_restored, report.files_restored
        );
        report
    }
}
