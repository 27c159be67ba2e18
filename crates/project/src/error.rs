use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::events::SubscriptionId;

/// Boxed cause used where both I/O and buffer codec failures can occur.
pub type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

/// Errors surfaced by workspace operations.
/// 工作區操作（開啟、儲存、改名、刪除）可能回傳的錯誤。
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("invalid path '{raw}': {reason}")]
    InvalidPath { raw: String, reason: &'static str },
    #[error("{path} is not a directory")]
    NotADirectory { path: PathBuf },
    #[error("cannot list directory {path}: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("file {path} not found")]
    FileNotFound { path: PathBuf },
    #[error("cannot read file {path}: {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: BoxedCause,
    },
    #[error("cannot write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: BoxedCause,
    },
    #[error("cannot rename {from} to {to}: {source}")]
    RenameOperationFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot delete {path}: {source}")]
    DeleteOperationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot create {path}: {source}")]
    CreateOperationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not open in the workspace")]
    NotOpen { path: PathBuf },
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Failures raised while delivering lifecycle events.
/// 生命週期事件派送失敗。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("subscriber {0} is already handling an event")]
    SubscriberBusy(SubscriptionId),
    #[error("subscriber rejected {event}: {reason}")]
    HandlerFailed { event: String, reason: String },
}
