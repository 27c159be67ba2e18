//! Workspace session model for NeoEditor: open folders, open file tabs,
//! lifecycle propagation and session persistence.
//! NeoEditor 工作區模型：已開啟的資料夾與檔案分頁、生命週期同步與工作階段保存。

mod serde_path;
mod tabs;

pub mod error;
pub mod events;
pub mod files;
pub mod folders;
pub mod fs;
pub mod path;
pub mod session;
pub mod tree;
pub mod workbench;

pub use error::{BoxedCause, LifecycleError, WorkspaceError};
pub use events::{LifecycleEvent, LifecycleEventBus, LifecycleSubscriber, SubscriptionId};
pub use files::{FileEntry, FileId, OpenFileRegistry};
pub use folders::{FolderEntry, FolderId, FolderTreeRegistry};
pub use fs::{DirEntry, FileSystemProvider, LocalFileSystem};
pub use path::{normalize, NormalizedPath};
pub use session::{
    layout_keys, RestoreIssue, RestoreReport, SessionDocument, SessionError, SessionSerializer,
    SessionSnapshot, SessionStore, UiLayout, SESSION_FORMAT_VERSION,
};
pub use tree::{DirectoryTree, Listing, NodeKind, TreeNode};
pub use workbench::{StartupState, Workbench};
