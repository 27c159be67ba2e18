//! Persistent storage and configuration for NeoEditor.
//! NeoEditor 的持久化儲存與偏好設定。

pub mod preferences;
pub mod store;
mod util;

pub use preferences::{
    LoggingPreferences, Preferences, PreferencesError, PreferencesStore, SessionPreferences,
    PREFERENCES_FILE_NAME,
};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};
pub use util::write_atomic;
