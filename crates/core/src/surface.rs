use std::fmt;
use std::path::Path;

use crate::document::{Document, DocumentError};

/// 編輯元件的抽象介面：每個開啟的檔案分頁擁有一個實例。 / Editing surface owned by exactly one open file tab.
///
/// Undo/redo, rendering and key handling live behind this trait; the session
/// model only moves bytes in and out and asks about the dirty flag.
pub trait TextSurface: fmt::Debug {
    /// 將目前內容序列化為位元組。 / Serialises the current buffer back to bytes.
    fn serialize(&self) -> Result<Vec<u8>, DocumentError>;

    /// 是否有未儲存的修改。 / Whether the buffer has unsaved edits.
    fn is_dirty(&self) -> bool;

    /// 寫入成功後由呼叫端通知。 / Called once the serialised bytes were written successfully.
    fn mark_saved(&mut self);

    /// 檔案被改名或移動時更新標籤；內容不重新載入。 / Relabels the surface after a rename or move; content is not reloaded.
    fn set_path(&mut self, path: &Path);

    /// 分頁關閉前釋放資源。 / Releases resources before the owning tab goes away.
    fn dispose(&mut self) {}
}

/// 建立編輯元件的工廠。 / Creates surfaces for newly opened files.
pub trait SurfaceFactory {
    fn create(&self, initial: &[u8], path: &Path) -> Result<Box<dyn TextSurface>, DocumentError>;
}

impl TextSurface for Document {
    fn serialize(&self) -> Result<Vec<u8>, DocumentError> {
        self.to_bytes()
    }

    fn is_dirty(&self) -> bool {
        Document::is_dirty(self)
    }

    fn mark_saved(&mut self) {
        Document::mark_saved(self);
    }

    fn set_path(&mut self, path: &Path) {
        Document::set_path(self, path);
    }
}

/// 以 [`Document`] 作為編輯元件的預設工廠。 / Default factory backing every tab with a [`Document`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentFactory;

impl SurfaceFactory for DocumentFactory {
    fn create(&self, initial: &[u8], path: &Path) -> Result<Box<dyn TextSurface>, DocumentError> {
        Ok(Box::new(Document::from_bytes(initial, path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_factory_round_trips_bytes() {
        let surface = DocumentFactory
            .create(b"one\r\ntwo", Path::new("/tmp/one.txt"))
            .unwrap();
        assert!(!surface.is_dirty());
        assert_eq!(surface.serialize().unwrap(), b"one\r\ntwo");
    }

    #[test]
    fn document_factory_rejects_undecodable_bytes() {
        let err = DocumentFactory
            .create(b"\xFF\xFEa", Path::new("/tmp/bad.txt"))
            .unwrap_err();
        assert_eq!(err, DocumentError::InvalidEncoding);
    }
}
