//! Text buffers and the editing-surface contract for NeoEditor.
//! NeoEditor 的文字緩衝與編輯元件介面。

pub mod document;
pub mod surface;

pub use document::{Document, DocumentError, Encoding, LegacyEncoding, LineEnding};
pub use surface::{DocumentFactory, SurfaceFactory, TextSurface};
