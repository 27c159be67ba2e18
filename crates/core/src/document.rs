use std::path::{Path, PathBuf};

use chardetng::EncodingDetector;
use encoding_rs::{Encoding as RsEncoding, BIG5, GBK, SHIFT_JIS, WINDOWS_1252};
use thiserror::Error;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const UTF16_LE_BOM: &[u8] = b"\xFF\xFE";
const UTF16_BE_BOM: &[u8] = b"\xFE\xFF";

/// 文件目前使用的行尾樣式。 / Line ending style detected in (and restored to) a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }

    /// 依第一個換行記號推斷行尾。 / Infers the style from the first newline sequence.
    fn detect(text: &str) -> Self {
        match text.find(['\r', '\n']) {
            Some(idx) if text.as_bytes()[idx] == b'\n' => LineEnding::Lf,
            Some(idx) if text.as_bytes().get(idx + 1) == Some(&b'\n') => LineEnding::CrLf,
            Some(_) => LineEnding::Cr,
            None => LineEnding::Lf,
        }
    }
}

/// 傳統多位元編碼。 / Legacy encodings recognised by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyEncoding {
    Windows1252,
    ShiftJis,
    Gbk,
    Big5,
}

impl LegacyEncoding {
    pub fn name(self) -> &'static str {
        match self {
            LegacyEncoding::Windows1252 => "windows-1252",
            LegacyEncoding::ShiftJis => "shift-jis",
            LegacyEncoding::Gbk => "gbk",
            LegacyEncoding::Big5 => "big5",
        }
    }

    fn codec(self) -> &'static RsEncoding {
        match self {
            LegacyEncoding::Windows1252 => WINDOWS_1252,
            LegacyEncoding::ShiftJis => SHIFT_JIS,
            LegacyEncoding::Gbk => GBK,
            LegacyEncoding::Big5 => BIG5,
        }
    }

    fn from_codec(codec: &'static RsEncoding) -> Option<Self> {
        [
            LegacyEncoding::Windows1252,
            LegacyEncoding::ShiftJis,
            LegacyEncoding::Gbk,
            LegacyEncoding::Big5,
        ]
        .into_iter()
        .find(|legacy| legacy.codec() == codec)
    }
}

/// 文件支援的文字編碼。 / Text encodings a document can be backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Legacy(LegacyEncoding),
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
            Encoding::Legacy(legacy) => legacy.name(),
        }
    }
}

/// 解碼或編碼文件內容時的錯誤。 / Errors raised while decoding or encoding document bytes.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DocumentError {
    #[error("file encoding is not supported or data is invalid")]
    InvalidEncoding,
    #[error("text cannot be represented in target encoding {0}")]
    Unrepresentable(&'static str),
}

/// 分頁背後的文字緩衝，由原始位元組建立。 / Editable text buffer backing one file tab, built from raw bytes.
///
/// The document never touches the disk itself; the session model reads and
/// writes bytes through its file-system provider and hands them over here.
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    contents: String,
    line_ending: LineEnding,
    encoding: Encoding,
    has_bom: bool,
    is_dirty: bool,
}

impl Document {
    /// 解碼位元組並將行尾正規化為 `\n`。 / Decodes bytes and normalises newlines to `\n` internally.
    pub fn from_bytes(bytes: &[u8], path: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let decoded = decode(bytes)?;
        Ok(Self {
            path: path.into(),
            line_ending: LineEnding::detect(&decoded.text),
            contents: normalize_newlines(&decoded.text),
            encoding: decoded.encoding,
            has_bom: decoded.has_bom,
            is_dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 更新路徑（例如檔案被改名），不影響 dirty 狀態。 / Relabels the document without touching its dirty state.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// 取代內容並標記為已修改。 / Replaces the buffer and marks the document dirty.
    pub fn set_contents(&mut self, text: impl Into<String>) {
        self.contents = normalize_newlines(&text.into());
        self.is_dirty = true;
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn set_line_ending(&mut self, ending: LineEnding) {
        if self.line_ending != ending {
            self.line_ending = ending;
            self.is_dirty = true;
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: Encoding) {
        if self.encoding != encoding {
            self.encoding = encoding;
            if matches!(encoding, Encoding::Legacy(_)) {
                self.has_bom = false;
            }
            self.is_dirty = true;
        }
    }

    pub fn has_bom(&self) -> bool {
        self.has_bom
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// 儲存成功後清除 dirty 旗標。 / Clears the dirty flag once the bytes are safely written.
    pub fn mark_saved(&mut self) {
        self.is_dirty = false;
    }

    /// 依原始編碼、BOM 與行尾輸出位元組。 / Encodes the buffer back using the original encoding, BOM and line endings.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        let text = self.contents.replace('\n', self.line_ending.as_str());
        match self.encoding {
            Encoding::Utf8 => {
                let mut out = Vec::with_capacity(text.len() + UTF8_BOM.len());
                if self.has_bom {
                    out.extend_from_slice(UTF8_BOM);
                }
                out.extend_from_slice(text.as_bytes());
                Ok(out)
            }
            Encoding::Utf16Le => Ok(encode_utf16(&text, self.has_bom, false)),
            Encoding::Utf16Be => Ok(encode_utf16(&text, self.has_bom, true)),
            Encoding::Legacy(legacy) => {
                let (encoded, _, had_errors) = legacy.codec().encode(&text);
                if had_errors {
                    return Err(DocumentError::Unrepresentable(legacy.name()));
                }
                Ok(encoded.into_owned())
            }
        }
    }
}

struct Decoded {
    text: String,
    encoding: Encoding,
    has_bom: bool,
}

fn decode(bytes: &[u8]) -> Result<Decoded, DocumentError> {
    let with = |text, encoding, has_bom| Decoded {
        text,
        encoding,
        has_bom,
    };

    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        let text = std::str::from_utf8(rest).map_err(|_| DocumentError::InvalidEncoding)?;
        return Ok(with(text.to_owned(), Encoding::Utf8, true));
    }
    if let Some(rest) = bytes.strip_prefix(UTF16_LE_BOM) {
        return Ok(with(decode_utf16(rest, false)?, Encoding::Utf16Le, true));
    }
    if let Some(rest) = bytes.strip_prefix(UTF16_BE_BOM) {
        return Ok(with(decode_utf16(rest, true)?, Encoding::Utf16Be, true));
    }
    if looks_like_utf16(bytes, false) {
        return Ok(with(decode_utf16(bytes, false)?, Encoding::Utf16Le, false));
    }
    if looks_like_utf16(bytes, true) {
        return Ok(with(decode_utf16(bytes, true)?, Encoding::Utf16Be, false));
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(with(text.to_owned(), Encoding::Utf8, false));
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let legacy = LegacyEncoding::from_codec(detector.guess(None, true))
        .ok_or(DocumentError::InvalidEncoding)?;
    let (text, had_errors) = legacy.codec().decode_without_bom_handling(bytes);
    if had_errors {
        return Err(DocumentError::InvalidEncoding);
    }
    Ok(with(text.into_owned(), Encoding::Legacy(legacy), false))
}

fn decode_utf16(bytes: &[u8], big_endian: bool) -> Result<String, DocumentError> {
    if bytes.len() % 2 != 0 {
        return Err(DocumentError::InvalidEncoding);
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|_| DocumentError::InvalidEncoding)
}

fn encode_utf16(text: &str, include_bom: bool, big_endian: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2 + 2);
    if include_bom {
        out.extend_from_slice(if big_endian { UTF16_BE_BOM } else { UTF16_LE_BOM });
    }
    for unit in text.encode_utf16() {
        let pair = if big_endian {
            unit.to_be_bytes()
        } else {
            unit.to_le_bytes()
        };
        out.extend_from_slice(&pair);
    }
    out
}

// 取樣前 64 位元組，半數以上高位元組為零視為 UTF-16。 / At least half of the sampled high bytes must be zero.
fn looks_like_utf16(bytes: &[u8], big_endian: bool) -> bool {
    if bytes.len() < 2 || bytes.len() % 2 != 0 {
        return false;
    }
    let sample = &bytes[..bytes.len().min(64)];
    let pairs = sample.len() / 2;
    let zeros = sample
        .chunks_exact(2)
        .filter(|pair| if big_endian { pair[0] == 0 } else { pair[1] == 0 })
        .count();
    zeros * 2 >= pairs
}

fn normalize_newlines(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}
