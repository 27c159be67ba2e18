//! Path (de)serialisation that survives non-UTF-8 file names.
//! 路徑序列化：UTF-8 直接輸出，否則以 `b64:` 前綴的 base64 保存原始位元組。

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

const B64_PREFIX: &str = "b64:";

pub fn serialize<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&encode(path))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PathBuf, D::Error> {
    let text = String::deserialize(deserializer)?;
    decode(&text).map_err(D::Error::custom)
}

/// `Option<PathBuf>` fields.
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<PathBuf>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(path) => serializer.serialize_some(&encode(path)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<PathBuf>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| decode(&text).map_err(D::Error::custom))
            .transpose()
    }
}

/// Ordered `Vec<PathBuf>` fields.
pub mod vec {
    use super::*;
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(paths: &[PathBuf], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(paths.len()))?;
        for path in paths {
            seq.serialize_element(&encode(path))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<PathBuf>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|text| decode(text).map_err(D::Error::custom))
            .collect()
    }
}

fn encode(path: &Path) -> String {
    match path.to_str() {
        Some(text) => text.to_owned(),
        None => format!("{B64_PREFIX}{}", BASE64.encode(os_bytes(path))),
    }
}

fn decode(text: &str) -> Result<PathBuf, String> {
    match text.strip_prefix(B64_PREFIX) {
        Some(payload) => {
            let bytes = BASE64
                .decode(payload)
                .map_err(|err| format!("invalid base64 path payload: {err}"))?;
            path_from_os_bytes(bytes)
        }
        None => Ok(PathBuf::from(text)),
    }
}

#[cfg(unix)]
fn os_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
fn path_from_os_bytes(bytes: Vec<u8>) -> Result<PathBuf, String> {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;
    Ok(PathBuf::from(OsString::from_vec(bytes)))
}

// Windows paths are stored as little-endian UTF-16 code units.
#[cfg(windows)]
fn os_bytes(path: &Path) -> Vec<u8> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str()
        .encode_wide()
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}

#[cfg(windows)]
fn path_from_os_bytes(bytes: Vec<u8>) -> Result<PathBuf, String> {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    if bytes.len() % 2 != 0 {
        return Err("encoded Windows path has odd byte length".to_string());
    }
    let wide: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(PathBuf::from(OsString::from_wide(&wide)))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    use serde::Serialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super::option")]
        current: Option<PathBuf>,
        #[serde(with = "super::vec")]
        all: Vec<PathBuf>,
    }

    #[test]
    fn utf8_paths_stay_readable() {
        assert_eq!(encode(Path::new("/srv/notes.txt")), "/srv/notes.txt");
        assert_eq!(decode("/srv/notes.txt").unwrap(), PathBuf::from("/srv/notes.txt"));
    }

    #[test]
    fn non_utf8_paths_use_base64() {
        let raw = Path::new(OsStr::from_bytes(b"/srv/caf\xE9.txt"));
        let encoded = encode(raw);
        assert!(encoded.starts_with(B64_PREFIX));
        assert_eq!(decode(&encoded).unwrap(), raw);
    }

    #[test]
    fn broken_payload_is_rejected() {
        assert!(decode("b64:%%%").is_err());
    }

    #[test]
    fn optional_and_list_fields_use_the_same_encoding() {
        let raw = PathBuf::from(OsStr::from_bytes(b"/srv/caf\xE9.txt"));
        let holder = Holder {
            current: Some(raw.clone()),
            all: vec![PathBuf::from("/srv/a"), raw],
        };

        let json = serde_json::to_string(&holder).unwrap();
        assert!(json.contains("\"/srv/a\""));
        assert_eq!(json.matches(B64_PREFIX).count(), 2);
        let back: Holder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, holder);

        let empty: Holder = serde_json::from_str(r#"{"current":null,"all":[]}"#).unwrap();
        assert_eq!(empty.current, None);
        assert!(serde_json::from_str::<Holder>(r#"{"current":"b64:%%","all":[]}"#).is_err());
    }
}
