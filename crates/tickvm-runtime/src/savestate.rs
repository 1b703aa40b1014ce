//! Save-state files
//!
//! The `SaveFile`/`LoadFile` controllers persist one of an entity's
//! variable stores. Layout, all little-endian:
//!
//! ```text
//! "TKSV"  version: u16  kind: u8  count: u32
//! kind 0 (map):        (key_len: u32, key: utf-8, value: f32) * count
//! kind 1 (int vars):   i32 * count
//! kind 2 (float vars): f32 * count
//! ```

use crate::entity::Entity;
use crate::value::RuntimeError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// File magic
pub const MAGIC: &[u8; 4] = b"TKSV";
/// Current format version
pub const SAVE_VERSION: u16 = 1;

const HEADER_LEN: usize = 4 + 2 + 1 + 4;

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("Not a save-state file (bad magic)")]
    BadMagic,

    #[error("Save-state version {0} is not supported (expected {SAVE_VERSION})")]
    UnsupportedVersion(u16),

    #[error("Unknown save-state kind {0}")]
    UnknownKind(u8),

    #[error("Save-state holds {found:?}, expected {expected:?}")]
    KindMismatch { expected: SaveKind, found: SaveKind },

    #[error("Save-state truncated at byte {offset}")]
    Truncated { offset: usize },

    #[error("Invalid UTF-8 in map key at byte {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("Save path '{0}' must stay inside the save directory")]
    PathRejected(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<SaveStateError> for RuntimeError {
    fn from(e: SaveStateError) -> Self {
        RuntimeError::SaveState(e.to_string())
    }
}

/// Which store a file holds
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SaveKind {
    Map = 0,
    IntVars = 1,
    FloatVars = 2,
}

impl SaveKind {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(SaveKind::Map),
            1 => Some(SaveKind::IntVars),
            2 => Some(SaveKind::FloatVars),
            _ => None,
        }
    }
}

/// Decoded file contents
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum SaveData {
    Map(BTreeMap<String, f32>),
    IntVars(Vec<i32>),
    FloatVars(Vec<f32>),
}

impl SaveData {
    /// Copies the store of `kind` out of `e`.
    pub fn capture(e: &Entity, kind: SaveKind) -> Self {
        match kind {
            SaveKind::Map => SaveData::Map(e.map.clone()),
            SaveKind::IntVars => SaveData::IntVars(e.ivar.clone()),
            SaveKind::FloatVars => SaveData::FloatVars(e.fvar.clone()),
        }
    }

    /// Writes the data back into `e`. The map is replaced; variable arrays
    /// take as many leading values as both sides have.
    pub fn restore(self, e: &mut Entity) {
        match self {
            SaveData::Map(map) => e.map = map,
            SaveData::IntVars(values) => {
                for (slot, v) in e.ivar.iter_mut().zip(values) {
                    *slot = v;
                }
            }
            SaveData::FloatVars(values) => {
                for (slot, v) in e.fvar.iter_mut().zip(values) {
                    *slot = v;
                }
            }
        }
    }

    pub fn kind(&self) -> SaveKind {
        match self {
            SaveData::Map(_) => SaveKind::Map,
            SaveData::IntVars(_) => SaveKind::IntVars,
            SaveData::FloatVars(_) => SaveKind::FloatVars,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SaveData::Map(m) => m.len(),
            SaveData::IntVars(v) => v.len(),
            SaveData::FloatVars(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&SAVE_VERSION.to_le_bytes());
        bytes.push(self.kind() as u8);
        bytes.extend_from_slice(&(self.len() as u32).to_le_bytes());
        match self {
            SaveData::Map(map) => {
                for (key, value) in map {
                    bytes.extend_from_slice(&(key.len() as u32).to_le_bytes());
                    bytes.extend_from_slice(key.as_bytes());
                    bytes.extend_from_slice(&value.to_le_bytes());
                }
            }
            SaveData::IntVars(values) => {
                for v in values {
                    bytes.extend_from_slice(&v.to_le_bytes());
                }
            }
            SaveData::FloatVars(values) => {
                for v in values {
                    bytes.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SaveStateError> {
        let mut r = Reader { bytes, at: 0 };
        if r.take::<4>()? != *MAGIC {
            return Err(SaveStateError::BadMagic);
        }
        let version = u16::from_le_bytes(r.take()?);
        if version != SAVE_VERSION {
            return Err(SaveStateError::UnsupportedVersion(version));
        }
        let [code] = r.take::<1>()?;
        let kind = SaveKind::from_code(code as i32).ok_or(SaveStateError::UnknownKind(code))?;
        let count = u32::from_le_bytes(r.take()?) as usize;

        Ok(match kind {
            SaveKind::Map => {
                let mut map = BTreeMap::new();
                for _ in 0..count {
                    let len = u32::from_le_bytes(r.take()?) as usize;
                    let start = r.at;
                    let key = std::str::from_utf8(r.slice(len)?)
                        .map_err(|_| SaveStateError::InvalidUtf8 { offset: start })?;
                    let value = f32::from_le_bytes(r.take()?);
                    map.insert(key.to_string(), value);
                }
                SaveData::Map(map)
            }
            SaveKind::IntVars => SaveData::IntVars(
                (0..count)
                    .map(|_| r.take().map(i32::from_le_bytes))
                    .collect::<Result<_, _>>()?,
            ),
            SaveKind::FloatVars => SaveData::FloatVars(
                (0..count)
                    .map(|_| r.take().map(f32::from_le_bytes))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn slice(&mut self, len: usize) -> Result<&'a [u8], SaveStateError> {
        let end = self
            .at
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(SaveStateError::Truncated { offset: self.at })?;
        let s = &self.bytes[self.at..end];
        self.at = end;
        Ok(s)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], SaveStateError> {
        let at = self.at;
        self.slice(N)?
            .try_into()
            .map_err(|_| SaveStateError::Truncated { offset: at })
    }
}

/// Joins `relative` onto `save_dir`, refusing absolute paths and `..`.
pub fn resolve_path(save_dir: &Path, relative: &str) -> Result<PathBuf, SaveStateError> {
    let rel = Path::new(relative);
    let escapes = rel.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if relative.is_empty() || escapes {
        return Err(SaveStateError::PathRejected(relative.to_string()));
    }
    Ok(save_dir.join(rel))
}

/// Writes `data`, creating parent directories as needed.
pub fn write_file(path: &Path, data: &SaveData) -> Result<(), SaveStateError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data.to_bytes())?;
    Ok(())
}

/// Reads a save file. A missing file is `Ok(None)`.
pub fn read_file(path: &Path) -> Result<Option<SaveData>, SaveStateError> {
    match fs::read(path) {
        Ok(bytes) => SaveData::from_bytes(&bytes).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_header_layout() {
        let bytes = SaveData::IntVars(vec![1, -1]).to_bytes();
        assert_eq!(
            bytes,
            vec![
                b'T', b'K', b'S', b'V', 1, 0, 1, 2, 0, 0, 0, 1, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF
            ]
        );
    }

    #[test]
    fn test_map_file_round_trip() {
        let mut map = BTreeMap::new();
        map.insert("combo".to_string(), 3.0);
        map.insert("rage".to_string(), 0.25);
        let data = SaveData::Map(map);
        assert_eq!(SaveData::from_bytes(&data.to_bytes()).unwrap(), data);
    }

    #[rstest]
    #[case::empty(&[], "truncated")]
    #[case::wrong_magic(b"ATB\0\x01\x00\x01\x00\x00\x00\x00", "bad magic")]
    #[case::version(b"TKSV\x09\x00\x01\x00\x00\x00\x00", "version 9")]
    #[case::kind(b"TKSV\x01\x00\x07\x00\x00\x00\x00", "kind 7")]
    #[case::truncated(b"TKSV\x01\x00\x01\x02\x00\x00\x00\x01\x00", "truncated")]
    fn test_rejects_bad_input(#[case] bytes: &[u8], #[case] message: &str) {
        let err = SaveData::from_bytes(bytes).unwrap_err();
        assert!(
            err.to_string().contains(message),
            "'{}' should mention '{}'",
            err,
            message
        );
    }

    #[rstest]
    #[case::absolute("/etc/passwd")]
    #[case::parent("../outside.sav")]
    #[case::nested_parent("a/../../b.sav")]
    #[case::empty("")]
    fn test_resolve_path_rejects_escapes(#[case] path: &str) {
        assert!(matches!(
            resolve_path(Path::new("saves"), path),
            Err(SaveStateError::PathRejected(_))
        ));
    }

    #[test]
    fn test_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_file(&dir.path().join("none.sav")).unwrap().is_none());

        let path = resolve_path(dir.path(), "slot/one.sav").unwrap();
        write_file(&path, &SaveData::FloatVars(vec![0.5])).unwrap();
        assert_eq!(
            read_file(&path).unwrap(),
            Some(SaveData::FloatVars(vec![0.5]))
        );
    }

    proptest! {
        #[test]
        fn prop_int_vars_round_trip(values in proptest::collection::vec(any::<i32>(), 0..80)) {
            let data = SaveData::IntVars(values);
            prop_assert_eq!(SaveData::from_bytes(&data.to_bytes()).unwrap(), data);
        }
    }
}
