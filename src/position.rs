//! Reading positions over a simple scalar key-value store.
//!
//! Failures never block reading: a store that cannot be read behaves as if
//! nothing was saved, and a failed write is logged and forgotten.

use crate::cache::{document_key, write_atomic};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadingPosition {
    pub document_id: String,
    /// Page index in single-page terms, independent of composition.
    pub absolute_page: usize,
    /// Advisory resume point within the screen.
    pub screen_unit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Scalar::Int(value) => usize::try_from(*value).ok(),
            _ => None,
        }
    }
}

impl From<usize> for Scalar {
    fn from(value: usize) -> Self {
        Scalar::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Store is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Store could not be serialized: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Scalar>, StoreError>;
    fn set(&mut self, key: &str, value: Scalar) -> Result<(), StoreError>;
}

/// Flat TOML table on disk, rewritten atomically on every `set`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, Scalar>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(data) => Ok(toml::from_str(&data)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Scalar>, StoreError> {
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&mut self, key: &str, value: Scalar) -> Result<(), StoreError> {
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), value);
        let contents = toml::to_string(&entries)?;
        write_atomic(&self.path, contents.as_bytes())?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Scalar>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Scalar>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Scalar) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

pub struct PositionStore {
    store: Box<dyn KeyValueStore>,
}

impl PositionStore {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Last reading position, or `None` when nothing usable is stored.
    pub fn load(&self, document_id: &str) -> Option<ReadingPosition> {
        let key = position_key(document_id);
        let value = match self.store.get(&key) {
            Ok(value) => value?,
            Err(err) => {
                warn!(key, "Position store unreadable: {err}");
                return None;
            }
        };
        let Some((absolute_page, screen_unit)) = decode_position(&value) else {
            warn!(key, ?value, "Ignoring malformed stored position");
            return None;
        };
        debug!(document = document_id, absolute_page, screen_unit, "Loaded reading position");
        Some(ReadingPosition {
            document_id: document_id.to_string(),
            absolute_page,
            screen_unit,
        })
    }

    /// Page and unit go out in one write, so a failure leaves the previous
    /// pair intact.
    pub fn save(&mut self, position: &ReadingPosition) {
        let value = Scalar::Text(format!(
            "{}:{}",
            position.absolute_page, position.screen_unit
        ));
        match self.store.set(&position_key(&position.document_id), value) {
            Ok(()) => debug!(
                document = %position.document_id,
                page = position.absolute_page,
                unit = position.screen_unit,
                "Saved reading position"
            ),
            Err(err) => warn!(document = %position.document_id, "Failed to save reading position: {err}"),
        }
    }

    pub fn load_bookmark(&self, document_id: &str) -> Option<usize> {
        self.read_index(&format!("{}.bookmark", document_key(document_id)))
    }

    pub fn save_bookmark(&mut self, document_id: &str, page: usize) {
        let key = format!("{}.bookmark", document_key(document_id));
        if let Err(err) = self.store.set(&key, page.into()) {
            warn!(document = document_id, "Failed to save bookmark: {err}");
        }
    }

    fn read_index(&self, key: &str) -> Option<usize> {
        match self.store.get(key) {
            Ok(Some(value)) => {
                let index = value.as_index();
                if index.is_none() {
                    warn!(key, ?value, "Ignoring malformed stored index");
                }
                index
            }
            Ok(None) => None,
            Err(err) => {
                warn!(key, "Position store unreadable: {err}");
                None
            }
        }
    }
}

fn position_key(document_id: &str) -> String {
    format!("{}.position", document_key(document_id))
}

/// `"<page>:<unit>"`.
fn decode_position(value: &Scalar) -> Option<(usize, usize)> {
    let Scalar::Text(text) = value else {
        return None;
    };
    let (page, unit) = text.split_once(':')?;
    Some((page.trim().parse().ok()?, unit.trim().parse().ok()?))
}

impl std::fmt::Debug for PositionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailingStore, FlakyStore};

    fn position(page: usize, unit: usize) -> ReadingPosition {
        ReadingPosition {
            document_id: "book.epub".into(),
            absolute_page: page,
            screen_unit: unit,
        }
    }

    #[test]
    fn memory_store_round_trips_positions() {
        let mut store = PositionStore::new(MemoryStore::new());
        assert_eq!(store.load("book.epub"), None);
        store.save(&position(12, 5));
        assert_eq!(store.load("book.epub"), Some(position(12, 5)));
        assert_eq!(store.load("other.epub"), None);
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("positions.toml");
        PositionStore::new(FileStore::new(&path)).save(&position(3, 10));
        PositionStore::new(FileStore::new(&path)).save_bookmark("book.epub", 2);

        let reopened = PositionStore::new(FileStore::new(&path));
        assert_eq!(reopened.load("book.epub"), Some(position(3, 10)));
        assert_eq!(reopened.load_bookmark("book.epub"), Some(2));
    }

    #[test]
    fn corrupt_file_reads_as_no_position() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("positions.toml");
        fs::write(&path, "this is = = not toml").expect("write");
        let store = PositionStore::new(FileStore::new(&path));
        assert_eq!(store.load("book.epub"), None);
    }

    #[test]
    fn failing_store_never_blocks() {
        let mut store = PositionStore::new(FailingStore);
        store.save(&position(1, 0));
        assert_eq!(store.load("book.epub"), None);
    }

    #[test]
    fn failed_write_keeps_previous_position() {
        let mut store = PositionStore::new(FlakyStore::failing_after(1));
        store.save(&position(1, 2));
        store.save(&position(7, 3));
        assert_eq!(store.load("book.epub"), Some(position(1, 2)));
    }

    #[test]
    fn first_failed_write_leaves_nothing_saved() {
        let mut store = PositionStore::new(FlakyStore::failing_after(0));
        store.save(&position(7, 3));
        assert_eq!(store.load("book.epub"), None);
    }

    #[test]
    fn malformed_values_are_ignored() {
        for value in [
            Scalar::Int(4),
            Scalar::Text("-4:0".into()),
            Scalar::Text("4".into()),
            Scalar::Text("4:x".into()),
        ] {
            let mut raw = MemoryStore::new();
            raw.set(&position_key("book.epub"), value).expect("set");
            let store = PositionStore::new(raw);
            assert_eq!(store.load("book.epub"), None);
        }
    }

    #[test]
    fn file_store_writes_one_entry_per_position() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("positions.toml");
        let mut store = PositionStore::new(FileStore::new(&path));
        store.save(&position(3, 10));
        store.save(&position(4, 0));
        let entries: BTreeMap<String, Scalar> =
            toml::from_str(&fs::read_to_string(&path).expect("read")).expect("toml");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[&position_key("book.epub")], Scalar::Text("4:0".into()));
    }

    #[test]
    fn scalars_parse_from_toml() {
        let entries: BTreeMap<String, Scalar> =
            toml::from_str("a = 1\nb = 1.5\nc = true\nd = \"en_US\"\n").expect("toml");
        assert_eq!(entries["a"], Scalar::Int(1));
        assert_eq!(entries["b"], Scalar::Float(1.5));
        assert_eq!(entries["c"], Scalar::Bool(true));
        assert_eq!(entries["d"], Scalar::Text("en_US".into()));
    }
}
