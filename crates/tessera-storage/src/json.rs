//! JSON file backend.
//!
//! The whole store lives in one `governance.json` file of the shape
//! `{ column: { hex(key): hex(value) } }`. Every batch rewrites the file
//! through a temporary sibling and a rename, so a crash leaves either the old
//! or the new contents on disk.

use crate::{Column, KeyValueStore, StorageError, WriteBatch, WriteOp};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

type Columns = BTreeMap<String, BTreeMap<String, String>>;

const DATA_FILE: &str = "governance.json";

/// File-backed store for single-node deployments.
pub struct JsonFileStore {
    path: PathBuf,
    data: RwLock<Columns>,
}

impl JsonFileStore {
    /// Open (or create) a store in `dir`.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        if dir.to_string_lossy().contains("..") {
            return Err(StorageError::InvalidPath(format!(
                "directory traversal in {}",
                dir.display()
            )));
        }
        fs::create_dir_all(dir)?;

        let data_file = dir.join(DATA_FILE);
        let data = if data_file.exists() {
            let content = fs::read_to_string(&data_file)?;
            serde_json::from_str(&content)
                .map_err(|e| StorageError::Deserialization(e.to_string()))?
        } else {
            Columns::new()
        };

        debug!(path = %data_file.display(), "opened json governance store");
        Ok(Self {
            path: dir.to_path_buf(),
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &Columns) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(data)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let tmp = self.path.join(format!("{}.tmp", DATA_FILE));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, self.path.join(DATA_FILE))?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let data = self.data.read();
        match data.get(column.name()).and_then(|c| c.get(&hex::encode(key))) {
            Some(value) => Ok(Some(hex::decode(value)?)),
            None => Ok(None),
        }
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut data = self.data.write();
        let mut next = data.clone();
        for op in batch.into_ops() {
            match op {
                WriteOp::Put { column, key, value } => {
                    next.entry(column.name().to_string())
                        .or_default()
                        .insert(hex::encode(key), hex::encode(value));
                }
                WriteOp::Delete { column, key } => {
                    if let Some(c) = next.get_mut(column.name()) {
                        c.remove(&hex::encode(key));
                    }
                }
            }
        }
        // Install in memory only once the file write succeeded.
        self.persist(&next)?;
        *data = next;
        Ok(())
    }

    fn scan(&self, column: Column) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let data = self.data.read();
        let Some(entries) = data.get(column.name()) else {
            return Ok(Vec::new());
        };
        let mut out = entries
            .iter()
            .map(|(k, v)| -> Result<(Vec<u8>, Vec<u8>), StorageError> {
                Ok((hex::decode(k)?, hex::decode(v)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        out.sort();
        Ok(out)
    }
}
