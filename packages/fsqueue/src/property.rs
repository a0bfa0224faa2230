//! Per-job key/value properties.
//!
//! Each property is one file in the job directory. Writes go to a unique temp
//! file in `staging/` and are renamed over the key, so a reader sees either
//! the previous value or the new one, never a truncated file.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use queue_core::validate_component;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{QueueError, Result};
use crate::layout::Layout;

/// Property store for a single job directory.
///
/// This is a view onto a path: once the job moves, a `Properties` obtained
/// before the move points at the old location.
#[derive(Debug, Clone)]
pub struct Properties {
    dir: PathBuf,
    layout: Arc<Layout>,
}

impl Properties {
    pub(crate) fn new(dir: PathBuf, layout: Arc<Layout>) -> Self {
        Self { dir, layout }
    }

    pub fn get(&self, key: &str) -> Result<Bytes> {
        validate_component(key)?;
        let path = self.dir.join(key);
        let data = std::fs::read(&path).map_err(|e| QueueError::from_io(&path, e))?;
        Ok(Bytes::from(data))
    }

    pub fn set(&self, key: &str, data: impl AsRef<[u8]>) -> Result<()> {
        validate_component(key)?;
        let staging = self.layout.staging();
        let mut tmp = storage::create_unique_file(&staging, key)
            .map_err(|e| QueueError::from_io(&staging, e))?;

        let write = tmp
            .write_all(data.as_ref())
            .and_then(|()| tmp.as_file().sync_all());
        if let Err(e) = write {
            return Err(QueueError::from_io(tmp.path(), e));
        }

        let dest = self.dir.join(key);
        tmp.persist(&dest).map_err(|e| {
            tracing::warn!(
                from = %e.file.path().display(),
                to = %dest.display(),
                error = %e.error,
                "failed to rename property into place"
            );
            QueueError::from_io(&dest, e.error)
        })?;
        Ok(())
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let bytes = self.get(key)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes)
    }

    /// Names of the properties present, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| QueueError::from_io(&self.dir, e))?;
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| QueueError::from_io(&self.dir, e))?;
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                keys.push(name);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
