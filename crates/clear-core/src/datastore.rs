use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const STORAGE_FILE: &str = "storage.json";

/// Durable string key/value storage, the client's equivalent of browser
/// local storage. Every mutation rewrites the backing file atomically.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub storage_path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let storage_path = data_dir.join(STORAGE_FILE);
        let entries = if storage_path.exists() {
            load_entries(&storage_path)?
        } else {
            BTreeMap::new()
        };

        info!(
            data_dir = %data_dir.display(),
            storage = %storage_path.display(),
            keys = entries.len(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            storage_path,
            entries,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    #[tracing::instrument(skip(self, value))]
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.into());
        self.flush()
    }

    #[tracing::instrument(skip(self))]
    pub fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    /// Reads a JSON value stored under `key`. A value that no longer parses is
    /// reported and treated as absent.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "ignoring unreadable stored value");
                None
            }
        }
    }

    pub fn set_json<T: Serialize>(&mut self, key: &str, value: &T) -> anyhow::Result<()> {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("failed to serialize {key}"))?;
        self.set(key, raw)
    }

    /// Writes an auxiliary file next to the storage file.
    #[tracing::instrument(skip(self, contents))]
    pub fn write_file(&self, name: &str, contents: &str) -> anyhow::Result<PathBuf> {
        let path = self.data_dir.join(name);
        write_atomic(&path, contents.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    fn flush(&self) -> anyhow::Result<()> {
        let serialized = serde_json::to_vec_pretty(&self.entries)?;
        write_atomic(&self.storage_path, &serialized)
            .with_context(|| format!("failed to save {}", self.storage_path.display()))
    }
}

#[tracing::instrument(skip(path))]
fn load_entries(path: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    debug!(file = %path.display(), "loading storage");
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&raw).with_context(|| format!("failed parsing {}", path.display()))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    debug!(file = %path.display(), len = bytes.len(), "saving atomically");
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
    Ok(())
}
