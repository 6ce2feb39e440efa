//! On-disk spark data and Sparklet library
//!
//! Both stores keep one pretty-printed JSON file per key under a directory
//! that is created on first write.

use sparklet_core::{SparkDataStore, SparkletRecord, SparkletRepository, StoreError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Map a key to a file name; anything outside `[A-Za-z0-9_-]` becomes `_`
fn file_name(key: &str) -> String {
    let stem: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.json", stem)
}

fn read_json(path: &Path, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                key: key.to_string(),
                source,
            })
        }
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })
}

/// Write through a temp file so a crash never leaves half a document
fn write_json(dir: &Path, path: &Path, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
    let io_error = |source| StoreError::Io {
        key: key.to_string(),
        source,
    };
    fs::create_dir_all(dir).map_err(io_error)?;

    let text = serde_json::to_string_pretty(value).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, text).map_err(io_error)?;
    fs::rename(&tmp, path).map_err(io_error)?;
    Ok(())
}

/// Spark key/value blobs as files
#[derive(Debug, Clone)]
pub struct FileDataStore {
    dir: PathBuf,
}

impl FileDataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(file_name(key))
    }
}

impl SparkDataStore for FileDataStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        read_json(&self.path(key), key)
    }

    fn set(&mut self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        write_json(&self.dir, &self.path(key), key, &value)
    }
}

/// Sparklet records as files named by id
#[derive(Debug, Clone)]
pub struct FileRepository {
    dir: PathBuf,
}

impl FileRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: &str) -> PathBuf {
        self.dir.join(file_name(id))
    }
}

impl SparkletRepository for FileRepository {
    fn get(&self, id: &str) -> Result<Option<SparkletRecord>, StoreError> {
        match read_json(&self.path(id), id)? {
            Some(json) => serde_json::from_value(json)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: id.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn put(&mut self, record: SparkletRecord) -> Result<(), StoreError> {
        let json = serde_json::to_value(&record).map_err(|source| StoreError::Corrupt {
            key: record.id.clone(),
            source,
        })?;
        write_json(&self.dir, &self.path(&record.id), &record.id, &json)?;
        debug!(id = %record.id, "Stored sparklet record");
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        match fs::remove_file(self.path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Io {
                key: id.to_string(),
                source,
            }),
        }
    }

    /// All readable records, oldest first. Unreadable files are skipped
    /// with a warning so one corrupt record does not hide the library.
    fn list(&self) -> Result<Vec<SparkletRecord>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    key: self.dir.display().to_string(),
                    source,
                })
            }
        };

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let key = path.display().to_string();
            let parsed = read_json(&path, &key).and_then(|json| match json {
                Some(json) => serde_json::from_value::<SparkletRecord>(json)
                    .map(Some)
                    .map_err(|source| StoreError::Corrupt { key: key.clone(), source }),
                None => Ok(None),
            });
            match parsed {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Skipping unreadable record"),
            }
        }
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }
}
