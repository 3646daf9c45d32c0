//! File-backed timing persistence.
//!
//! One JSON file per (reader, collection) pair, named after the storage key
//! `timings.<reader>.part.<collection>`. Only the canonical form of a
//! [`TimingSet`] is ever written.

use std::path::{Path, PathBuf};

use crate::collection::CollectionNumber;
use crate::error::ModelError;
use crate::timing::TimingSet;

/// Directory-backed store of timing sets.
#[derive(Debug, Clone)]
pub struct TimingStore {
    root: PathBuf,
}

impl TimingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage key of a (reader, collection) pair.
    pub fn storage_key(reader_id: &str, collection: u32) -> String {
        format!("timings.{}.part.{collection}", file_safe(reader_id))
    }

    /// File name used when handing a timing set to someone else.
    pub fn export_file_name(reader_id: &str, collection: u32) -> String {
        format!("timings_{}_part-{collection}.json", file_safe(reader_id))
    }

    pub fn path_for(&self, reader_id: &str, collection: u32) -> PathBuf {
        self.root
            .join(format!("{}.json", Self::storage_key(reader_id, collection)))
    }

    /// Load the stored set for a pair.
    ///
    /// A missing file is `Ok(None)`. A file that no longer parses is logged
    /// and also treated as absent so the editor can start over.
    pub fn read(&self, reader_id: &str, collection: u32) -> Result<Option<TimingSet>, ModelError> {
        let path = self.path_for(reader_id, collection);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ModelError::IoError { path, source: e }),
        };

        match TimingSet::from_json(&content) {
            Ok(set) => {
                tracing::debug!(
                    path = %path.display(),
                    items = set.len(),
                    "Loaded timing set"
                );
                Ok(Some(set))
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Ignoring unreadable timing file"
                );
                Ok(None)
            }
        }
    }

    /// Persist a set under its own (reader, collection) key.
    pub fn write(&self, set: &TimingSet) -> Result<PathBuf, ModelError> {
        let path = self.path_for(&set.reader_id, set.collection_number);
        std::fs::create_dir_all(&self.root).map_err(|e| ModelError::IoError {
            path: self.root.clone(),
            source: e,
        })?;
        write_canonical(set, &path)?;
        tracing::info!(
            reader = %set.reader_id,
            collection = set.collection_number,
            items = set.len(),
            path = %path.display(),
            "Saved timing set"
        );
        Ok(path)
    }

    /// Delete the stored set. Returns whether anything was removed.
    pub fn remove(&self, reader_id: &str, collection: u32) -> Result<bool, ModelError> {
        let path = self.path_for(reader_id, collection);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ModelError::IoError { path, source: e }),
        }
    }

    /// Write a portable copy into `dir` using the export file name.
    pub fn export_to(set: &TimingSet, dir: &Path) -> Result<PathBuf, ModelError> {
        let path = dir.join(Self::export_file_name(
            &set.reader_id,
            set.collection_number,
        ));
        write_canonical(set, &path)?;
        Ok(path)
    }

    /// Parse a timing file from anywhere on disk. Unlike [`read`](Self::read),
    /// a malformed file or an out-of-range collection number is an error.
    pub fn import(path: &Path) -> Result<TimingSet, ModelError> {
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let set = TimingSet::from_json(&content).map_err(|e| ModelError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        CollectionNumber::new(i64::from(set.collection_number))?;
        Ok(set)
    }
}

fn write_canonical(set: &TimingSet, path: &Path) -> Result<(), ModelError> {
    let json = set.to_canonical_json().map_err(|e| ModelError::SerializeError {
        path: path.to_path_buf(),
        source: e,
    })?;
    std::fs::write(path, json).map_err(|e| ModelError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
