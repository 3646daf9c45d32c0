//! Reader reference data.
//!
//! Readers are loaded once from a static JSON catalog and never mutated.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A reciter whose recordings back the exported audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reader {
    pub id: String,
    pub name: String,

    /// Collection number (as a string key) to audio locator.
    #[serde(default, alias = "audioParts")]
    pub audio_urls_by_collection: BTreeMap<String, String>,
}

impl Reader {
    /// Audio locator for a collection, if one is configured and non-empty.
    pub fn audio_locator(&self, collection: u32) -> Option<&str> {
        self.audio_urls_by_collection
            .get(&collection.to_string())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// The full reader catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReaderCatalog {
    readers: Vec<Reader>,
}

impl ReaderCatalog {
    pub fn new(readers: Vec<Reader>) -> Self {
        Self { readers }
    }

    /// Load `readers.json` (a JSON array of readers).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let readers: Vec<Reader> =
            serde_json::from_str(&content).map_err(|e| ModelError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        tracing::debug!(path = %path.display(), readers = readers.len(), "Loaded reader catalog");
        Ok(Self { readers })
    }

    pub fn find(&self, id: &str) -> Option<&Reader> {
        self.readers.iter().find(|r| r.id == id)
    }

    /// Reader by id, falling back to the first catalog entry.
    pub fn find_or_first(&self, id: Option<&str>) -> Option<&Reader> {
        id.and_then(|id| self.find(id)).or_else(|| self.first())
    }

    pub fn first(&self) -> Option<&Reader> {
        self.readers.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reader> {
        self.readers.iter()
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {"id": "reader-1", "name": "Reader One", "audioUrlsByCollection": {"1": "https://cdn.example/r1/1.mp3", "2": "  "}},
        {"id": "reader-2", "name": "Reader Two", "audioParts": {"3": "/srv/audio/r2-3.mp3"}}
    ]"#;

    #[test]
    fn test_audio_locator_lookup() {
        let readers: Vec<Reader> = serde_json::from_str(CATALOG).unwrap();
        let catalog = ReaderCatalog::new(readers);

        let one = catalog.find("reader-1").unwrap();
        assert_eq!(one.audio_locator(1), Some("https://cdn.example/r1/1.mp3"));
        assert_eq!(one.audio_locator(2), None);
        assert_eq!(one.audio_locator(5), None);

        let two = catalog.find("reader-2").unwrap();
        assert_eq!(two.audio_locator(3), Some("/srv/audio/r2-3.mp3"));
    }

    #[test]
    fn test_find_or_first() {
        let readers: Vec<Reader> = serde_json::from_str(CATALOG).unwrap();
        let catalog = ReaderCatalog::new(readers);
        assert_eq!(catalog.find_or_first(Some("missing")).unwrap().id, "reader-1");
        assert_eq!(catalog.find_or_first(None).unwrap().id, "reader-1");
        assert_eq!(catalog.find_or_first(Some("reader-2")).unwrap().id, "reader-2");
        assert!(ReaderCatalog::default().find_or_first(None).is_none());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readers.json");
        std::fs::write(&path, CATALOG).unwrap();
        let catalog = ReaderCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            ReaderCatalog::load(&path),
            Err(ModelError::ParseError { .. })
        ));
    }
}
