//! Gallery persisted as a single versioned JSON document.

use std::fs;
use std::path::{Path, PathBuf};

use likeness_core::EnrollmentRecord;
use serde::{Deserialize, Serialize};

use crate::{EnrollmentStore, StoreError};

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct GalleryDocumentRef<'a> {
    version: u32,
    records: &'a [EnrollmentRecord],
}

#[derive(Deserialize)]
struct GalleryDocument {
    version: u32,
    #[serde(default)]
    records: Vec<EnrollmentRecord>,
}

/// JSON file store. Saves write a sibling temp file and rename it over the
/// target, so readers never observe a half-written gallery.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "gallery.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl EnrollmentStore for JsonFileStore {
    fn load(&self) -> Result<Vec<EnrollmentRecord>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no gallery file yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let doc: GalleryDocument =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
                path: self.path.display().to_string(),
                source,
            })?;

        if doc.version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion(doc.version));
        }

        tracing::debug!(
            path = %self.path.display(),
            records = doc.records.len(),
            "gallery loaded"
        );
        Ok(doc.records)
    }

    fn save(&self, gallery: &[EnrollmentRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let doc = GalleryDocumentRef {
            version: FORMAT_VERSION,
            records: gallery,
        };
        let json = serde_json::to_vec_pretty(&doc).map_err(|source| StoreError::Malformed {
            path: self.path.display().to_string(),
            source,
        })?;

        let tmp = self.temp_path();
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            self.io_error(e)
        })?;

        tracing::debug!(
            path = %self.path.display(),
            records = gallery.len(),
            "gallery saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use likeness_core::Embedding;

    #[test]
    fn test_missing_file_is_empty_gallery() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("gallery.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/gallery.json"));
        let gallery = vec![
            EnrollmentRecord::new("Bob", Embedding::new(vec![0.1, 0.2])),
            EnrollmentRecord::new("Alice", Embedding::new(vec![0.3, 0.4])),
            EnrollmentRecord::new("Bob", Embedding::new(vec![0.5, 0.6]).with_model_version("v2")),
        ];

        store.save(&gallery).unwrap();
        assert_eq!(store.load().unwrap(), gallery);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_save_replaces_previous_gallery() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("gallery.json"));
        store
            .save(&[EnrollmentRecord::new("Alice", Embedding::new(vec![1.0]))])
            .unwrap();
        store.save(&[]).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.json");
        fs::write(&path, b"{not json").unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.json");
        fs::write(&path, br#"{"version": 7, "records": []}"#).unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion(7)));
    }
}
