//! Enrollment gallery published as immutable snapshots.
//!
//! Readers take an `Arc` snapshot and match against it without holding any
//! lock. Writers are serialized, persist the new gallery through the store,
//! and only then swap the snapshot in. A match that already holds a snapshot
//! keeps using it.

use std::sync::{Arc, Mutex, RwLock};

use likeness_core::{Embedding, EnrollmentRecord};
use likeness_store::{EnrollmentStore, StoreError};
use thiserror::Error;

/// Immutable view of the gallery at one version.
pub type Snapshot = Arc<[EnrollmentRecord]>;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("enrollment name must not be blank")]
    InvalidName,
    #[error("cannot enroll an empty embedding")]
    EmptyEmbedding,
    #[error("cannot enroll an embedding with NaN or infinite values")]
    NonFiniteEmbedding,
    #[error("embedding dimension mismatch: gallery uses {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

pub struct Gallery {
    store: Box<dyn EnrollmentStore>,
    current: RwLock<Snapshot>,
    writer: Mutex<()>,
    expected_dimension: Option<usize>,
}

impl Gallery {
    /// Load the gallery from `store`.
    ///
    /// `expected_dimension` pins the embedding length; without it the length
    /// of the first enrolled record is used.
    pub fn open(
        store: impl EnrollmentStore + 'static,
        expected_dimension: Option<usize>,
    ) -> Result<Self, GalleryError> {
        let records = store.load()?;

        let reference = expected_dimension.or_else(|| records.first().map(|r| r.embedding.len()));
        if let Some(dim) = reference {
            let mismatched = records
                .iter()
                .filter(|r| r.embedding.len() != dim)
                .count();
            if mismatched > 0 {
                tracing::warn!(
                    expected = dim,
                    mismatched,
                    "gallery contains records of a different dimension"
                );
            }
        }

        tracing::info!(records = records.len(), "gallery opened");

        Ok(Self {
            store: Box::new(store),
            current: RwLock::new(records.into()),
            writer: Mutex::new(()),
            expected_dimension,
        })
    }

    /// Current gallery version.
    pub fn snapshot(&self) -> Snapshot {
        // The guarded value is only ever replaced whole, so a poisoned lock
        // still holds a consistent snapshot.
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Embedding length new enrollments must have, if one is established.
    pub fn dimension(&self) -> Option<usize> {
        self.expected_dimension
            .or_else(|| self.snapshot().first().map(|r| r.embedding.len()))
    }

    /// Records enrolled under `name`, in enrollment order.
    pub fn records_named(&self, name: &str) -> Vec<EnrollmentRecord> {
        self.snapshot()
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect()
    }

    /// Append a new record. Enrolling an existing name adds another record.
    pub fn enroll(&self, name: &str, embedding: Embedding) -> Result<EnrollmentRecord, GalleryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GalleryError::InvalidName);
        }
        if embedding.is_empty() {
            return Err(GalleryError::EmptyEmbedding);
        }
        // JSON has no NaN or infinity, so such a record could be saved but
        // never loaded again.
        if embedding.values.iter().any(|v| !v.is_finite()) {
            return Err(GalleryError::NonFiniteEmbedding);
        }

        let _writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(expected) = self.dimension() {
            if embedding.len() != expected {
                return Err(GalleryError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }

        let record = EnrollmentRecord::new(name, embedding);
        let mut records = self.snapshot().to_vec();
        records.push(record.clone());
        self.publish(records)?;

        tracing::info!(id = %record.id, name = %record.name, "face enrolled");
        Ok(record)
    }

    /// Delete one record by id. Returns whether it existed.
    pub fn remove(&self, id: &str) -> Result<bool, GalleryError> {
        let _writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.snapshot();
        let records: Vec<EnrollmentRecord> =
            current.iter().filter(|r| r.id != id).cloned().collect();
        if records.len() == current.len() {
            return Ok(false);
        }
        self.publish(records)?;
        tracing::info!(id, "enrollment removed");
        Ok(true)
    }

    /// Delete every record. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, GalleryError> {
        let _writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let removed = self.snapshot().len();
        self.publish(Vec::new())?;
        tracing::info!(removed, "gallery cleared");
        Ok(removed)
    }

    /// Persist, then swap. Caller holds the writer lock.
    fn publish(&self, records: Vec<EnrollmentRecord>) -> Result<(), GalleryError> {
        self.store.save(&records)?;
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = records.into();
        Ok(())
    }
}

impl std::fmt::Debug for Gallery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gallery")
            .field("records", &self.len())
            .field("expected_dimension", &self.expected_dimension)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use likeness_core::find_best_match;
    use likeness_store::{JsonFileStore, MemoryStore};

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn test_enroll_is_additive() {
        let gallery = Gallery::open(MemoryStore::new(), None).unwrap();
        gallery.enroll("Alice", emb(&[1.0, 0.0])).unwrap();
        gallery.enroll("Bob", emb(&[0.0, 1.0])).unwrap();
        gallery.enroll("Alice", emb(&[0.9, 0.1])).unwrap();

        let names: Vec<String> = gallery.snapshot().iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, ["Alice", "Bob", "Alice"]);
        assert_eq!(gallery.records_named("Alice").len(), 2);
    }

    #[test]
    fn test_enroll_trims_and_rejects_blank_name() {
        let gallery = Gallery::open(MemoryStore::new(), None).unwrap();
        assert!(matches!(
            gallery.enroll("   ", emb(&[1.0])),
            Err(GalleryError::InvalidName)
        ));
        let record = gallery.enroll("  Alice ", emb(&[1.0])).unwrap();
        assert_eq!(record.name, "Alice");
    }

    #[test]
    fn test_enroll_rejects_empty_embedding() {
        let gallery = Gallery::open(MemoryStore::new(), None).unwrap();
        assert!(matches!(
            gallery.enroll("Alice", emb(&[])),
            Err(GalleryError::EmptyEmbedding)
        ));
        assert!(gallery.is_empty());
    }

    #[test]
    fn test_enroll_rejects_non_finite_embedding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.json");

        let gallery = Gallery::open(JsonFileStore::new(&path), None).unwrap();
        gallery.enroll("Alice", emb(&[1.0, 0.0])).unwrap();
        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert!(matches!(
                gallery.enroll("Bob", emb(&[bad, 0.0])),
                Err(GalleryError::NonFiniteEmbedding)
            ));
        }
        assert_eq!(gallery.len(), 1);
        drop(gallery);

        let reopened = Gallery::open(JsonFileStore::new(&path), None).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.snapshot()[0].name, "Alice");
    }

    #[test]
    fn test_dimension_established_by_first_record() {
        let gallery = Gallery::open(MemoryStore::new(), None).unwrap();
        assert_eq!(gallery.dimension(), None);
        gallery.enroll("Alice", emb(&[1.0, 0.0, 0.0])).unwrap();
        assert_eq!(gallery.dimension(), Some(3));

        let err = gallery.enroll("Bob", emb(&[1.0, 0.0])).unwrap_err();
        assert!(matches!(
            err,
            GalleryError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(gallery.len(), 1);
    }

    #[test]
    fn test_expected_dimension_pins_length() {
        let gallery = Gallery::open(MemoryStore::new(), Some(4)).unwrap();
        assert!(gallery.enroll("Alice", emb(&[1.0, 0.0])).is_err());
        assert!(gallery.enroll("Alice", emb(&[1.0, 0.0, 0.0, 0.0])).is_ok());
    }

    #[test]
    fn test_snapshot_survives_later_writes() {
        let gallery = Gallery::open(MemoryStore::new(), None).unwrap();
        gallery.enroll("Alice", emb(&[1.0])).unwrap();
        let before = gallery.snapshot();

        gallery.enroll("Bob", emb(&[0.5])).unwrap();
        gallery.clear().unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(before[0].name, "Alice");
        assert!(gallery.is_empty());
    }

    #[test]
    fn test_readers_see_whole_snapshots_during_writes() {
        const WRITES: usize = 200;
        let gallery = Gallery::open(MemoryStore::new(), None).unwrap();
        let done = AtomicBool::new(false);
        let query = emb(&[1.0, 0.0]);

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let mut seen = 0;
                    while !done.load(Ordering::Acquire) {
                        let snapshot = gallery.snapshot();
                        assert!(snapshot.len() >= seen, "snapshot went backwards");
                        seen = snapshot.len();

                        // Every version is a prefix of the enrollment order.
                        for (i, record) in snapshot.iter().enumerate() {
                            assert_eq!(record.name, format!("person-{i}"));
                        }
                        let result = find_best_match(&query, &snapshot, 0.7).unwrap();
                        assert_eq!(result.accepted, !snapshot.is_empty());
                        if result.accepted {
                            assert_eq!(result.name.as_deref(), Some("person-0"));
                        }
                    }
                });
            }

            s.spawn(|| {
                for i in 0..WRITES {
                    gallery
                        .enroll(&format!("person-{i}"), emb(&[1.0, i as f32 * 1e-3]))
                        .unwrap();
                }
                done.store(true, Ordering::Release);
            });
        });

        assert_eq!(gallery.len(), WRITES);
    }

    #[test]
    fn test_remove_by_id() {
        let gallery = Gallery::open(MemoryStore::new(), None).unwrap();
        let alice = gallery.enroll("Alice", emb(&[1.0])).unwrap();
        let bob = gallery.enroll("Bob", emb(&[0.5])).unwrap();

        assert!(gallery.remove(&alice.id).unwrap());
        assert!(!gallery.remove(&alice.id).unwrap());
        assert_eq!(gallery.snapshot().to_vec(), vec![bob]);
    }

    #[test]
    fn test_clear_counts_removed() {
        let gallery = Gallery::open(MemoryStore::new(), None).unwrap();
        gallery.enroll("Alice", emb(&[1.0])).unwrap();
        gallery.enroll("Alice", emb(&[0.9])).unwrap();
        assert_eq!(gallery.clear().unwrap(), 2);
        assert_eq!(gallery.clear().unwrap(), 0);
    }

    #[test]
    fn test_changes_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.json");

        let gallery = Gallery::open(JsonFileStore::new(&path), None).unwrap();
        let alice = gallery.enroll("Alice", emb(&[1.0, 0.0])).unwrap();
        gallery.enroll("Bob", emb(&[0.0, 1.0])).unwrap();
        drop(gallery);

        let reopened = Gallery::open(JsonFileStore::new(&path), None).unwrap();
        let snapshot = reopened.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0], alice);
        assert_eq!(reopened.dimension(), Some(2));
    }
}
