//! likeness-store — Persistence for the enrollment gallery.
//!
//! A store loads and saves the whole ordered gallery at once. Loading a store
//! that has never been written yields an empty gallery.

mod json;
mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use likeness_core::EnrollmentRecord;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed gallery file {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported gallery format version {0}")]
    UnsupportedVersion(u32),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Durable home of the enrollment gallery.
pub trait EnrollmentStore: Send + Sync {
    /// Load the full ordered gallery, or an empty one if nothing was saved.
    fn load(&self) -> Result<Vec<EnrollmentRecord>, StoreError>;

    /// Replace the stored gallery with `gallery`, atomically.
    fn save(&self, gallery: &[EnrollmentRecord]) -> Result<(), StoreError>;
}

impl<T: EnrollmentStore + ?Sized> EnrollmentStore for Box<T> {
    fn load(&self) -> Result<Vec<EnrollmentRecord>, StoreError> {
        (**self).load()
    }

    fn save(&self, gallery: &[EnrollmentRecord]) -> Result<(), StoreError> {
        (**self).save(gallery)
    }
}
