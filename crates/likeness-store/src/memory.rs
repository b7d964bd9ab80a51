use std::sync::Mutex;

use likeness_core::EnrollmentRecord;

use crate::{EnrollmentStore, StoreError};

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<EnrollmentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing gallery.
    pub fn with_records(records: Vec<EnrollmentRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl EnrollmentStore for MemoryStore {
    fn load(&self) -> Result<Vec<EnrollmentRecord>, StoreError> {
        self.records
            .lock()
            .map(|r| r.clone())
            .map_err(|_| StoreError::Poisoned)
    }

    fn save(&self, gallery: &[EnrollmentRecord]) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        *records = gallery.to_vec();
        Ok(())
    }
}
