//! Application state with explicit transitions.

use std::sync::Arc;

use likeness_core::{Embedding, EnrollmentRecord, MatchResult};

use crate::gallery::{Gallery, GalleryError};

/// Everything the recognition front-end used to keep as loose UI variables:
/// the gallery, whether recognition is running, and the last result shown.
#[derive(Debug)]
pub struct AppState {
    gallery: Arc<Gallery>,
    recognition_active: bool,
    last_result: Option<MatchResult>,
}

impl AppState {
    pub fn new(gallery: Arc<Gallery>) -> Self {
        Self {
            gallery,
            recognition_active: false,
            last_result: None,
        }
    }

    pub fn gallery(&self) -> &Arc<Gallery> {
        &self.gallery
    }

    pub fn is_recognition_active(&self) -> bool {
        self.recognition_active
    }

    pub fn last_result(&self) -> Option<&MatchResult> {
        self.last_result.as_ref()
    }

    /// Flip recognition on or off. Returns the new setting.
    pub fn toggle_recognition(&mut self) -> bool {
        let active = !self.recognition_active;
        self.set_recognition(active);
        active
    }

    /// Turning recognition off drops the last result.
    pub fn set_recognition(&mut self, active: bool) {
        if self.recognition_active != active {
            tracing::info!(active, "recognition toggled");
        }
        self.recognition_active = active;
        if !active {
            self.last_result = None;
        }
    }

    pub fn enroll(
        &mut self,
        name: &str,
        embedding: Embedding,
    ) -> Result<EnrollmentRecord, GalleryError> {
        self.gallery.enroll(name, embedding)
    }

    pub fn remove(&mut self, id: &str) -> Result<bool, GalleryError> {
        let removed = self.gallery.remove(id)?;
        if removed
            && self
                .last_result
                .as_ref()
                .is_some_and(|r| r.record_id.as_deref() == Some(id))
        {
            self.last_result = None;
        }
        Ok(removed)
    }

    /// Remove every enrollment and the last result.
    pub fn clear(&mut self) -> Result<usize, GalleryError> {
        let removed = self.gallery.clear()?;
        self.last_result = None;
        Ok(removed)
    }

    /// Replace the last shown result (`None` when no face is in view).
    pub fn set_last_result(&mut self, result: Option<MatchResult>) {
        self.last_result = result;
    }
}
