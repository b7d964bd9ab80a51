//! Traits for the host-provided camera, face detector and embedding model.

use crate::frame::{FaceRegion, Frame};
use likeness_core::Embedding;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("image source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("face localisation failed: {0}")]
    LocatorFailed(String),
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
}

/// Produces frames (a camera, a photo file, a video stream).
pub trait ImageSource: Send {
    fn capture(&mut self) -> Result<Frame, CaptureError>;
}

/// Finds faces in a frame. Cheap enough to run on every frame.
pub trait FaceLocator: Send {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, CaptureError>;
}

/// Runs the embedding model on one face of a frame.
///
/// Expensive; callers rate-limit it. Failures must surface as
/// [`CaptureError::EmbeddingUnavailable`] before any matching happens.
pub trait EmbeddingGenerator: Send {
    fn embed(&mut self, frame: &Frame, face: &FaceRegion) -> Result<Embedding, CaptureError>;

    /// Length of every embedding this generator produces.
    fn dimension(&self) -> usize;
}

impl<T: ImageSource + ?Sized> ImageSource for Box<T> {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        (**self).capture()
    }
}

impl<T: FaceLocator + ?Sized> FaceLocator for Box<T> {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, CaptureError> {
        (**self).locate(frame)
    }
}

impl<T: EmbeddingGenerator + ?Sized> EmbeddingGenerator for Box<T> {
    fn embed(&mut self, frame: &Frame, face: &FaceRegion) -> Result<Embedding, CaptureError> {
        (**self).embed(frame, face)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }
}
