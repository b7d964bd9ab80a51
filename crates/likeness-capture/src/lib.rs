//! likeness-capture — Capability interfaces for the recognition pipeline.
//!
//! Camera capture, face localisation and embedding inference are provided by
//! the host platform. This crate defines the narrow traits the engine drives
//! them through, plus deterministic fakes behind the `fake` feature.

pub mod capability;
pub mod frame;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use capability::{CaptureError, EmbeddingGenerator, FaceLocator, ImageSource};
pub use frame::{FaceRegion, Frame};
