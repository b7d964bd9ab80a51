//! likeness-engine — Enrollment and recognition on top of the matcher.
//!
//! Owns the gallery (published as immutable snapshots), the explicit
//! application state, and a dedicated engine thread that drives the capture
//! capabilities on behalf of async callers.

pub mod config;
pub mod engine;
pub mod gallery;
pub mod state;
pub mod throttle;

pub use config::{Config, ConfigError};
pub use engine::{spawn_engine, EngineError, EngineHandle, Recognition, StatusReport};
pub use gallery::{Gallery, GalleryError, Snapshot};
pub use state::AppState;
pub use throttle::EmbedThrottle;
