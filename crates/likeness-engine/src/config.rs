use std::path::{Path, PathBuf};
use std::time::Duration;

use likeness_core::{CosineMatcher, MismatchPolicy, DEFAULT_THRESHOLD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("similarity threshold {0} is outside [-1, 1]")]
    InvalidThreshold(f32),
    #[error("minimum face size {0} must be a non-negative number")]
    InvalidMinFaceSize(f32),
    #[error("expected embedding dimension must be at least 1")]
    InvalidDimension,
}

/// Engine configuration: optional TOML file, then `LIKENESS_*` overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the JSON gallery file.
    pub store_path: PathBuf,
    /// Cosine similarity threshold for a positive match.
    pub similarity_threshold: f32,
    /// How the matcher treats records of a different dimension.
    pub mismatch_policy: MismatchPolicy,
    /// Faces with a side shorter than this (pixels) are not embedded.
    pub min_face_size: f32,
    /// Minimum time between two embedding runs during recognition.
    pub embed_interval_ms: u64,
    /// Required embedding length; otherwise taken from the gallery.
    pub expected_dimension: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            similarity_threshold: DEFAULT_THRESHOLD,
            mismatch_policy: MismatchPolicy::Strict,
            min_face_size: 100.0,
            embed_interval_ms: 500,
            expected_dimension: None,
        }
    }
}

impl Config {
    /// Defaults plus `LIKENESS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file, then apply `LIKENESS_*` environment variables.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Apply overrides from a key lookup. Unparseable values keep the current setting.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("LIKENESS_STORE_PATH") {
            self.store_path = PathBuf::from(path);
        }
        override_parsed(&lookup, "LIKENESS_SIMILARITY_THRESHOLD", &mut self.similarity_threshold);
        override_parsed(&lookup, "LIKENESS_MISMATCH_POLICY", &mut self.mismatch_policy);
        override_parsed(&lookup, "LIKENESS_MIN_FACE_SIZE", &mut self.min_face_size);
        override_parsed(&lookup, "LIKENESS_EMBED_INTERVAL_MS", &mut self.embed_interval_ms);
        if let Some(v) = lookup("LIKENESS_EXPECTED_DIMENSION") {
            match v.trim().parse() {
                Ok(dim) => self.expected_dimension = Some(dim),
                Err(_) => tracing::warn!(value = %v, "ignoring LIKENESS_EXPECTED_DIMENSION"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.similarity_threshold;
        if !t.is_finite() || !(-1.0..=1.0).contains(&t) {
            return Err(ConfigError::InvalidThreshold(t));
        }
        if !self.min_face_size.is_finite() || self.min_face_size < 0.0 {
            return Err(ConfigError::InvalidMinFaceSize(self.min_face_size));
        }
        if self.expected_dimension == Some(0) {
            return Err(ConfigError::InvalidDimension);
        }
        Ok(())
    }

    pub fn embed_interval(&self) -> Duration {
        Duration::from_millis(self.embed_interval_ms)
    }

    pub fn matcher(&self) -> CosineMatcher {
        CosineMatcher::new(self.mismatch_policy)
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    if let Some(v) = lookup(key) {
        match v.trim().parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => tracing::warn!(key, value = %v, "ignoring unparseable override"),
        }
    }
}

/// `$XDG_DATA_HOME/likeness/gallery.json`, falling back to `~/.local/share`.
fn default_store_path() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("likeness")
        .join("gallery.json")
}
