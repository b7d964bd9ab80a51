use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matcher::{self, MatchError, NO_MATCH_SCORE};

/// Face embedding vector (128 or 192 values for the models seen so far).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model that produced this embedding (e.g., "ghostfacenet_v1").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    /// Number of dimensions.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cosine similarity against another embedding of the same length.
    ///
    /// See [`matcher::similarity`].
    pub fn similarity(&self, other: &Embedding) -> Result<f32, MatchError> {
        matcher::similarity(&self.values, &other.values)
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// A named face enrolled in the gallery. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub id: String,
    pub name: String,
    pub embedding: Embedding,
    pub created_at: DateTime<Utc>,
}

impl EnrollmentRecord {
    /// Create a record with a fresh UUID and the current time.
    pub fn new(name: impl Into<String>, embedding: Embedding) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            embedding,
            created_at: Utc::now(),
        }
    }
}

/// Result of matching a query embedding against a gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Name of the accepted record, `None` when rejected.
    pub name: Option<String>,
    /// ID of the accepted record, `None` when rejected.
    pub record_id: Option<String>,
    /// Best cosine similarity found, even when rejected.
    /// [`NO_MATCH_SCORE`] when nothing was compared.
    pub score: f32,
    pub accepted: bool,
    /// Records ignored because their dimension differed from the query.
    pub skipped: usize,
}

impl MatchResult {
    /// The result for a gallery with nothing to compare against.
    pub fn no_match() -> Self {
        Self {
            name: None,
            record_id: None,
            score: NO_MATCH_SCORE,
            accepted: false,
            skipped: 0,
        }
    }

    /// Whether any record was actually compared.
    pub fn has_score(&self) -> bool {
        self.score.is_finite()
    }
}
