//! Cosine-similarity matching of a query embedding against a gallery.
//!
//! Mismatched dimensions and non-finite components are always an explicit
//! error from [`similarity`]. [`CosineMatcher`] decides whether such a record
//! aborts the scan ([`MismatchPolicy::Strict`]) or is skipped and counted
//! ([`MismatchPolicy::Skip`]).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Embedding, EnrollmentRecord, MatchResult};

/// Recommended acceptance threshold for cosine similarity.
pub const DEFAULT_THRESHOLD: f32 = 0.7;

/// Score reported when no record was compared. Below any valid similarity.
pub const NO_MATCH_SCORE: f32 = f32::NEG_INFINITY;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        /// Gallery record that failed the comparison, when known.
        record_id: Option<String>,
    },
    #[error("embedding contains a NaN or infinite value")]
    NonFiniteValue {
        /// Gallery record holding the value; `None` for the query.
        record_id: Option<String>,
    },
    #[error("threshold {0} is outside [-1, 1]")]
    InvalidThreshold(f32),
}

/// Compute cosine similarity `dot(a, b) / (|a| * |b|)`.
///
/// Returns a value in [-1, 1] (up to rounding). A zero-magnitude vector on
/// either side yields `0.0`. Sums are accumulated in `f64`, where the square
/// of any finite `f32` is representable, so very large or very small
/// components neither overflow nor underflow. Any NaN or infinite component
/// is [`MatchError::NonFiniteValue`].
pub fn similarity(a: &[f32], b: &[f32]) -> Result<f32, MatchError> {
    if a.len() != b.len() {
        return Err(MatchError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
            record_id: None,
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    let mut finite = true;

    for (&x, &y) in a.iter().zip(b.iter()) {
        finite &= x.is_finite() && y.is_finite();
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if !finite {
        return Err(MatchError::NonFiniteValue { record_id: None });
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0.0 {
        Ok((dot / denom) as f32)
    } else {
        Ok(0.0)
    }
}

/// What to do with a gallery record that cannot be compared with the query:
/// a different length, or a NaN or infinite component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Abort the whole scan with an error naming the record.
    #[default]
    Strict,
    /// Ignore the record and count it in [`MatchResult::skipped`].
    Skip,
}

impl std::str::FromStr for MismatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown mismatch policy: {other} (expected strict or skip)")),
        }
    }
}

/// Strategy for comparing a query embedding against a gallery of enrolled faces.
pub trait Matcher {
    fn compare(
        &self,
        query: &Embedding,
        gallery: &[EnrollmentRecord],
        threshold: f32,
    ) -> Result<MatchResult, MatchError>;
}

/// Linear-scan cosine matcher.
///
/// The best score is tracked with a strict `>`, so on ties the record that
/// comes first in gallery order wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineMatcher {
    pub policy: MismatchPolicy,
}

impl CosineMatcher {
    pub fn new(policy: MismatchPolicy) -> Self {
        Self { policy }
    }
}

impl Matcher for CosineMatcher {
    fn compare(
        &self,
        query: &Embedding,
        gallery: &[EnrollmentRecord],
        threshold: f32,
    ) -> Result<MatchResult, MatchError> {
        if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
            return Err(MatchError::InvalidThreshold(threshold));
        }

        if query.values.iter().any(|v| !v.is_finite()) {
            return Err(MatchError::NonFiniteValue { record_id: None });
        }

        let mut best_sim = NO_MATCH_SCORE;
        let mut best_idx: Option<usize> = None;
        let mut skipped = 0usize;

        for (i, record) in gallery.iter().enumerate() {
            let sim = match query.similarity(&record.embedding) {
                Ok(sim) => sim,
                Err(MatchError::DimensionMismatch { expected, actual, .. }) => {
                    match self.policy {
                        MismatchPolicy::Strict => {
                            return Err(MatchError::DimensionMismatch {
                                expected,
                                actual,
                                record_id: Some(record.id.clone()),
                            });
                        }
                        MismatchPolicy::Skip => {
                            tracing::warn!(
                                record = %record.id,
                                expected,
                                actual,
                                "skipping gallery record with mismatched dimension"
                            );
                            skipped += 1;
                            continue;
                        }
                    }
                }
                // The query was checked above, so the bad value is in the record.
                Err(MatchError::NonFiniteValue { .. }) => match self.policy {
                    MismatchPolicy::Strict => {
                        return Err(MatchError::NonFiniteValue {
                            record_id: Some(record.id.clone()),
                        });
                    }
                    MismatchPolicy::Skip => {
                        tracing::warn!(
                            record = %record.id,
                            "skipping gallery record with non-finite values"
                        );
                        skipped += 1;
                        continue;
                    }
                },
                Err(e) => return Err(e),
            };

            if sim > best_sim {
                best_sim = sim;
                best_idx = Some(i);
            }
        }

        let result = match best_idx {
            Some(idx) if best_sim >= threshold => MatchResult {
                name: Some(gallery[idx].name.clone()),
                record_id: Some(gallery[idx].id.clone()),
                score: best_sim,
                accepted: true,
                skipped,
            },
            _ => MatchResult {
                score: best_sim,
                skipped,
                ..MatchResult::no_match()
            },
        };

        tracing::debug!(
            gallery = gallery.len(),
            skipped,
            score = result.score,
            accepted = result.accepted,
            "match complete"
        );

        Ok(result)
    }
}

/// Find the best match for `query` with the default (strict) mismatch policy.
pub fn find_best_match(
    query: &Embedding,
    gallery: &[EnrollmentRecord],
    threshold: f32,
) -> Result<MatchResult, MatchError> {
    CosineMatcher::default().compare(query, gallery, threshold)
}
