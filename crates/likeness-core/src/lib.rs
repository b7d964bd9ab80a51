//! likeness-core — Face embedding matching.
//!
//! Holds the data model shared by every other crate (embeddings, enrollment
//! records, match results) and the cosine-similarity matcher that picks the
//! best enrolled identity for a query embedding.

pub mod matcher;
pub mod types;

pub use matcher::{
    find_best_match, similarity, CosineMatcher, MatchError, Matcher, MismatchPolicy,
    DEFAULT_THRESHOLD, NO_MATCH_SCORE,
};
pub use types::{Embedding, EnrollmentRecord, MatchResult};
