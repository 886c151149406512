//! Splits a decoded vector into its score and feature sub-vector.

use crate::error::ShapeError;

use super::types::{NumericVector, ScoredFeatureVector};

/// Minimum number of fields: one score plus at least one feature.
pub const MIN_FIELDS: usize = 2;

pub fn split(vector: NumericVector) -> Result<ScoredFeatureVector, ShapeError> {
    let len = vector.len();
    if len < MIN_FIELDS {
        return Err(ShapeError::TooShort { len });
    }

    let score = vector[0];
    let features: Box<[f64]> = vector[1..].into();
    tracing::debug!(score, features = ?features, "split feature vector");

    Ok(ScoredFeatureVector { score, features })
}
