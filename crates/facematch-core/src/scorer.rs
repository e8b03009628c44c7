//! Similarity scoring between two feature vectors.
//!
//! Thresholds are calibrated against one metric's scale, so the metric is
//! fixed per deployment.

use crate::types::FeatureVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Similarity metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// `1 - min(‖a - b‖, 1)`.
    Euclidean,
    /// Cosine similarity clamped to [0, 1]; 0 when either vector is zero.
    #[default]
    Cosine,
}

impl Metric {
    /// Similarity in [0, 1], higher = more similar. Symmetric in its arguments.
    pub fn score(&self, a: &FeatureVector, b: &FeatureVector) -> f32 {
        debug_assert_eq!(a.extractor, b.extractor, "descriptors from different extractors");
        debug_assert_eq!(a.len(), b.len(), "descriptors of different lengths");

        let score = match self {
            Metric::Euclidean => 1.0 - a.euclidean_distance(b).clamp(0.0, 1.0),
            Metric::Cosine => a.similarity(b).clamp(0.0, 1.0),
        };
        if score.is_nan() { 0.0 } else { score }
    }

    /// Match threshold used when none is configured.
    pub fn default_threshold(&self) -> f32 {
        match self {
            Metric::Euclidean => 0.6,
            Metric::Cosine => 0.8,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Euclidean => f.write_str("euclidean"),
            Metric::Cosine => f.write_str("cosine"),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euclidean" | "distance" => Ok(Metric::Euclidean),
            "cosine" | "angle" => Ok(Metric::Cosine),
            other => Err(format!("unknown metric '{other}' (expected euclidean or cosine)")),
        }
    }
}
