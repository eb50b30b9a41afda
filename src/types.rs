use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Position of an object in the indexed dataset.
pub type IdType = u32;

/// Dense identifier of an unordered pivot combination.
pub type CombId = u32;

/// Distance metric for dense vector comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Cosine,
    #[default]
    Euclidean,
    DotProduct,
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Euclidean => write!(f, "euclidean"),
            DistanceMetric::DotProduct => write!(f, "dot_product"),
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = crate::error::NappError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" | "cosinesimil" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "dot_product" | "dot" | "negdotprod" => Ok(DistanceMetric::DotProduct),
            other => Err(crate::error::NappError::Parse(format!(
                "unknown distance metric '{other}'"
            ))),
        }
    }
}

/// A search result: dataset id and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: IdType,
    pub distance: f32,
}

impl Neighbor {
    pub fn new(id: IdType, distance: f32) -> Self {
        Self { id, distance }
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Distance first, id breaks ties so result order is reproducible.
impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}
