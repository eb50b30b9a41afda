//! napp: pivot-neighborhood inverted index for approximate nearest-neighbor
//! search in generic distance spaces.

pub mod config;
pub mod error;
pub mod index;
pub mod metrics;
pub mod pool;
pub mod query;
pub mod space;
pub mod types;
