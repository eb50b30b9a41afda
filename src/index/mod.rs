//! The pivot-neighborhood index and its building blocks.
//!
//! Bottom-up: `combination` maps pivot subsets to dense ids, `pivots` and
//! `pivot_index` produce distances to the pivot set, `posting` and `builder`
//! construct the inverted lists, `candidates` turns a query signature into
//! candidate ids, and `napp` ties everything together.

pub mod builder;
pub mod candidates;
pub mod combination;
pub mod napp;
pub mod persistence;
pub mod pivot_index;
pub mod pivots;
pub mod posting;
pub mod stats;
pub mod traits;

pub use combination::{binomial, CombinationSpace};
pub use napp::NappIndex;
pub use pivots::PivotSource;
pub use traits::AnnIndex;
