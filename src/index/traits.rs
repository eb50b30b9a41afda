//! Common interface of the approximate search methods.
//!
//! Callers that only drive an index (the `napp` binary, benchmarks) go through
//! `AnnIndex` so that they do not depend on how candidates are produced.

use std::path::Path;

use crate::config::{IndexParams, QueryParams};
use crate::error::Result;
use crate::query::{KnnQuery, RangeQuery};
use crate::space::Space;

use super::napp::NappIndex;

/// Lifecycle and query surface of an index over objects of type `O`.
///
/// An index is built exactly once, by `create_index` or `load_index`, and is
/// read-only afterwards except for the query-time knobs.
pub trait AnnIndex<O> {
    /// Build the index over the dataset it was constructed with.
    ///
    /// # Errors
    /// Configuration errors leave the index unbuilt; so do consistency
    /// violations found while building.
    fn create_index(&mut self, params: &IndexParams) -> Result<()>;

    /// Change knobs that do not require a rebuild. Only valid once built.
    fn set_query_time_params(&mut self, params: &QueryParams) -> Result<()>;

    /// Feed the approximate k nearest neighbors into `query`.
    fn search_knn(&self, query: &mut KnnQuery<'_, O>) -> Result<()>;

    /// Feed the approximate neighbors within the query radius into `query`.
    fn search_range(&self, query: &mut RangeQuery<'_, O>) -> Result<()>;

    fn save_index(&self, path: &Path) -> Result<()>;

    fn load_index(&mut self, path: &Path) -> Result<()>;

    /// Human-readable description of the method and its parameters.
    fn str_desc(&self) -> String;

    fn data_len(&self) -> usize;
}

impl<S: Space> AnnIndex<S::Object> for NappIndex<'_, S> {
    fn create_index(&mut self, params: &IndexParams) -> Result<()> {
        NappIndex::create_index(self, params)
    }

    fn set_query_time_params(&mut self, params: &QueryParams) -> Result<()> {
        NappIndex::set_query_time_params(self, params)
    }

    fn search_knn(&self, query: &mut KnnQuery<'_, S::Object>) -> Result<()> {
        NappIndex::search_knn(self, query)
    }

    fn search_range(&self, query: &mut RangeQuery<'_, S::Object>) -> Result<()> {
        NappIndex::search_range(self, query)
    }

    fn save_index(&self, path: &Path) -> Result<()> {
        NappIndex::save_index(self, path)
    }

    fn load_index(&mut self, path: &Path) -> Result<()> {
        NappIndex::load_index(self, path)
    }

    fn str_desc(&self) -> String {
        NappIndex::str_desc(self)
    }

    fn data_len(&self) -> usize {
        NappIndex::data_len(self)
    }
}
