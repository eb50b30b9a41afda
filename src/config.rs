//! Configuration for the index and the `napp` binary.
//!
//! Values come from (lowest to highest precedence) built-in defaults, an
//! optional TOML file, and `NAPP_*` environment variables. Index and query
//! parameters can also be written as `key=value,key=value` strings; keys are
//! accepted in either `snake_case` or `camelCase` (`numPivot`, `dbScanFrac`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NappError, Result};

/// Upper bound on build worker threads.
pub const MAX_INDEX_THREADS: usize = 1024;

/// Candidate-generation strategy used at query time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchAlgorithm {
    Merge,
    #[default]
    Scan,
    #[serde(alias = "prior_queue", alias = "priorqueue")]
    PriorityQueue,
    #[serde(alias = "storesort")]
    StoreSort,
}

impl SearchAlgorithm {
    pub const ALL: [SearchAlgorithm; 4] = [
        SearchAlgorithm::Merge,
        SearchAlgorithm::Scan,
        SearchAlgorithm::PriorityQueue,
        SearchAlgorithm::StoreSort,
    ];
}

impl std::fmt::Display for SearchAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchAlgorithm::Merge => write!(f, "merge"),
            SearchAlgorithm::Scan => write!(f, "scan"),
            SearchAlgorithm::PriorityQueue => write!(f, "priority_queue"),
            SearchAlgorithm::StoreSort => write!(f, "store_sort"),
        }
    }
}

impl std::str::FromStr for SearchAlgorithm {
    type Err = NappError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "merge" => Ok(SearchAlgorithm::Merge),
            "scan" => Ok(SearchAlgorithm::Scan),
            "priorityqueue" | "priorqueue" => Ok(SearchAlgorithm::PriorityQueue),
            "storesort" => Ok(SearchAlgorithm::StoreSort),
            _ => Err(NappError::invalid(
                "algorithm",
                format!("'{s}' is not one of merge, scan, priority_queue, store_sort"),
            )),
        }
    }
}

/// Knobs that may change between queries without touching posting lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    /// Signature prefix length at query time; `None` reuses the build prefix.
    pub num_prefix_search: Option<usize>,
    /// Minimum number of shared combinations for an object to be a candidate.
    pub min_times: usize,
    /// Amplification of the posting-entries budget.
    pub knn_amp: usize,
    /// Fraction of all posting entries a query may consume.
    pub db_scan_frac: f32,
    pub algorithm: SearchAlgorithm,
    /// Treat every encountered id as a candidate, ignoring `min_times`.
    pub skip_checking: bool,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            num_prefix_search: None,
            min_times: 2,
            knn_amp: 1,
            db_scan_frac: 1.0,
            algorithm: SearchAlgorithm::default(),
            skip_checking: false,
        }
    }
}

impl QueryParams {
    /// Parse a `key=value,...` string on top of the defaults.
    pub fn parse(s: &str) -> Result<Self> {
        let mut params = Self::default();
        params.apply_str(s)?;
        Ok(params)
    }

    /// Apply every `key=value` pair of `s`. Unknown keys are an error.
    pub fn apply_str(&mut self, s: &str) -> Result<()> {
        for (key, value) in split_pairs(s)? {
            if !self.apply_pair(&key, value)? {
                return Err(NappError::UnknownParam(key));
            }
        }
        Ok(())
    }

    /// Returns `Ok(false)` when `key` is not a query-time parameter.
    pub(crate) fn apply_pair(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "num_prefix_search" => self.num_prefix_search = Some(parse_value(key, value)?),
            "min_times" => self.min_times = parse_value(key, value)?,
            "knn_amp" => self.knn_amp = parse_value(key, value)?,
            "db_scan_frac" => self.db_scan_frac = parse_value(key, value)?,
            "algorithm" | "inv_proc_alg" => self.algorithm = value.parse()?,
            "skip_checking" => self.skip_checking = parse_bool(key, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Check the parameters against the shape of a built index.
    pub fn validate(&self, num_pivot: usize, pivot_comb_qty: usize) -> Result<()> {
        if self.min_times == 0 {
            return Err(NappError::invalid("min_times", "must be at least 1"));
        }
        if self.knn_amp == 0 {
            return Err(NappError::invalid("knn_amp", "must be at least 1"));
        }
        if !(self.db_scan_frac.is_finite() && self.db_scan_frac > 0.0) {
            return Err(NappError::invalid(
                "db_scan_frac",
                format!("must be a positive number, got {}", self.db_scan_frac),
            ));
        }
        if let Some(prefix) = self.num_prefix_search {
            check_prefix("num_prefix_search", prefix, num_pivot, pivot_comb_qty)?;
        }
        Ok(())
    }
}

/// Build-time parameters. Query-time knobs live in `query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexParams {
    pub num_pivot: usize,
    /// Optional file with one pivot per line, parsed by the space.
    pub pivot_file: Option<String>,
    /// Signature prefix length at build time.
    pub num_prefix: usize,
    pub index_thread_qty: usize,
    /// Dimensionality of the hashed projection used by fast pivot indexes; 0 disables hashing.
    pub hash_trick_dim: usize,
    /// Arity of pivot combinations: 1, 2 or 3.
    pub pivot_comb_qty: usize,
    /// Always compute pivot distances by brute force.
    pub disable_pivot_index: bool,
    /// 0 = silent, 1 = posting-list statistics, 2 = also per-pivot usage.
    pub print_pivot_stat: u32,
    /// Documents a worker accumulates before flushing its temporary lists.
    pub flush_doc_qty: usize,
    /// Guard all posting lists with one lock instead of one lock per list.
    pub single_mutex_flush: bool,
    /// Seed for pivot sampling.
    pub pivot_seed: u64,
    /// When non-zero, each pivot is synthesized from this many sampled objects.
    pub gen_pivot_qty: usize,
    pub query: QueryParams,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            num_pivot: 512,
            pivot_file: None,
            num_prefix: 32,
            index_thread_qty: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            hash_trick_dim: 0,
            pivot_comb_qty: 2,
            disable_pivot_index: false,
            print_pivot_stat: 0,
            flush_doc_qty: 8192,
            single_mutex_flush: false,
            pivot_seed: 0,
            gen_pivot_qty: 0,
            query: QueryParams::default(),
        }
    }
}

impl IndexParams {
    /// Parse a `key=value,...` string on top of the defaults. Query-time keys
    /// are routed into `query`.
    pub fn parse(s: &str) -> Result<Self> {
        let mut params = Self::default();
        params.apply_str(s)?;
        Ok(params)
    }

    pub fn apply_str(&mut self, s: &str) -> Result<()> {
        for (key, value) in split_pairs(s)? {
            if !self.apply_pair(&key, value)? {
                return Err(NappError::UnknownParam(key));
            }
        }
        Ok(())
    }

    fn apply_pair(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "num_pivot" => self.num_pivot = parse_value(key, value)?,
            "pivot_file" => {
                self.pivot_file = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "num_prefix" => self.num_prefix = parse_value(key, value)?,
            "index_thread_qty" => self.index_thread_qty = parse_value(key, value)?,
            "hash_trick_dim" => self.hash_trick_dim = parse_value(key, value)?,
            "pivot_comb_qty" => self.pivot_comb_qty = parse_value(key, value)?,
            "disable_pivot_index" => self.disable_pivot_index = parse_bool(key, value)?,
            "print_pivot_stat" => self.print_pivot_stat = parse_value(key, value)?,
            "flush_doc_qty" => self.flush_doc_qty = parse_value(key, value)?,
            "single_mutex_flush" => self.single_mutex_flush = parse_bool(key, value)?,
            "pivot_seed" => self.pivot_seed = parse_value(key, value)?,
            "gen_pivot_qty" => self.gen_pivot_qty = parse_value(key, value)?,
            _ => return self.query.apply_pair(key, value),
        }
        Ok(true)
    }

    /// Checks that do not depend on the dataset.
    pub fn validate(&self) -> Result<()> {
        if !(1..=3).contains(&self.pivot_comb_qty) {
            return Err(NappError::invalid(
                "pivot_comb_qty",
                format!(
                    "illegal number of pivots in the combinations {}, must be >0 and <=3",
                    self.pivot_comb_qty
                ),
            ));
        }
        if self.num_pivot < self.pivot_comb_qty {
            return Err(NappError::invalid(
                "num_pivot",
                format!(
                    "{} pivots cannot form combinations of {}",
                    self.num_pivot, self.pivot_comb_qty
                ),
            ));
        }
        check_prefix("num_prefix", self.num_prefix, self.num_pivot, self.pivot_comb_qty)?;
        if self.index_thread_qty == 0 || self.index_thread_qty > MAX_INDEX_THREADS {
            return Err(NappError::invalid(
                "index_thread_qty",
                format!("must be in 1..={MAX_INDEX_THREADS}, got {}", self.index_thread_qty),
            ));
        }
        if self.flush_doc_qty == 0 {
            return Err(NappError::invalid("flush_doc_qty", "must be at least 1"));
        }
        self.query.validate(self.num_pivot, self.pivot_comb_qty)
    }

    /// Prefix length used by queries.
    pub fn effective_prefix_search(&self) -> usize {
        self.query.num_prefix_search.unwrap_or(self.num_prefix)
    }
}

fn check_prefix(name: &str, prefix: usize, num_pivot: usize, pivot_comb_qty: usize) -> Result<()> {
    if prefix > num_pivot {
        return Err(NappError::invalid(
            name,
            format!("{prefix} exceeds the number of pivots {num_pivot}"),
        ));
    }
    if prefix < pivot_comb_qty {
        return Err(NappError::invalid(
            name,
            format!("{prefix} is smaller than pivot_comb_qty {pivot_comb_qty}"),
        ));
    }
    Ok(())
}

/// Split `a=1, bB=2` into normalized `(snake_key, value)` pairs.
fn split_pairs(s: &str) -> Result<Vec<(String, &str)>> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (key, value) = item
                .split_once('=')
                .ok_or_else(|| NappError::Parse(format!("expected key=value, got '{item}'")))?;
            Ok((normalize_key(key.trim()), value.trim()))
        })
        .collect()
}

fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| NappError::invalid(key, format!("cannot parse '{value}'")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(NappError::invalid(key, format!("cannot parse '{value}' as bool"))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Top-level configuration of the `napp` binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub index: IndexParams,
}

impl Config {
    /// Load configuration from `path`, or from `NAPP_CONFIG` when `path` is
    /// `None`, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var("NAPP_CONFIG").ok();
        let path = path.map(Path::to_path_buf).or_else(|| from_env.map(Into::into));

        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(&p).map_err(|e| {
                    NappError::Config(format!("cannot read {}: {e}", p.display()))
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        config.index.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(level) = std::env::var("NAPP_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("NAPP_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(params) = std::env::var("NAPP_INDEX_PARAMS") {
            self.index.apply_str(&params)?;
        }
        if let Ok(params) = std::env::var("NAPP_QUERY_PARAMS") {
            self.index.query.apply_str(&params)?;
        }
        Ok(())
    }
}
