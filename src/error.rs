use thiserror::Error;

#[derive(Error, Debug)]
pub enum NappError {
    // Config errors
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("unknown parameter: {0}")]
    UnknownParam(String),

    // Index lifecycle errors
    #[error("index is not built")]
    IndexNotBuilt,

    #[error("index is already built")]
    IndexAlreadyBuilt,

    // Invariant violations detected while building or querying
    #[error("consistency violation: {0}")]
    Consistency(String),

    #[error("pivot id {pivot_id} out of range (num_pivot = {num_pivot})")]
    PivotOutOfRange { pivot_id: u32, num_pivot: usize },

    #[error("combination id {comb_id} exceeds bound {bound}")]
    CombinationOutOfRange { comb_id: u64, bound: u64 },

    // Validation errors
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("parse error: {0}")]
    Parse(String),

    // Serialization errors
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bincode serialization error: {0}")]
    Bincode(String),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    // Persistence errors
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: u64, actual: u64 },

    #[error("unsupported index format: {0}")]
    Format(String),

    // IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // Internal
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<Box<bincode::ErrorKind>> for NappError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        NappError::Bincode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NappError>;

impl NappError {
    /// Build an `InvalidParam` error.
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        NappError::InvalidParam {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's parameters rather than the data
    /// or the environment.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            NappError::Config(_) | NappError::InvalidParam { .. } | NappError::UnknownParam(_)
        )
    }
}
