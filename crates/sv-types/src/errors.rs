use thiserror::Error;

/// Main error type for the Sieve system
#[derive(Error, Debug)]
pub enum SvError {
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(String),

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<arrow::error::ArrowError> for SvError {
    fn from(err: arrow::error::ArrowError) -> Self {
        SvError::Arrow(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for SvError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        SvError::Parquet(err.to_string())
    }
}

/// Errors raised by the search loop itself
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Invalid candidate: {message}")]
    InvalidCandidate { message: String },

    #[error("Unknown parameter: {name}")]
    UnknownParameter { name: String },

    #[error("Search already terminated after {n_evals} evaluations")]
    Terminated { n_evals: usize },

    #[error("Unsupported objective: {message}")]
    UnsupportedObjective { message: String },

    #[error("Unknown {registry} key: {key}")]
    UnknownKey { registry: String, key: String },

    #[error("Invalid search space: {message}")]
    InvalidSpace { message: String },
}

/// Errors surfaced by the external evaluation collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Evaluation failed: {message}")]
    Failed { message: String },

    #[error("Expected {expected} scores, got {actual}")]
    ScoreArity { expected: usize, actual: usize },

    #[error("Expected {expected} outcomes for the batch, got {actual}")]
    BatchArity { expected: usize, actual: usize },

    #[error("No feature importance reported for {features} features")]
    MissingImportance { features: usize },
}

impl EvaluationError {
    pub fn failed(message: impl Into<String>) -> Self {
        EvaluationError::Failed {
            message: message.into(),
        }
    }
}

/// Result type alias for Sieve operations
pub type SvResult<T> = Result<T, SvError>;

/// Helper trait for converting string errors
pub trait IntoSvError {
    fn into_sv_error(self) -> SvError;
}

impl IntoSvError for String {
    fn into_sv_error(self) -> SvError {
        SvError::Internal(self)
    }
}

impl IntoSvError for &str {
    fn into_sv_error(self) -> SvError {
        SvError::Internal(self.to_string())
    }
}

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::SvError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::SvError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::SvError::Config(format!($($arg)*))
    };
}
