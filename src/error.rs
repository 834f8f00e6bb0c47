use thiserror::Error;

/// Every failure that can stop a run.
///
/// Configuration problems are raised before the first population is built;
/// evaluation problems abort the run where they happen. Nothing is retried.
#[derive(Error, Debug)]
pub enum OptError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Evaluation of individual #{index} failed: {message}")]
    Evaluation { index: usize, message: String },

    #[error("Evaluation of individual #{index} took {elapsed:.3}s (deadline {limit:.3}s)")]
    EvaluationTimeout { index: usize, elapsed: f64, limit: f64 },

    #[error("Objective arity mismatch: expected {expected} values, got {got}")]
    ObjectiveArity { expected: usize, got: usize },

    #[error("Genotype length mismatch: expected {expected} bits, got {got}")]
    GenotypeLength { expected: usize, got: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl OptError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, OptError::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, OptError>;
