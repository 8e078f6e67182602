use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Unknown column '{name}'")]
    UnknownColumn { name: String },

    #[error("Reproducibility violation: expected {expected} rng draws, observed {observed}")]
    ReproducibilityViolation { expected: u64, observed: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SimResult<T> = Result<T, SimError>;
