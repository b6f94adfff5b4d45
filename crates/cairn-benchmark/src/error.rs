//! Benchmark error types.

use cairn_core::Variable;
use cairn_store::StoreError;
use thiserror::Error;

/// Errors that abort a benchmark pass.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    /// The forecast store failed; fatal to the current run
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid benchmark settings: {0}")]
    InvalidConfig(String),
}

impl BenchmarkError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Store(e) => e.user_message().to_string(),
            Self::InvalidConfig(msg) => format!("Benchmark settings are invalid: {}", msg),
        }
    }
}

/// Why a (prediction, actual) pair could not be scored.
///
/// Never fatal: the pair is logged and skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PairError {
    #[error("{variable} is not a finite number ({value})")]
    NonFinite { variable: Variable, value: f64 },

    #[error("{variable} has no category for code {value}")]
    UnknownCategory { variable: Variable, value: f64 },
}

pub type BenchmarkResult<T> = Result<T, BenchmarkError>;
