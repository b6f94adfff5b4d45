//! Errors that abort a briefing run.

use cairn_benchmark::BenchmarkError;
use cairn_core::ConfigError;
use cairn_sources::SourceError;
use cairn_store::StoreError;
use thiserror::Error;

/// Top-level run error.
///
/// Adapter failures never reach this type on their own; they are contained
/// per source. Only setup failures and store failures abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source setup error: {0}")]
    Sources(#[from] SourceError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Benchmark error: {0}")]
    Benchmark(BenchmarkError),
}

impl From<BenchmarkError> for RunError {
    fn from(err: BenchmarkError) -> Self {
        match err {
            BenchmarkError::Store(e) => RunError::Store(e),
            other => RunError::Benchmark(other),
        }
    }
}

impl RunError {
    /// Message suitable for the delivery layer.
    pub fn user_message(&self) -> String {
        match self {
            RunError::Config(e) => e.user_message().to_string(),
            RunError::Sources(e) => e.user_message(),
            RunError::Store(e) => e.user_message().to_string(),
            RunError::Benchmark(e) => e.user_message(),
        }
    }

    /// Store failures leave no partial briefing behind.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, RunError::Store(_))
    }
}
