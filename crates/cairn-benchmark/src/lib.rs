//! Source benchmarking for Cairn
//!
//! Compares each source's last pre-event prediction with settled actuals,
//! keeps an exponentially weighted rolling error per (source, zone,
//! variable class) and maps it to a confidence percentage used for ranking
//! and ensemble weighting.

pub mod engine;
pub mod error;
pub mod error_model;
pub mod evaluation;
pub mod ground_truth;
pub mod ranking;
pub mod rolling;

pub use engine::{BenchmarkEngine, MatchSet, MatchedPair, RecomputeSummary};
pub use error::{BenchmarkError, BenchmarkResult, PairError};
pub use error_model::ErrorModel;
pub use evaluation::{evaluate_latest, LatestBenchmark, SourceEvaluation};
pub use ground_truth::actuals_from_source;
pub use ranking::{best, ensemble_weights, rank, standing, standings, Standing};
pub use rolling::{confidence_from_error, ScoringRules};
