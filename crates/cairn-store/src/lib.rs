//! Append-only forecast journal for Cairn
//!
//! Stores normalized predictions, settled actuals, derived source scores and
//! run summaries in SQLite.

pub mod error;
pub mod sqlite;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use sqlite::SqliteForecastStore;
pub use store::{
    AppendOutcome, EvaluationRecord, ForecastStore, Predictions, RunRecord, WeightRecord,
};
