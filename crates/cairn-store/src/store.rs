//! Forecast store trait and journal types.
//!
//! The store is an append-only journal of predictions and settled actuals.
//! Nothing written through it is ever mutated or deleted; retention is
//! handled outside this crate.

use std::ops::RangeInclusive;

use cairn_core::{ActualObservation, ForecastRecord, SourceId, SourceScore, Variables, ZoneId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreResult;

/// Lazy sequence of predictions. Row-level decode failures are yielded as
/// `StoreError::CorruptRow` items so callers can skip them.
pub type Predictions<'a> = Box<dyn Iterator<Item = StoreResult<ForecastRecord>> + 'a>;

/// Counts reported by a batch append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    pub inserted: usize,
    /// Records whose key was already stored; left untouched
    pub duplicates: usize,
}

/// Journal entry describing one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records_inserted: usize,
    pub records_duplicate: usize,
    pub actuals_inserted: usize,
    pub failed_sources: Vec<SourceId>,
    pub zones_unavailable: usize,
}

/// A source's accuracy on one settled day, as reported by a run.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    pub observed_at: DateTime<Utc>,
    pub source_id: SourceId,
    pub zones: usize,
    /// Mean absolute error per variable in canonical units
    pub mean_abs_error: Variables,
    pub confidence_pct: f64,
    pub run_id: Uuid,
}

/// Ensemble weight a run gave a source for its target day.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightRecord {
    pub target_date: NaiveDate,
    pub source_id: SourceId,
    pub weight: f64,
    pub confidence_pct: f64,
    pub sample_count: u32,
    pub run_id: Uuid,
}

/// Append-only persistence for forecasts, actuals and derived scores.
pub trait ForecastStore {
    /// Append predictions. Re-appending an existing
    /// (source_id, zone_id, valid_at, issued_at) key is a no-op.
    ///
    /// # Errors
    /// Any error aborts the whole batch.
    fn append(&self, records: &[ForecastRecord]) -> StoreResult<AppendOutcome>;

    /// Append an actual observation, idempotent by (zone_id, observed_at).
    ///
    /// Returns whether a new row was written.
    fn append_actual(&self, obs: &ActualObservation) -> StoreResult<bool>;

    /// Predictions of one source for one zone whose `valid_at` falls in
    /// `valid_at`, ordered by `issued_at` ascending.
    fn query_predictions(
        &self,
        source_id: SourceId,
        zone_id: &ZoneId,
        valid_at: RangeInclusive<DateTime<Utc>>,
    ) -> StoreResult<Predictions<'_>>;

    /// # Errors
    /// Returns `StoreError::NotFound` if no observation exists for that instant.
    fn query_actual(
        &self,
        zone_id: &ZoneId,
        observed_at: DateTime<Utc>,
    ) -> StoreResult<ActualObservation>;

    /// All observations of a zone with `observed_at <= until`, oldest first.
    fn list_actuals(
        &self,
        zone_id: &ZoneId,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<ActualObservation>>;

    /// The latest-issued prediction of every source for a zone and instant.
    fn latest_predictions(
        &self,
        zone_id: &ZoneId,
        valid_at: DateTime<Utc>,
    ) -> StoreResult<Vec<ForecastRecord>>;

    /// Store freshly computed scores, superseding earlier values for the same
    /// (source, zone, class).
    fn save_scores(&self, scores: &[SourceScore]) -> StoreResult<()>;

    /// Current scores for a zone.
    fn load_scores(&self, zone_id: &ZoneId) -> StoreResult<Vec<SourceScore>>;

    fn record_run(&self, run: &RunRecord) -> StoreResult<()>;

    /// Append dated benchmark results, idempotent by (observed_at, source_id).
    /// The first evaluation of a day is kept.
    ///
    /// Returns how many new rows were written.
    fn record_evaluations(&self, rows: &[EvaluationRecord]) -> StoreResult<usize>;

    /// Append the weights of one run, keyed by (target_date, source_id, run_id).
    fn record_weights(&self, rows: &[WeightRecord]) -> StoreResult<()>;
}
