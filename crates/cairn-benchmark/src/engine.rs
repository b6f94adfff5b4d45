//! Score recomputation over the stored forecast history.
//!
//! Scores are a pure function of the journal: every pass rebuilds them from
//! the full matched-pair history, so re-running without new data yields the
//! same values.

use std::collections::BTreeMap;

use cairn_core::{
    ActualObservation, BenchmarkConfig, ForecastRecord, GroundTruth, SourceId, SourceScore,
    VariableClass, ZoneId,
};
use cairn_store::{ForecastStore, StoreResult};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{BenchmarkResult, PairError};
use crate::error_model::ErrorModel;
use crate::rolling::ScoringRules;

/// A settled observation and the last prediction issued before it.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    pub prediction: ForecastRecord,
    pub actual: ActualObservation,
}

/// Matched pairs of one (source, zone), oldest observation first.
#[derive(Debug, Default)]
pub struct MatchSet {
    pub pairs: Vec<MatchedPair>,
    /// Stored rows that could not be decoded
    pub corrupt_rows: usize,
}

/// Counts and scores produced by a recomputation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecomputeSummary {
    pub scores: Vec<SourceScore>,
    pub pairs_scored: usize,
    pub pairs_skipped: usize,
}

impl RecomputeSummary {
    fn merge(&mut self, other: RecomputeSummary) {
        self.scores.extend(other.scores);
        self.pairs_scored += other.pairs_scored;
        self.pairs_skipped += other.pairs_skipped;
    }
}

pub struct BenchmarkEngine {
    rules: ScoringRules,
    model: ErrorModel,
    ground_truth: GroundTruth,
}

impl BenchmarkEngine {
    /// # Errors
    /// Returns `BenchmarkError::InvalidConfig` for unusable weighting settings.
    pub fn new(config: &BenchmarkConfig) -> BenchmarkResult<Self> {
        Ok(Self {
            rules: ScoringRules::from_config(config)?,
            model: ErrorModel::new(config.scales.clone()),
            ground_truth: config.ground_truth,
        })
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    pub fn model(&self) -> &ErrorModel {
        &self.model
    }

    /// Sources that are scored; a ground-truth source never scores itself.
    pub fn benchmarked_sources(&self, sources: &[SourceId]) -> Vec<SourceId> {
        sources
            .iter()
            .copied()
            .filter(|s| !matches!(self.ground_truth, GroundTruth::Source { source } if source == *s))
            .collect()
    }

    /// Pair each settled observation of `zone_id` with the most recently
    /// issued prediction of `source_id` made strictly before it.
    ///
    /// Observations without such a prediction are left out; they are not
    /// scoring misses.
    ///
    /// # Errors
    /// Only fatal store errors; undecodable rows are counted and skipped.
    pub fn matched_pairs<S: ForecastStore + ?Sized>(
        &self,
        store: &S,
        source_id: SourceId,
        zone_id: &ZoneId,
        now: DateTime<Utc>,
    ) -> StoreResult<MatchSet> {
        let actuals: Vec<ActualObservation> = store
            .list_actuals(zone_id, now)?
            .into_iter()
            .filter(|a| a.is_settled(now))
            .collect();
        let (Some(first), Some(last)) = (actuals.first(), actuals.last()) else {
            return Ok(MatchSet::default());
        };

        let mut latest: BTreeMap<DateTime<Utc>, ForecastRecord> = BTreeMap::new();
        let mut corrupt_rows = 0;
        for item in store.query_predictions(source_id, zone_id, first.observed_at..=last.observed_at)? {
            match item {
                // issued_at ascending: later inserts are later issues
                Ok(record) if record.is_ex_ante() => {
                    latest.insert(record.valid_at, record);
                }
                Ok(_) => {}
                Err(e) if !e.is_fatal() => {
                    warn!("Skipping stored {} prediction for {}: {}", source_id, zone_id, e);
                    corrupt_rows += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let pairs = actuals
            .into_iter()
            .filter_map(|actual| {
                latest
                    .remove(&actual.observed_at)
                    .map(|prediction| MatchedPair { prediction, actual })
            })
            .collect();

        Ok(MatchSet {
            pairs,
            corrupt_rows,
        })
    }

    /// Per-class errors of a pair; any malformed value rejects the whole pair.
    pub fn pair_errors(
        &self,
        pair: &MatchedPair,
    ) -> Result<Vec<(VariableClass, f64)>, PairError> {
        let mut errors = Vec::new();
        for class in VariableClass::ALL {
            if let Some(err) =
                self.model
                    .class_error(class, &pair.prediction.variables, &pair.actual.variables)?
            {
                errors.push((class, err));
            }
        }
        Ok(errors)
    }

    /// Fold pairs, in order, into one score per variable class.
    pub fn fold_pairs(
        &self,
        source_id: SourceId,
        zone_id: &ZoneId,
        pairs: &[MatchedPair],
    ) -> RecomputeSummary {
        let mut by_class: BTreeMap<VariableClass, SourceScore> = BTreeMap::new();
        let mut summary = RecomputeSummary::default();

        for pair in pairs {
            let errors = match self.pair_errors(pair) {
                Ok(errors) => errors,
                Err(e) => {
                    warn!(
                        "Skipping malformed {} pair for {} at {}: {}",
                        source_id, zone_id, pair.actual.observed_at, e
                    );
                    summary.pairs_skipped += 1;
                    continue;
                }
            };
            if errors.is_empty() {
                continue;
            }

            for (class, error) in errors {
                match by_class.get_mut(&class) {
                    Some(score) => self.rules.absorb(score, error),
                    None => {
                        let score = self.rules.seed(source_id, zone_id.clone(), class, error);
                        by_class.insert(class, score);
                    }
                }
            }
            summary.pairs_scored += 1;
        }

        summary.scores = by_class.into_values().collect();
        summary
    }

    /// Rebuild the scores of every benchmarked source for one zone.
    ///
    /// # Errors
    /// Fatal store errors abort the zone.
    pub fn score_zone<S: ForecastStore + ?Sized>(
        &self,
        store: &S,
        sources: &[SourceId],
        zone_id: &ZoneId,
        now: DateTime<Utc>,
    ) -> BenchmarkResult<RecomputeSummary> {
        let mut summary = RecomputeSummary::default();
        for source_id in self.benchmarked_sources(sources) {
            let matched = self.matched_pairs(store, source_id, zone_id, now)?;
            let mut folded = self.fold_pairs(source_id, zone_id, &matched.pairs);
            folded.pairs_skipped += matched.corrupt_rows;
            debug!(
                "{} / {}: {} pairs scored, {} skipped",
                source_id, zone_id, folded.pairs_scored, folded.pairs_skipped
            );
            summary.merge(folded);
        }
        Ok(summary)
    }

    /// Recompute and persist scores for all zones.
    ///
    /// Sources that produced nothing this run keep their previous scores:
    /// they are rebuilt from history like every other source.
    ///
    /// # Errors
    /// Any store failure is fatal and returned to the caller.
    pub fn recompute<S: ForecastStore + ?Sized>(
        &self,
        store: &S,
        sources: &[SourceId],
        zones: &[ZoneId],
        now: DateTime<Utc>,
    ) -> BenchmarkResult<RecomputeSummary> {
        let mut summary = RecomputeSummary::default();
        for zone_id in zones {
            let zone_summary = self.score_zone(store, sources, zone_id, now)?;
            store.save_scores(&zone_summary.scores)?;
            summary.merge(zone_summary);
        }

        info!(
            "Benchmark recomputed: {} scores from {} pairs ({} skipped)",
            summary.scores.len(),
            summary.pairs_scored,
            summary.pairs_skipped
        );
        Ok(summary)
    }
}
