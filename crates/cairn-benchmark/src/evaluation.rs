//! Accuracy of each source on the most recent settled day.

use std::collections::BTreeMap;

use cairn_core::{SourceId, Variable, ZoneId};
use cairn_store::{ForecastStore, StoreError};
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::engine::BenchmarkEngine;
use crate::error::BenchmarkResult;
use crate::ranking::standing;

/// One source's showing on the latest settled instant.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEvaluation {
    pub source_id: SourceId,
    /// Zones with both an observation and an ex-ante prediction
    pub zones: usize,
    /// Mean absolute error in canonical units; mismatch rate for categories
    pub mean_abs_error: BTreeMap<Variable, f64>,
    /// Mean zone confidence from the stored scores
    pub confidence_pct: f64,
}

impl SourceEvaluation {
    pub fn mae(&self, variable: Variable) -> Option<f64> {
        self.mean_abs_error.get(&variable).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatestBenchmark {
    pub observed_at: DateTime<Utc>,
    pub rows: Vec<SourceEvaluation>,
}

/// Most recent settled instant across `zones`.
fn latest_instant<S: ForecastStore + ?Sized>(
    store: &S,
    zones: &[ZoneId],
    now: DateTime<Utc>,
) -> BenchmarkResult<Option<DateTime<Utc>>> {
    let mut latest = None;
    for zone_id in zones {
        if let Some(obs) = store.list_actuals(zone_id, now)?.last() {
            latest = latest.max(Some(obs.observed_at));
        }
    }
    Ok(latest)
}

/// Evaluate every benchmarked source against the latest settled day.
///
/// Returns `None` before any observation has settled.
///
/// # Errors
/// Fatal store errors only.
pub fn evaluate_latest<S: ForecastStore + ?Sized>(
    store: &S,
    engine: &BenchmarkEngine,
    sources: &[SourceId],
    zones: &[ZoneId],
    now: DateTime<Utc>,
) -> BenchmarkResult<Option<LatestBenchmark>> {
    let Some(instant) = latest_instant(store, zones, now)? else {
        return Ok(None);
    };

    let mut actuals = Vec::new();
    for zone_id in zones {
        match store.query_actual(zone_id, instant) {
            Ok(obs) => actuals.push(obs),
            Err(StoreError::NotFound(_)) => {}
            Err(e) if !e.is_fatal() => warn!("Skipping actual for {}: {}", zone_id, e),
            Err(e) => return Err(e.into()),
        }
    }

    let mut scores_by_zone = BTreeMap::new();
    for zone_id in zones {
        scores_by_zone.insert(zone_id.clone(), store.load_scores(zone_id)?);
    }

    let neutral = engine.rules().neutral_confidence;
    let mut rows = Vec::new();
    for source_id in engine.benchmarked_sources(sources) {
        let mut sums: BTreeMap<Variable, (f64, u32)> = BTreeMap::new();
        let mut matched_zones = 0;

        for actual in &actuals {
            let mut chosen = None;
            for item in store.query_predictions(source_id, &actual.zone_id, instant..=instant)? {
                match item {
                    Ok(record) if record.is_ex_ante() => chosen = Some(record),
                    Ok(_) => {}
                    Err(e) if !e.is_fatal() => warn!("Skipping stored prediction: {}", e),
                    Err(e) => return Err(e.into()),
                }
            }
            let Some(prediction) = chosen else { continue };

            let mut any = false;
            for (variable, predicted) in &prediction.variables {
                let Some(observed) = actual.get(*variable) else { continue };
                let error = if variable.is_categorical() {
                    match engine.model().variable_error(*variable, *predicted, observed) {
                        Ok(e) => e,
                        Err(e) => {
                            warn!("Skipping {} for {}: {}", variable, source_id, e);
                            continue;
                        }
                    }
                } else if predicted.is_finite() && observed.is_finite() {
                    (predicted - observed).abs()
                } else {
                    continue;
                };
                let entry = sums.entry(*variable).or_insert((0.0, 0));
                entry.0 += error;
                entry.1 += 1;
                any = true;
            }
            if any {
                matched_zones += 1;
            }
        }

        if matched_zones == 0 {
            continue;
        }

        let confidences: Vec<f64> = zones
            .iter()
            .map(|z| {
                let scores = scores_by_zone.get(z).map(Vec::as_slice).unwrap_or(&[]);
                standing(scores, source_id, neutral).confidence_pct
            })
            .collect();
        let confidence_pct = if confidences.is_empty() {
            neutral
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };

        rows.push(SourceEvaluation {
            source_id,
            zones: matched_zones,
            mean_abs_error: sums
                .into_iter()
                .map(|(v, (total, n))| (v, total / f64::from(n)))
                .collect(),
            confidence_pct,
        });
    }

    Ok(Some(LatestBenchmark {
        observed_at: instant,
        rows,
    }))
}
