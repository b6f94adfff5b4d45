//! Actual observations derived from a designated forecast source.
//!
//! Used when `benchmark.ground_truth` names a source instead of the
//! reanalysis archive: that source's final word on a past instant stands in
//! for the observation.

use cairn_core::{ActualObservation, SourceId, ZoneId};
use cairn_store::ForecastStore;
use chrono::{DateTime, Utc};

use crate::error::BenchmarkResult;

/// Observations for the settled `instants` of a zone, taken from the
/// latest-issued record of `source_id` for each instant.
///
/// Instants after `now`, or without a record from that source, yield nothing.
///
/// # Errors
/// Fatal store errors only.
pub fn actuals_from_source<S: ForecastStore + ?Sized>(
    store: &S,
    source_id: SourceId,
    zone_id: &ZoneId,
    instants: &[DateTime<Utc>],
    now: DateTime<Utc>,
) -> BenchmarkResult<Vec<ActualObservation>> {
    let mut observations = Vec::new();
    for instant in instants.iter().copied().filter(|t| *t <= now) {
        let chosen = store
            .latest_predictions(zone_id, instant)?
            .into_iter()
            .find(|r| r.source_id == source_id);

        if let Some(record) = chosen {
            observations.push(ActualObservation {
                zone_id: zone_id.clone(),
                observed_at: instant,
                variables: record.variables,
            });
        } else {
            tracing::debug!("No {} record for {} at {}", source_id, zone_id, instant);
        }
    }
    Ok(observations)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use cairn_core::{ForecastRecord, Variable, Variables};
    use cairn_store::SqliteForecastStore;
    use chrono::{Duration, TimeZone};

    fn record(source: SourceId, valid: DateTime<Utc>, issued: DateTime<Utc>, wind: f64) -> ForecastRecord {
        let variables: Variables = [(Variable::WindSpeed, wind)].into_iter().collect();
        ForecastRecord {
            source_id: source,
            zone_id: ZoneId::from("cairngorms"),
            issued_at: issued,
            valid_at: valid,
            variables,
            raw_confidence: None,
        }
    }

    #[test]
    fn test_designated_source_latest_issue_becomes_actual() {
        let store = SqliteForecastStore::in_memory().unwrap();
        let t = Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap();
        store
            .append(&[
                record(SourceId::MetOffice, t, t - Duration::days(1), 10.0),
                record(SourceId::MetOffice, t, t + Duration::hours(6), 13.0),
                record(SourceId::MetNo, t, t + Duration::hours(8), 20.0),
            ])
            .unwrap();

        let zone = ZoneId::from("cairngorms");
        let later = t + Duration::days(2);
        let obs = actuals_from_source(&store, SourceId::MetOffice, &zone, &[t, later], t + Duration::days(1))
            .unwrap();

        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].observed_at, t);
        assert_eq!(obs[0].get(Variable::WindSpeed), Some(13.0));
    }
}
