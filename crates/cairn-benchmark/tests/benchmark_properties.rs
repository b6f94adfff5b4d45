//! Property tests for the confidence mapping, the neutral baseline and
//! hindsight-free matching.

use cairn_benchmark::{confidence_from_error, BenchmarkEngine, ScoringRules};
use cairn_core::{
    ActualObservation, BenchmarkConfig, ForecastRecord, SourceId, Variable, Variables,
    VariableClass, ZoneId,
};
use cairn_store::{ForecastStore, SqliteForecastStore};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()
}

fn wind(value: f64) -> Variables {
    [(Variable::WindSpeed, value)].into_iter().collect()
}

proptest! {
    #[test]
    fn prop_confidence_is_linear_and_monotone(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(confidence_from_error(lo) >= confidence_from_error(hi));

        let c = confidence_from_error(a);
        prop_assert!((0.0..=100.0).contains(&c));
        prop_assert!((c - 100.0 * (1.0 - a)).abs() < 1e-9);
    }

    #[test]
    fn prop_below_min_samples_is_exactly_neutral(
        errors in prop::collection::vec(0.0f64..=1.0, 1..5)
    ) {
        let rules = ScoringRules::default();
        let mut score = rules.seed(SourceId::MetNo, ZoneId::from("glenshee"), VariableClass::Temp, errors[0]);
        prop_assert_eq!(score.confidence_pct, rules.neutral_confidence);
        for e in &errors[1..] {
            rules.absorb(&mut score, *e);
            prop_assert_eq!(score.confidence_pct, rules.neutral_confidence);
        }
    }

    #[test]
    fn prop_rolling_error_stays_in_unit_interval(
        errors in prop::collection::vec(0.0f64..=1.0, 1..40)
    ) {
        let rules = ScoringRules::default();
        let mut score = rules.seed(SourceId::MetNo, ZoneId::from("glenshee"), VariableClass::Wind, errors[0]);
        for e in &errors[1..] {
            rules.absorb(&mut score, *e);
        }
        prop_assert!((0.0..=1.0).contains(&score.rolling_error));
        prop_assert_eq!(score.sample_count as usize, errors.len());
    }

    #[test]
    fn prop_matching_never_uses_hindsight(
        issues in prop::collection::vec((0i64..6, -48i64..48, 0.0f64..30.0), 1..25)
    ) {
        let store = SqliteForecastStore::in_memory().unwrap();
        let zone = ZoneId::from("glencoe");

        let records: Vec<ForecastRecord> = issues
            .iter()
            .map(|(d, offset_h, w)| {
                let valid = base() + Duration::days(*d);
                ForecastRecord {
                    source_id: SourceId::OpenMeteo,
                    zone_id: zone.clone(),
                    issued_at: valid + Duration::hours(*offset_h),
                    valid_at: valid,
                    variables: wind(*w),
                    raw_confidence: None,
                }
            })
            .collect();
        store.append(&records).unwrap();
        for d in 0..6 {
            store
                .append_actual(&ActualObservation {
                    zone_id: zone.clone(),
                    observed_at: base() + Duration::days(d),
                    variables: wind(10.0),
                })
                .unwrap();
        }

        let engine = BenchmarkEngine::new(&BenchmarkConfig::default()).unwrap();
        let matched = engine
            .matched_pairs(&store, SourceId::OpenMeteo, &zone, base() + Duration::days(10))
            .unwrap();

        for pair in &matched.pairs {
            prop_assert!(pair.prediction.issued_at < pair.actual.observed_at);
            prop_assert_eq!(pair.prediction.valid_at, pair.actual.observed_at);

            // and it is the latest such issue
            let latest = records
                .iter()
                .filter(|r| r.valid_at == pair.actual.observed_at && r.issued_at < r.valid_at)
                .map(|r| r.issued_at)
                .max();
            prop_assert_eq!(Some(pair.prediction.issued_at), latest);
        }
    }
}
