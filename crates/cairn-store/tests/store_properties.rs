//! Property tests: append idempotence and first-write-wins.

use cairn_core::{ForecastRecord, SourceId, Variable, Variables, ZoneId};
use cairn_store::{ForecastStore, SqliteForecastStore};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
}

fn make_record(source_idx: usize, valid_day: i64, issued_hour: i64, wind: f64) -> ForecastRecord {
    let mut variables = Variables::new();
    variables.insert(Variable::WindSpeed, wind);
    ForecastRecord {
        source_id: SourceId::ALL[source_idx % SourceId::ALL.len()],
        zone_id: ZoneId::from("glencoe"),
        issued_at: base() + Duration::hours(issued_hour),
        valid_at: base() + Duration::days(valid_day),
        variables,
        raw_confidence: None,
    }
}

proptest! {
    #[test]
    fn prop_append_twice_changes_nothing(
        specs in prop::collection::vec((0usize..5, 0i64..4, 0i64..48, 0.0f64..40.0), 1..30)
    ) {
        let store = SqliteForecastStore::in_memory().unwrap();
        let records: Vec<_> = specs
            .iter()
            .map(|(s, d, h, w)| make_record(*s, *d, *h, *w))
            .collect();

        let first = store.append(&records).unwrap();
        let count = store.forecast_count().unwrap();
        prop_assert_eq!(first.inserted + first.duplicates, records.len());
        prop_assert_eq!(first.inserted, count);

        let second = store.append(&records).unwrap();
        prop_assert_eq!(second.inserted, 0);
        prop_assert_eq!(second.duplicates, records.len());
        prop_assert_eq!(store.forecast_count().unwrap(), count);
    }

    #[test]
    fn prop_first_write_wins(first_wind in 0.0f64..40.0, second_wind in 0.0f64..40.0) {
        let store = SqliteForecastStore::in_memory().unwrap();
        store.append(&[make_record(1, 2, 6, first_wind)]).unwrap();
        store.append(&[make_record(1, 2, 6, second_wind)]).unwrap();

        let stored: Vec<_> = store
            .query_predictions(
                SourceId::ALL[1],
                &ZoneId::from("glencoe"),
                base()..=base() + Duration::days(5),
            )
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        prop_assert_eq!(stored.len(), 1);
        prop_assert_eq!(stored[0].get(Variable::WindSpeed), Some(first_wind));
    }

    #[test]
    fn prop_predictions_never_out_of_order(
        hours in prop::collection::vec(0i64..500, 1..40)
    ) {
        let store = SqliteForecastStore::in_memory().unwrap();
        let records: Vec<_> = hours.iter().map(|h| make_record(0, 30, *h, 5.0)).collect();
        store.append(&records).unwrap();

        let issued: Vec<_> = store
            .query_predictions(
                SourceId::ALL[0],
                &ZoneId::from("glencoe"),
                base()..=base() + Duration::days(40),
            )
            .unwrap()
            .map(|r| r.unwrap().issued_at)
            .collect();
        prop_assert!(issued.windows(2).all(|w| w[0] < w[1]));
    }
}
