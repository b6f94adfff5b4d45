//! Registry fetch against mocked providers: failures stay contained per source.

use cairn_core::{Config, SourceId, TimeWindow, Variable, Zone, ZoneId};
use cairn_sources::{SourceError, SourceRegistry};
use chrono::{NaiveDate, TimeZone, Utc};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn zones() -> Vec<Zone> {
    [("glencoe", 56.68, -5.10), ("cairngorms", 57.1, -3.7)]
        .into_iter()
        .map(|(id, latitude, longitude)| Zone {
            id: ZoneId::from(id),
            name: id.to_string(),
            latitude,
            longitude,
            pdf_links: vec![],
        })
        .collect()
}

fn met_no_body() -> serde_json::Value {
    serde_json::json!({
        "properties": {
            "timeseries": [
                {"time": "2025-01-02T09:00:00Z", "data": {"instant": {"details": {"air_temperature": -1.0, "wind_speed": 6.0}}}},
                {"time": "2025-01-02T15:00:00Z", "data": {"instant": {"details": {"air_temperature": 2.0, "wind_speed": 9.0}}}}
            ]
        }
    })
}

#[tokio::test]
async fn test_failing_source_does_not_abort_others() {
    let met_no = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(met_no_body()))
        .mount(&met_no)
        .await;

    let open_meteo = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&open_meteo)
        .await;

    let mut config = Config::default();
    config.sources.enabled = vec![SourceId::OpenMeteo, SourceId::MetNo];
    config.sources.retry.max_retries = 0;
    config.sources.max_parallel_fetches = 2;
    config.sources.met_no.base_url = Some(met_no.uri());
    config.sources.open_meteo.base_url = Some(open_meteo.uri());

    let registry = SourceRegistry::from_config(&config, chrono_tz::Europe::London).unwrap();
    let target = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
    let issued = Utc.with_ymd_and_hms(2025, 1, 1, 6, 0, 0).unwrap();
    let report = registry
        .fetch_all(&zones(), TimeWindow::single(target), issued)
        .await;

    assert_eq!(report.outcomes.len(), 4);
    // priority order: MET Norway before Open-Meteo, zones in configured order
    assert_eq!(report.outcomes[0].source_id, SourceId::MetNo);
    assert_eq!(report.outcomes[0].zone_id, ZoneId::from("glencoe"));
    assert_eq!(report.outcomes[1].zone_id, ZoneId::from("cairngorms"));
    assert_eq!(report.outcomes[2].source_id, SourceId::OpenMeteo);

    let records: Vec<_> = report.records().collect();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.source_id == SourceId::MetNo));
    assert_eq!(records[0].get(Variable::WindSpeed), Some(9.0));

    assert!(matches!(
        report.outcomes[3].result,
        Err(SourceError::Http { status: 503, .. })
    ));
    assert_eq!(report.failed_sources(), vec![SourceId::OpenMeteo]);
    assert_eq!(
        report.notes.get(&SourceId::OpenMeteo).map(String::as_str),
        Some("HTTP 503 (Service Unavailable)")
    );
    assert!(!report.notes.contains_key(&SourceId::MetNo));
}
