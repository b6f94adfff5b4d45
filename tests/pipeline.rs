//! Full runs against mocked providers and an in-memory store.

use cairn::{produce_briefing, RunError};
use cairn_briefing::{render_text, SECTION_TITLES};
use cairn_core::{Config, ForecastRecord, SourceId, Variable, Zone, ZoneId};
use cairn_store::{ForecastStore, SqliteForecastStore};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, 6, 0, 0).unwrap()
}

fn glencoe() -> Zone {
    Zone {
        id: ZoneId::from("glencoe"),
        name: "Glencoe".to_string(),
        latitude: 56.68,
        longitude: -5.10,
        pdf_links: vec![],
    }
}

async fn respond(status: u16, body: Option<serde_json::Value>) -> MockServer {
    let server = MockServer::start().await;
    let template = match body {
        Some(json) => ResponseTemplate::new(status).set_body_json(json),
        None => ResponseTemplate::new(status),
    };
    Mock::given(method("GET")).respond_with(template).mount(&server).await;
    server
}

fn met_no_body() -> serde_json::Value {
    serde_json::json!({
        "properties": {
            "timeseries": [
                {"time": "2025-01-11T09:00:00Z", "data": {"instant": {"details": {"air_temperature": -2.0, "wind_speed": 5.0}}}},
                {"time": "2025-01-11T14:00:00Z", "data": {"instant": {"details": {"air_temperature": 3.0, "wind_speed": 7.0}}}}
            ]
        }
    })
}

fn archive_body() -> serde_json::Value {
    serde_json::json!({
        "daily": {
            "time": ["2025-01-09"],
            "temperature_2m_max": [3.0],
            "temperature_2m_min": [-2.0],
            "wind_speed_10m_max": [8.0],
            "precipitation_sum": [0.0],
            "weather_code": [3]
        }
    })
}

fn base_config() -> Config {
    let mut config = Config::default();
    config.zones = vec![glencoe()];
    config.forecast_days = 1;
    config.sources.retry.max_retries = 0;
    config.sources.openweather.api_key = None;
    config
}

#[tokio::test]
async fn test_run_contains_failures_and_renders_every_section() {
    let met_no = respond(200, Some(met_no_body())).await;
    let open_meteo = respond(503, None).await;
    let archive = respond(200, Some(archive_body())).await;

    let mwis = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecasts"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="/files/forecasts/mwi-wh.pdf">West Highlands</a> <a href="/files/other.pdf">x</a>"#,
        ))
        .mount(&mwis)
        .await;

    let mut config = base_config();
    config.sources.enabled = vec![SourceId::MetNo, SourceId::OpenMeteo, SourceId::OpenWeather];
    config.sources.met_no.base_url = Some(met_no.uri());
    config.sources.open_meteo.base_url = Some(open_meteo.uri());
    config.sources.open_meteo.archive_base_url = Some(archive.uri());
    config.catalog.mwis_index_url = format!("{}/forecasts", mwis.uri());

    let store = SqliteForecastStore::in_memory().unwrap();
    // yesterday's prediction from a previous run
    store
        .append(&[ForecastRecord {
            source_id: SourceId::MetNo,
            zone_id: ZoneId::from("glencoe"),
            issued_at: Utc.with_ymd_and_hms(2025, 1, 8, 6, 0, 0).unwrap(),
            valid_at: Utc.with_ymd_and_hms(2025, 1, 9, 0, 0, 0).unwrap(),
            variables: [
                (Variable::TempMax, 4.0),
                (Variable::TempMin, -1.0),
                (Variable::WindSpeed, 10.0),
            ]
            .into_iter()
            .collect(),
            raw_confidence: None,
        }])
        .unwrap();

    let report = produce_briefing(&config, &store, now()).await.unwrap();

    assert_eq!(report.target_date, NaiveDate::from_ymd_opt(2025, 1, 11).unwrap());
    assert_eq!(report.briefings.len(), 1);
    let briefing = &report.briefings[0];
    assert!(!briefing.is_unavailable());
    assert_eq!(briefing.chosen_source(), Some(SourceId::MetNo));
    assert_eq!(briefing.source_confidence_pct, Some(50.0));

    assert_eq!(
        report.failed_sources,
        vec![(SourceId::OpenMeteo, "HTTP 503 (Service Unavailable)".to_string())]
    );
    assert_eq!(
        report.not_configured,
        vec![(SourceId::OpenWeather, "OPENWEATHER_API_KEY".to_string())]
    );
    assert_eq!(
        report.shared_links,
        vec![format!("{}/files/forecasts/mwi-wh.pdf", mwis.uri())]
    );

    let latest = report.latest_benchmark.as_ref().unwrap();
    assert_eq!(latest.observed_at, Utc.with_ymd_and_hms(2025, 1, 9, 0, 0, 0).unwrap());
    assert_eq!(latest.rows.len(), 1);
    assert_eq!(latest.rows[0].mae(Variable::TempMax), Some(1.0));
    assert_eq!(latest.rows[0].mae(Variable::WindSpeed), Some(2.0));

    assert_eq!(store.forecast_count().unwrap(), 2);
    let runs = store.list_runs(10).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, report.run_id);
    assert_eq!(runs[0].failed_sources, vec![SourceId::OpenMeteo]);
    assert_eq!(runs[0].actuals_inserted, 1);

    let history = store.list_evaluations(SourceId::MetNo).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].run_id, report.run_id);
    assert_eq!(history[0].observed_at, latest.observed_at);
    assert_eq!(history[0].mean_abs_error[&Variable::TempMax], 1.0);
    let weights = store.list_weights(report.target_date).unwrap();
    assert_eq!(weights.len(), report.sources.len());
    let met_no_weight = weights.iter().find(|w| w.source_id == SourceId::MetNo).unwrap();
    assert!((met_no_weight.weight - 1.0).abs() < 1e-9);

    let text = render_text(&report);
    let positions: Vec<usize> = SECTION_TITLES.iter().map(|t| text.find(t).unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(text.contains("- Skipped errored sources this run: Open-Meteo"));
    assert!(text.contains("- OpenWeather: not configured (OPENWEATHER_API_KEY missing)"));
    assert!(text.contains("- Glencoe: MET Norway (50.0% confidence)"));
}

#[tokio::test]
async fn test_zone_without_forecasts_is_reported_unavailable() {
    let open_meteo = respond(503, None).await;
    let archive = respond(503, None).await;

    let mut config = base_config();
    config.sources.enabled = vec![SourceId::OpenMeteo];
    config.sources.open_meteo.base_url = Some(open_meteo.uri());
    config.sources.open_meteo.archive_base_url = Some(archive.uri());
    config.catalog.mwis_enabled = false;

    let store = SqliteForecastStore::in_memory().unwrap();
    let report = produce_briefing(&config, &store, now()).await.unwrap();

    assert!(report.briefings[0].is_unavailable());
    assert!(report.latest_benchmark.is_none());
    assert!(report.shared_links.is_empty());

    let text = render_text(&report);
    assert!(text.contains("- Glencoe: forecast unavailable from current source set."));
    assert!(text.contains("- Not enough history yet"));
    assert!(text.contains("- No source produced usable metrics for this run."));
    assert!(text.contains("- No PDF links found in this run."));
}

#[tokio::test]
async fn test_stale_forecast_of_failed_source_is_not_briefed() {
    let met_no = respond(503, None).await;
    let archive = respond(503, None).await;

    let mut config = base_config();
    config.sources.enabled = vec![SourceId::MetNo];
    config.sources.met_no.base_url = Some(met_no.uri());
    config.sources.open_meteo.archive_base_url = Some(archive.uri());
    config.catalog.mwis_enabled = false;

    let store = SqliteForecastStore::in_memory().unwrap();
    // target-day forecast left over from an earlier run
    store
        .append(&[ForecastRecord {
            source_id: SourceId::MetNo,
            zone_id: ZoneId::from("glencoe"),
            issued_at: Utc.with_ymd_and_hms(2025, 1, 9, 6, 0, 0).unwrap(),
            valid_at: Utc.with_ymd_and_hms(2025, 1, 11, 0, 0, 0).unwrap(),
            variables: [(Variable::TempMax, 2.0), (Variable::WindSpeed, 6.0)]
                .into_iter()
                .collect(),
            raw_confidence: None,
        }])
        .unwrap();

    let report = produce_briefing(&config, &store, now()).await.unwrap();

    assert_eq!(report.failed_sources.len(), 1);
    assert_eq!(report.failed_sources[0].0, SourceId::MetNo);
    let briefing = &report.briefings[0];
    assert!(briefing.is_unavailable());
    assert_eq!(briefing.chosen_source(), None);
    assert!(report.sources.iter().all(|s| s.weight == 0.0));

    let text = render_text(&report);
    assert!(text.contains("- Glencoe: forecast unavailable from current source set."));
    assert!(text.contains("- Glencoe: no source available"));
}

#[tokio::test]
async fn test_rerun_does_not_duplicate_history() {
    let met_no = respond(200, Some(met_no_body())).await;
    let archive = respond(200, Some(archive_body())).await;

    let mut config = base_config();
    config.sources.enabled = vec![SourceId::MetNo];
    config.sources.met_no.base_url = Some(met_no.uri());
    config.sources.open_meteo.archive_base_url = Some(archive.uri());
    config.catalog.mwis_enabled = false;

    let store = SqliteForecastStore::in_memory().unwrap();
    produce_briefing(&config, &store, now()).await.unwrap();
    let first_scores = store.load_scores(&ZoneId::from("glencoe")).unwrap();
    produce_briefing(&config, &store, now()).await.unwrap();

    assert_eq!(store.forecast_count().unwrap(), 1);
    assert_eq!(store.actual_count().unwrap(), 1);
    assert_eq!(store.load_scores(&ZoneId::from("glencoe")).unwrap(), first_scores);
    assert_eq!(store.list_runs(10).unwrap().len(), 2);
    let target = NaiveDate::from_ymd_opt(2025, 1, 11).unwrap();
    assert_eq!(store.list_weights(target).unwrap().len(), 2);
}

#[tokio::test]
async fn test_invalid_timezone_is_a_config_error() {
    let mut config = base_config();
    config.timezone = "Mars/Olympus_Mons".to_string();
    let store = SqliteForecastStore::in_memory().unwrap();

    let err = produce_briefing(&config, &store, now()).await.unwrap_err();
    assert!(matches!(err, RunError::Config(_)));
}
