//! Settled observations from the Open-Meteo reanalysis archive.
//!
//! The archive is the default ground truth for benchmarking. It only ever
//! produces observations for zone-local days that have fully elapsed.

use cairn_core::{
    local_midnight_utc, offset_day, ActualObservation, OpenMeteoConfig, PrecipType, TimeWindow,
    Zone,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::daily::DailySeries;
use crate::error::{SourceError, SourceResult};
use crate::http::HttpContext;
use crate::open_meteo::{value_at, DailyBlock};

const OPEN_METEO_ARCHIVE_BASE: &str = "https://archive-api.open-meteo.com/v1/archive";

/// Daily precipitation total (mm) counted as a wet day
const WET_DAY_THRESHOLD_MM: f64 = 0.2;

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: Option<DailyBlock>,
}

pub struct ObservationAdapter {
    ctx: HttpContext,
    base_url: String,
}

impl ObservationAdapter {
    pub fn new(ctx: HttpContext, config: &OpenMeteoConfig) -> Self {
        Self {
            ctx,
            base_url: config
                .archive_base_url
                .clone()
                .unwrap_or_else(|| OPEN_METEO_ARCHIVE_BASE.to_string()),
        }
    }

    /// Observations for the days of `window` that ended before `now`.
    #[instrument(skip(self, zone), fields(zone = %zone.id), level = "info")]
    pub async fn fetch_actuals(
        &self,
        zone: &Zone,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> SourceResult<Vec<ActualObservation>> {
        let tz = self.ctx.tz;
        let query = [
            ("latitude", format!("{:.4}", zone.latitude)),
            ("longitude", format!("{:.4}", zone.longitude)),
            ("start_date", window.start.to_string()),
            ("end_date", window.end.to_string()),
            (
                "daily",
                "temperature_2m_max,temperature_2m_min,wind_speed_10m_max,precipitation_sum,weather_code"
                    .to_string(),
            ),
            ("wind_speed_unit", "ms".to_string()),
            ("timezone", tz.name().to_string()),
        ];

        let payload: ArchiveResponse = self
            .ctx
            .get_json(|client| client.get(&self.base_url).query(&query))
            .await?;
        let daily = payload
            .daily
            .ok_or_else(|| SourceError::data_invalid("archive response missing daily block"))?;

        let mut series = DailySeries::new(tz);
        for (idx, day) in daily.time.iter().enumerate() {
            let stats = series.day(*day);
            if let Some(v) = value_at(&daily.temperature_2m_max, idx) {
                stats.temp_max(v);
            }
            if let Some(v) = value_at(&daily.temperature_2m_min, idx) {
                stats.temp_min(v);
            }
            if let Some(v) = value_at(&daily.wind_speed_10m_max, idx) {
                stats.wind(v);
            }
            if let Some(mm) = value_at(&daily.precipitation_sum, idx) {
                stats.precipitation_prob(if mm >= WET_DAY_THRESHOLD_MM { 100.0 } else { 0.0 });
            }
            if let Some(code) = value_at(&daily.weather_code, idx) {
                stats.precip(PrecipType::from_wmo_code(code as i32));
            }
        }

        let observations: Vec<_> = series
            .into_days(window)
            .into_iter()
            .filter(|(day, _)| local_midnight_utc(offset_day(*day, 1), tz) <= now)
            .map(|(day, variables)| ActualObservation {
                zone_id: zone.id.clone(),
                observed_at: local_midnight_utc(day, tz),
                variables,
            })
            .collect();

        tracing::debug!("Archive returned {} settled observations", observations.len());
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use cairn_core::{SourcesConfig, Variable, ZoneId};
    use chrono::{NaiveDate, TimeZone};
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn zone() -> Zone {
        Zone {
            id: ZoneId::from("cairngorms"),
            name: "Cairngorms".into(),
            latitude: 57.1,
            longitude: -3.7,
            pdf_links: vec![],
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    async fn adapter_with(body: serde_json::Value) -> (MockServer, ObservationAdapter) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("daily", "temperature_2m_max,temperature_2m_min,wind_speed_10m_max,precipitation_sum,weather_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let mut sources = SourcesConfig::default();
        sources.retry.max_retries = 0;
        let ctx = HttpContext::new(&sources, chrono_tz::Europe::London).unwrap();
        let adapter = ObservationAdapter::new(
            ctx,
            &OpenMeteoConfig {
                base_url: None,
                archive_base_url: Some(server.uri()),
            },
        );
        (server, adapter)
    }

    #[tokio::test]
    async fn test_wet_day_and_settled_filter() {
        let (_server, adapter) = adapter_with(serde_json::json!({
            "daily": {
                "time": ["2025-01-01", "2025-01-02"],
                "temperature_2m_max": [2.0, 4.0],
                "temperature_2m_min": [-3.0, 0.5],
                "wind_speed_10m_max": [14.0, 7.0],
                "precipitation_sum": [0.1, 5.2],
                "weather_code": [3, 61]
            }
        }))
        .await;

        // Midday on 2 Jan: only 1 Jan has fully elapsed
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 12, 0, 0).unwrap();
        let obs = adapter
            .fetch_actuals(&zone(), TimeWindow::new(day(1), day(2)), now)
            .await
            .unwrap();

        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].observed_at, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(obs[0].get(Variable::PrecipitationProb), Some(0.0));
        assert_eq!(obs[0].get(Variable::WindSpeed), Some(14.0));
        assert!(obs.iter().all(|o| o.is_settled(now)));
    }

    #[tokio::test]
    async fn test_wet_day_maps_to_certain_precip() {
        let (_server, adapter) = adapter_with(serde_json::json!({
            "daily": {
                "time": ["2025-01-02"],
                "precipitation_sum": [5.2],
                "weather_code": [61]
            }
        }))
        .await;

        let now = Utc.with_ymd_and_hms(2025, 1, 5, 0, 0, 0).unwrap();
        let obs = adapter
            .fetch_actuals(&zone(), TimeWindow::single(day(2)), now)
            .await
            .unwrap();
        assert_eq!(obs[0].get(Variable::PrecipitationProb), Some(100.0));
        assert_eq!(obs[0].get(Variable::PrecipType), Some(PrecipType::Rain.code()));
    }
}
