//! Open-Meteo forecast adapter.

use cairn_core::{ForecastRecord, OpenMeteoConfig, PrecipType, SourceId, TimeWindow, Zone};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::daily::DailySeries;
use crate::error::{SourceError, SourceResult};
use crate::http::HttpContext;

const OPEN_METEO_FORECAST_BASE: &str = "https://api.open-meteo.com/v1/forecast";

/// Daily arrays as returned by both the forecast and archive endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct DailyBlock {
    #[serde(default)]
    pub time: Vec<NaiveDate>,
    #[serde(default)]
    pub temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    pub temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    pub wind_speed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_probability_max: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    pub weather_code: Vec<Option<f64>>,
}

/// Value at `idx`, if present and not null
pub(crate) fn value_at(values: &[Option<f64>], idx: usize) -> Option<f64> {
    values.get(idx).copied().flatten()
}

#[derive(Debug, Default, Deserialize)]
struct HourlyBlock {
    #[serde(default)]
    time: Vec<String>,
    /// metres
    #[serde(default)]
    visibility: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    daily: Option<DailyBlock>,
    #[serde(default)]
    hourly: Option<HourlyBlock>,
}

pub struct OpenMeteoAdapter {
    ctx: HttpContext,
    base_url: String,
}

impl OpenMeteoAdapter {
    pub fn new(ctx: HttpContext, config: &OpenMeteoConfig) -> Self {
        Self {
            ctx,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPEN_METEO_FORECAST_BASE.to_string()),
        }
    }

    #[instrument(skip(self, zone), fields(zone = %zone.id), level = "info")]
    pub async fn fetch(
        &self,
        zone: &Zone,
        window: TimeWindow,
        issued_at: DateTime<Utc>,
    ) -> SourceResult<Vec<ForecastRecord>> {
        let query = [
            ("latitude", format!("{:.4}", zone.latitude)),
            ("longitude", format!("{:.4}", zone.longitude)),
            (
                "daily",
                "temperature_2m_max,temperature_2m_min,wind_speed_10m_max,precipitation_probability_max,weather_code"
                    .to_string(),
            ),
            ("hourly", "visibility".to_string()),
            ("wind_speed_unit", "ms".to_string()),
            ("timezone", self.ctx.tz.name().to_string()),
            ("start_date", window.start.to_string()),
            ("end_date", window.end.to_string()),
        ];

        let payload: ForecastResponse = self
            .ctx
            .get_json(|client| client.get(&self.base_url).query(&query))
            .await?;

        let series = self.parse(payload)?;
        let records = series.into_records(SourceId::OpenMeteo, zone, window, issued_at, None);
        if records.is_empty() {
            return Err(SourceError::data_invalid("no target-day data in Open-Meteo response"));
        }
        tracing::debug!("Open-Meteo returned {} daily records", records.len());
        Ok(records)
    }

    fn parse(&self, payload: ForecastResponse) -> SourceResult<DailySeries> {
        let daily = payload
            .daily
            .ok_or_else(|| SourceError::data_invalid("Open-Meteo response missing daily block"))?;

        let mut series = DailySeries::new(self.ctx.tz);
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
            if let Some(v) = value_at(&daily.precipitation_probability_max, idx) {
                stats.precipitation_prob(v);
            }
            if let Some(code) = value_at(&daily.weather_code, idx) {
                stats.precip(PrecipType::from_wmo_code(code as i32));
            }
        }

        // Hourly times are already in the requested local timezone
        if let Some(hourly) = payload.hourly {
            for (raw, visibility) in hourly.time.iter().zip(hourly.visibility.iter()) {
                let (Ok(local), Some(metres)) =
                    (NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"), visibility)
                else {
                    continue;
                };
                series.day(local.date()).visibility(metres / 1000.0);
            }
        }

        Ok(series)
    }
}
