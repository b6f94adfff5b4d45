//! OpenWeather adapter: One Call 3.0 daily with a 2.5 three-hourly fallback.

use cairn_core::{
    ForecastRecord, OpenWeatherConfig, OpenWeatherMode, PrecipType, SourceId, TimeWindow, Zone,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::daily::{from_unix, DailySeries};
use crate::error::{SourceError, SourceResult};
use crate::http::HttpContext;

const OPENWEATHER_ONECALL_BASE: &str = "https://api.openweathermap.org/data/3.0/onecall";
const OPENWEATHER_FORECAST_BASE: &str = "https://api.openweathermap.org/data/2.5/forecast";

const ONECALL_SUBSCRIPTION_HINT: &str = "One Call 3.0 requires a separate subscription";

#[derive(Debug, Deserialize)]
struct Condition {
    id: i32,
}

#[derive(Debug, Deserialize)]
struct OneCallResponse {
    #[serde(default)]
    daily: Vec<OneCallDay>,
}

#[derive(Debug, Deserialize)]
struct OneCallDay {
    dt: i64,
    temp: Option<DayTemp>,
    wind_speed: Option<f64>,
    /// probability, 0-1
    pop: Option<f64>,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct DayTemp {
    min: Option<f64>,
    max: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    dt: i64,
    main: Option<EntryMain>,
    wind: Option<EntryWind>,
    pop: Option<f64>,
    /// metres
    visibility: Option<f64>,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct EntryMain {
    temp: Option<f64>,
    temp_min: Option<f64>,
    temp_max: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct EntryWind {
    speed: Option<f64>,
}

/// Precipitation type from an OpenWeather condition id
pub fn precip_from_condition(id: i32) -> PrecipType {
    match id {
        511 | 611..=616 => PrecipType::Mixed,
        200..=299 | 300..=399 | 500..=599 => PrecipType::Rain,
        600..=699 => PrecipType::Snow,
        _ => PrecipType::None,
    }
}

pub struct OpenWeatherAdapter {
    ctx: HttpContext,
    api_key: String,
    mode: OpenWeatherMode,
    onecall_url: String,
    forecast_url: String,
}

impl OpenWeatherAdapter {
    /// # Errors
    /// Returns `SourceError::NotConfigured` without an API key.
    pub fn new(ctx: HttpContext, config: &OpenWeatherConfig) -> SourceResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SourceError::NotConfigured("OPENWEATHER_API_KEY".to_string()))?;

        Ok(Self {
            ctx,
            api_key,
            mode: config.mode,
            onecall_url: config
                .onecall_base_url
                .clone()
                .unwrap_or_else(|| OPENWEATHER_ONECALL_BASE.to_string()),
            forecast_url: config
                .forecast_base_url
                .clone()
                .unwrap_or_else(|| OPENWEATHER_FORECAST_BASE.to_string()),
        })
    }

    #[instrument(skip(self, zone), fields(zone = %zone.id), level = "info")]
    pub async fn fetch(
        &self,
        zone: &Zone,
        window: TimeWindow,
        issued_at: DateTime<Utc>,
    ) -> SourceResult<Vec<ForecastRecord>> {
        match self.mode {
            OpenWeatherMode::OneCall => self.fetch_onecall(zone, window, issued_at).await,
            OpenWeatherMode::Forecast => self.fetch_forecast(zone, window, issued_at).await,
            OpenWeatherMode::Auto => match self.fetch_onecall(zone, window, issued_at).await {
                Ok(records) => Ok(records),
                Err(onecall_err) => {
                    tracing::debug!("One Call failed ({}), falling back to 2.5 forecast", onecall_err);
                    self.fetch_forecast(zone, window, issued_at)
                        .await
                        .map_err(|forecast_err| combine(onecall_err, forecast_err))
                }
            },
        }
    }

    fn base_query(&self, zone: &Zone) -> Vec<(&'static str, String)> {
        vec![
            ("lat", format!("{:.6}", zone.latitude)),
            ("lon", format!("{:.6}", zone.longitude)),
            ("appid", self.api_key.clone()),
            ("units", "metric".to_string()),
        ]
    }

    async fn fetch_onecall(
        &self,
        zone: &Zone,
        window: TimeWindow,
        issued_at: DateTime<Utc>,
    ) -> SourceResult<Vec<ForecastRecord>> {
        let mut query = self.base_query(zone);
        query.push(("exclude", "minutely,hourly,alerts".to_string()));

        let payload: OneCallResponse = self
            .ctx
            .get_json(|client| client.get(&self.onecall_url).query(&query))
            .await
            .map_err(onecall_hint)?;

        let mut series = DailySeries::new(self.ctx.tz);
        for day in payload.daily {
            let Some(ts) = from_unix(day.dt) else { continue };
            let stats = series.at(ts);
            if let Some(temp) = day.temp {
                if let Some(t) = temp.max {
                    stats.temp_max(t);
                }
                if let Some(t) = temp.min {
                    stats.temp_min(t);
                }
            }
            if let Some(w) = day.wind_speed {
                stats.wind(w);
            }
            if let Some(p) = day.pop {
                stats.precipitation_prob(p * 100.0);
            }
            for condition in &day.weather {
                stats.precip(precip_from_condition(condition.id));
            }
        }

        let records = series.into_records(SourceId::OpenWeather, zone, window, issued_at, None);
        if records.is_empty() {
            return Err(SourceError::data_invalid("no target-day data in One Call response"));
        }
        Ok(records)
    }

    async fn fetch_forecast(
        &self,
        zone: &Zone,
        window: TimeWindow,
        issued_at: DateTime<Utc>,
    ) -> SourceResult<Vec<ForecastRecord>> {
        let query = self.base_query(zone);
        let payload: ForecastResponse = self
            .ctx
            .get_json(|client| client.get(&self.forecast_url).query(&query))
            .await?;

        let mut series = DailySeries::new(self.ctx.tz);
        for entry in payload.list {
            let Some(ts) = from_unix(entry.dt) else { continue };
            let stats = series.at(ts);
            if let Some(main) = entry.main {
                if let Some(t) = main.temp {
                    stats.temperature(t);
                }
                if let Some(t) = main.temp_max {
                    stats.temp_max(t);
                }
                if let Some(t) = main.temp_min {
                    stats.temp_min(t);
                }
            }
            if let Some(w) = entry.wind.and_then(|w| w.speed) {
                stats.wind(w);
            }
            if let Some(p) = entry.pop {
                stats.precipitation_prob(p * 100.0);
            }
            if let Some(metres) = entry.visibility {
                stats.visibility(metres / 1000.0);
            }
            for condition in &entry.weather {
                stats.precip(precip_from_condition(condition.id));
            }
        }

        let records = series.into_records(SourceId::OpenWeather, zone, window, issued_at, None);
        if records.is_empty() {
            return Err(SourceError::data_invalid("no target-day data in 2.5 forecast response"));
        }
        Ok(records)
    }
}

fn onecall_hint(err: SourceError) -> SourceError {
    match err {
        SourceError::Http { status, message } if message.contains(ONECALL_SUBSCRIPTION_HINT) => {
            SourceError::http(status, "One Call 3.0 subscription not enabled")
        }
        other => other,
    }
}

/// Report the fallback failure, keeping an auth hint from the first attempt.
fn combine(onecall: SourceError, forecast: SourceError) -> SourceError {
    if onecall.is_auth_failure() && !forecast.is_auth_failure() {
        return onecall;
    }
    forecast
}
