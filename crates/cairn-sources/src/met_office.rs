//! UK Met Office site-specific three-hourly point forecast adapter.

use cairn_core::{ForecastRecord, MetOfficeConfig, PrecipType, SourceId, TimeWindow, Zone};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::daily::{parse_timestamp, DailySeries};
use crate::error::{SourceError, SourceResult};
use crate::http::HttpContext;

const METOFFICE_BASE: &str =
    "https://data.hub.api.metoffice.gov.uk/sitespecific/v0/point/three-hourly";

#[derive(Debug, Deserialize)]
struct PointForecast {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: FeatureProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeatureProperties {
    #[serde(default, alias = "timeseries")]
    time_series: Vec<ThreeHourly>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreeHourly {
    time: String,
    max_screen_air_temp: Option<f64>,
    min_screen_air_temp: Option<f64>,
    screen_temperature: Option<f64>,
    wind_speed_10m: Option<f64>,
    /// percent
    prob_of_precipitation: Option<f64>,
    /// metres
    visibility: Option<f64>,
    significant_weather_code: Option<i32>,
}

/// Precipitation type from a Met Office significant weather code
pub fn precip_from_weather_code(code: i32) -> PrecipType {
    match code {
        9..=15 | 28..=30 => PrecipType::Rain,
        16..=21 => PrecipType::Mixed,
        22..=27 => PrecipType::Snow,
        _ => PrecipType::None,
    }
}

pub struct MetOfficeAdapter {
    ctx: HttpContext,
    api_key: String,
    datasource: String,
    base_url: String,
}

impl MetOfficeAdapter {
    /// # Errors
    /// Returns `SourceError::NotConfigured` without an API key.
    pub fn new(ctx: HttpContext, config: &MetOfficeConfig) -> SourceResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SourceError::NotConfigured("METOFFICE_API_KEY".to_string()))?;

        Ok(Self {
            ctx,
            api_key,
            datasource: config.datasource.clone(),
            base_url: config.base_url.clone().unwrap_or_else(|| METOFFICE_BASE.to_string()),
        })
    }

    #[instrument(skip(self, zone), fields(zone = %zone.id), level = "info")]
    pub async fn fetch(
        &self,
        zone: &Zone,
        window: TimeWindow,
        issued_at: DateTime<Utc>,
    ) -> SourceResult<Vec<ForecastRecord>> {
        let query = [
            ("datasource", self.datasource.clone()),
            ("includeLocationName", "true".to_string()),
            ("excludeParameterMetadata", "true".to_string()),
            ("latitude", format!("{:.6}", zone.latitude)),
            ("longitude", format!("{:.6}", zone.longitude)),
        ];

        let payload: PointForecast = self
            .ctx
            .get_json(|client| {
                client
                    .get(&self.base_url)
                    .header("apikey", &self.api_key)
                    .header("Accept", "application/json")
                    .query(&query)
            })
            .await?;

        let feature = payload
            .features
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::data_invalid("Met Office response missing features"))?;

        let tz = self.ctx.tz;
        let mut series = DailySeries::new(tz);
        for step in feature.properties.time_series {
            let Some(ts) = parse_timestamp(&step.time, tz) else {
                tracing::debug!("Skipping Met Office step with bad time {:?}", step.time);
                continue;
            };
            let stats = series.at(ts);
            match (step.max_screen_air_temp, step.min_screen_air_temp) {
                (None, None) => {
                    if let Some(t) = step.screen_temperature {
                        stats.temperature(t);
                    }
                }
                (max, min) => {
                    if let Some(t) = max {
                        stats.temp_max(t);
                    }
                    if let Some(t) = min {
                        stats.temp_min(t);
                    }
                }
            }
            if let Some(w) = step.wind_speed_10m {
                stats.wind(w);
            }
            if let Some(p) = step.prob_of_precipitation {
                stats.precipitation_prob(p);
            }
            if let Some(metres) = step.visibility {
                stats.visibility(metres / 1000.0);
            }
            if let Some(code) = step.significant_weather_code {
                stats.precip(precip_from_weather_code(code));
            }
        }

        let records = series.into_records(SourceId::MetOffice, zone, window, issued_at, None);
        if records.is_empty() {
            return Err(SourceError::data_invalid(
                "no target-day Met Office metrics found in timeSeries",
            ));
        }
        Ok(records)
    }
}
