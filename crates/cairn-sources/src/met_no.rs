//! MET Norway locationforecast adapter.
//!
//! The API terms require an identifying `User-Agent`; the shared client
//! always sends the configured one.

use cairn_core::{ForecastRecord, MetNoConfig, PrecipType, SourceId, TimeWindow, Zone};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::daily::DailySeries;
use crate::error::{SourceError, SourceResult};
use crate::http::HttpContext;

const MET_NO_BASE: &str = "https://api.met.no/weatherapi/locationforecast/2.0/compact";

#[derive(Debug, Deserialize)]
struct LocationForecast {
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Properties {
    #[serde(default)]
    timeseries: Vec<TimeStep>,
}

#[derive(Debug, Deserialize)]
struct TimeStep {
    time: DateTime<Utc>,
    data: StepData,
}

#[derive(Debug, Deserialize)]
struct StepData {
    instant: Instant,
    next_1_hours: Option<Period>,
    next_6_hours: Option<Period>,
}

#[derive(Debug, Deserialize)]
struct Instant {
    details: InstantDetails,
}

#[derive(Debug, Default, Deserialize)]
struct InstantDetails {
    air_temperature: Option<f64>,
    wind_speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Period {
    summary: Option<PeriodSummary>,
    details: Option<PeriodDetails>,
}

#[derive(Debug, Deserialize)]
struct PeriodSummary {
    symbol_code: String,
}

#[derive(Debug, Default, Deserialize)]
struct PeriodDetails {
    probability_of_precipitation: Option<f64>,
}

/// Precipitation type from a MET symbol code such as `lightsnowshowers_day`
pub fn precip_from_symbol(symbol: &str) -> PrecipType {
    let symbol = symbol.to_ascii_lowercase();
    if symbol.contains("sleet") {
        PrecipType::Mixed
    } else if symbol.contains("snow") {
        PrecipType::Snow
    } else if symbol.contains("rain") || symbol.contains("thunder") {
        PrecipType::Rain
    } else {
        PrecipType::None
    }
}

pub struct MetNoAdapter {
    ctx: HttpContext,
    base_url: String,
}

impl MetNoAdapter {
    pub fn new(ctx: HttpContext, config: &MetNoConfig) -> Self {
        Self {
            ctx,
            base_url: config.base_url.clone().unwrap_or_else(|| MET_NO_BASE.to_string()),
        }
    }

    #[instrument(skip(self, zone), fields(zone = %zone.id), level = "info")]
    pub async fn fetch(
        &self,
        zone: &Zone,
        window: TimeWindow,
        issued_at: DateTime<Utc>,
    ) -> SourceResult<Vec<ForecastRecord>> {
        // The API rejects coordinates with more than four decimals
        let query = [
            ("lat", format!("{:.4}", zone.latitude)),
            ("lon", format!("{:.4}", zone.longitude)),
        ];

        let payload: LocationForecast = self
            .ctx
            .get_json(|client| client.get(&self.base_url).query(&query))
            .await?;

        let mut series = DailySeries::new(self.ctx.tz);
        for step in payload.properties.timeseries {
            let stats = series.at(step.time);
            let details = step.data.instant.details;
            if let Some(t) = details.air_temperature {
                stats.temperature(t);
            }
            if let Some(w) = details.wind_speed {
                stats.wind(w);
            }

            let period = step.data.next_1_hours.or(step.data.next_6_hours);
            if let Some(period) = period {
                if let Some(summary) = period.summary {
                    stats.precip(precip_from_symbol(&summary.symbol_code));
                }
                if let Some(p) = period.details.and_then(|d| d.probability_of_precipitation) {
                    stats.precipitation_prob(p);
                }
            }
        }

        let records = series.into_records(SourceId::MetNo, zone, window, issued_at, None);
        if records.is_empty() {
            return Err(SourceError::data_invalid("no target-day data in MET Norway timeseries"));
        }
        Ok(records)
    }
}
