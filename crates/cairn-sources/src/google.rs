//! Google Weather daily forecast adapter (`forecast/days:lookup`).

use cairn_core::{ForecastRecord, GoogleWeatherConfig, PrecipType, SourceId, TimeWindow, Zone};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::daily::{DailySeries, KMH_TO_MS, MPH_TO_MS};
use crate::error::{SourceError, SourceResult};
use crate::http::HttpContext;

const GOOGLE_WEATHER_BASE: &str = "https://weather.googleapis.com/v1/forecast/days:lookup";

/// Provider limit on `days`
const MAX_DAYS: i64 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DaysResponse {
    #[serde(default)]
    forecast_days: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastDay {
    display_date: Option<DisplayDate>,
    max_temperature: Option<Temperature>,
    min_temperature: Option<Temperature>,
    daytime_forecast: Option<DayPart>,
    nighttime_forecast: Option<DayPart>,
}

#[derive(Debug, Deserialize)]
struct DisplayDate {
    year: i32,
    month: u32,
    day: u32,
}

#[derive(Debug, Deserialize)]
struct Temperature {
    degrees: Option<f64>,
    #[serde(default)]
    unit: String,
}

impl Temperature {
    fn celsius(&self) -> Option<f64> {
        let value = self.degrees?;
        if self.unit.to_ascii_uppercase().contains("FAHRENHEIT") {
            Some((value - 32.0) * 5.0 / 9.0)
        } else {
            Some(value)
        }
    }
}

#[derive(Debug, Deserialize)]
struct DayPart {
    wind: Option<Wind>,
    precipitation: Option<Precipitation>,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: Option<Speed>,
}

#[derive(Debug, Deserialize)]
struct Speed {
    value: Option<f64>,
    #[serde(default)]
    unit: String,
}

impl Speed {
    fn metres_per_second(&self) -> Option<f64> {
        let value = self.value?;
        let unit = self.unit.to_ascii_uppercase();
        Some(if unit.contains("MILES_PER_HOUR") {
            value * MPH_TO_MS
        } else if unit.contains("METERS_PER_SECOND") {
            value
        } else {
            value * KMH_TO_MS
        })
    }
}

#[derive(Debug, Deserialize)]
struct Precipitation {
    probability: Option<Probability>,
}

#[derive(Debug, Deserialize)]
struct Probability {
    percent: Option<f64>,
    #[serde(rename = "type", default)]
    kind: String,
}

/// Precipitation type from a Google precipitation type name
pub fn precip_from_type(kind: &str) -> PrecipType {
    let kind = kind.to_ascii_uppercase();
    let snow = kind.contains("SNOW");
    let rain = kind.contains("RAIN") || kind.contains("SHOWER");
    match (snow, rain) {
        (true, true) => PrecipType::Mixed,
        (true, false) => PrecipType::Snow,
        (false, true) => PrecipType::Rain,
        (false, false) if kind.contains("ICE") || kind.contains("HAIL") || kind.contains("SLEET") => {
            PrecipType::Mixed
        }
        _ => PrecipType::None,
    }
}

enum Auth {
    Bearer {
        token: String,
        quota_project: Option<String>,
    },
    ApiKey(String),
}

pub struct GoogleWeatherAdapter {
    ctx: HttpContext,
    auth: Auth,
    units_system: String,
    language_code: String,
    base_url: String,
}

impl GoogleWeatherAdapter {
    /// Prefers an OAuth2 access token over an API key.
    ///
    /// # Errors
    /// Returns `SourceError::NotConfigured` when neither is set.
    pub fn new(ctx: HttpContext, config: &GoogleWeatherConfig) -> SourceResult<Self> {
        let present = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        let auth = match (present(&config.access_token), present(&config.api_key)) {
            (Some(token), _) => Auth::Bearer {
                token,
                quota_project: present(&config.quota_project),
            },
            (None, Some(key)) => Auth::ApiKey(key),
            (None, None) => {
                return Err(SourceError::NotConfigured(
                    "GOOGLE_WEATHER_ACCESS_TOKEN".to_string(),
                ))
            }
        };

        Ok(Self {
            ctx,
            auth,
            units_system: config.units_system.clone(),
            language_code: config.language_code.clone(),
            base_url: config.base_url.clone().unwrap_or_else(|| GOOGLE_WEATHER_BASE.to_string()),
        })
    }

    #[instrument(skip(self, zone), fields(zone = %zone.id), level = "info")]
    pub async fn fetch(
        &self,
        zone: &Zone,
        window: TimeWindow,
        issued_at: DateTime<Utc>,
    ) -> SourceResult<Vec<ForecastRecord>> {
        let today = cairn_core::local_date(issued_at, self.ctx.tz);
        let days = (window.end - today).num_days().clamp(1, MAX_DAYS - 1) + 1;

        let mut query = vec![
            ("location.latitude", format!("{:.6}", zone.latitude)),
            ("location.longitude", format!("{:.6}", zone.longitude)),
            ("days", days.to_string()),
            ("pageSize", days.to_string()),
            ("unitsSystem", self.units_system.clone()),
            ("languageCode", self.language_code.clone()),
        ];
        if let Auth::ApiKey(key) = &self.auth {
            query.push(("key", key.clone()));
        }

        let payload: DaysResponse = self
            .ctx
            .get_json(|client| {
                let mut request = client.get(&self.base_url).query(&query);
                if let Auth::Bearer { token, quota_project } = &self.auth {
                    request = request.bearer_auth(token);
                    if let Some(project) = quota_project {
                        request = request.header("X-Goog-User-Project", project);
                    }
                }
                request
            })
            .await
            .map_err(|e| self.explain(e))?;

        let mut series = DailySeries::new(self.ctx.tz);
        for day in payload.forecast_days {
            let Some(date) = day
                .display_date
                .as_ref()
                .and_then(|d| NaiveDate::from_ymd_opt(d.year, d.month, d.day))
            else {
                continue;
            };
            let stats = series.day(date);
            if let Some(t) = day.max_temperature.as_ref().and_then(Temperature::celsius) {
                stats.temp_max(t);
            }
            if let Some(t) = day.min_temperature.as_ref().and_then(Temperature::celsius) {
                stats.temp_min(t);
            }
            for part in [&day.daytime_forecast, &day.nighttime_forecast].into_iter().flatten() {
                if let Some(ms) = part
                    .wind
                    .as_ref()
                    .and_then(|w| w.speed.as_ref())
                    .and_then(Speed::metres_per_second)
                {
                    stats.wind(ms);
                }
                if let Some(prob) = part.precipitation.as_ref().and_then(|p| p.probability.as_ref()) {
                    if let Some(percent) = prob.percent {
                        stats.precipitation_prob(percent);
                        if percent > 0.0 {
                            stats.precip(precip_from_type(&prob.kind));
                        }
                    }
                }
            }
        }

        let records = series.into_records(SourceId::GoogleWeather, zone, window, issued_at, None);
        if records.is_empty() {
            return Err(SourceError::data_invalid("no target-day data in Google Weather response"));
        }
        Ok(records)
    }

    /// Turn the provider's terse auth rejections into actionable notes.
    fn explain(&self, err: SourceError) -> SourceError {
        match err {
            SourceError::Http { status, message } if status == 401 || status == 403 => {
                let mut message = if message.contains("API keys are not supported by this API") {
                    "API key rejected; use GOOGLE_WEATHER_ACCESS_TOKEN (OAuth2 Bearer token)".to_string()
                } else {
                    message
                };
                let missing_project = matches!(&self.auth, Auth::Bearer { quota_project: None, .. });
                if missing_project && message.to_lowercase().contains("requires a quota project") {
                    message.push_str("; set GOOGLE_WEATHER_QUOTA_PROJECT");
                }
                SourceError::http(status, message)
            }
            other => other,
        }
    }
}
