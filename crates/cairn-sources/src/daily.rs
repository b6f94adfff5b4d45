//! Bucketing of provider time series into zone-local daily records.

use std::collections::BTreeMap;

use cairn_core::{
    local_date, local_midnight_utc, ForecastRecord, PrecipType, SourceId, TimeWindow, Variable,
    Variables, Zone,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Aggregated values for one local day
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayStats {
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub wind_speed: Option<f64>,
    pub precipitation_prob: Option<f64>,
    pub visibility: Option<f64>,
    pub precip_type: Option<PrecipType>,
}

fn keep_max(slot: &mut Option<f64>, value: f64) {
    if value.is_finite() {
        *slot = Some(slot.map_or(value, |v| v.max(value)));
    }
}

fn keep_min(slot: &mut Option<f64>, value: f64) {
    if value.is_finite() {
        *slot = Some(slot.map_or(value, |v| v.min(value)));
    }
}

impl DayStats {
    /// Fold an instantaneous temperature into both extremes
    pub fn temperature(&mut self, value: f64) {
        keep_max(&mut self.temp_max, value);
        keep_min(&mut self.temp_min, value);
    }

    pub fn temp_max(&mut self, value: f64) {
        keep_max(&mut self.temp_max, value);
    }

    pub fn temp_min(&mut self, value: f64) {
        keep_min(&mut self.temp_min, value);
    }

    pub fn wind(&mut self, value: f64) {
        keep_max(&mut self.wind_speed, value);
    }

    pub fn precipitation_prob(&mut self, value: f64) {
        keep_max(&mut self.precipitation_prob, value.clamp(0.0, 100.0));
    }

    /// Visibility in km; the day keeps its minimum
    pub fn visibility(&mut self, value: f64) {
        if value >= 0.0 {
            keep_min(&mut self.visibility, value);
        }
    }

    pub fn precip(&mut self, kind: PrecipType) {
        self.precip_type = Some(self.precip_type.unwrap_or_default().merge(kind));
    }

    pub fn is_empty(&self) -> bool {
        self.to_variables().is_empty()
    }

    pub fn to_variables(&self) -> Variables {
        let mut vars = Variables::new();
        let pairs = [
            (Variable::TempMax, self.temp_max),
            (Variable::TempMin, self.temp_min),
            (Variable::WindSpeed, self.wind_speed),
            (Variable::PrecipitationProb, self.precipitation_prob),
            (Variable::Visibility, self.visibility),
            (Variable::PrecipType, self.precip_type.map(|p| p.code())),
        ];
        for (variable, value) in pairs {
            if let Some(v) = value {
                vars.insert(variable, v);
            }
        }
        vars
    }
}

/// Per-day accumulator keyed by zone-local calendar date
#[derive(Debug, Clone)]
pub struct DailySeries {
    tz: Tz,
    days: BTreeMap<NaiveDate, DayStats>,
}

impl DailySeries {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            days: BTreeMap::new(),
        }
    }

    /// Stats of the local day containing `ts`
    pub fn at(&mut self, ts: DateTime<Utc>) -> &mut DayStats {
        let day = local_date(ts, self.tz);
        self.days.entry(day).or_default()
    }

    /// Stats of a calendar day given directly by the provider
    pub fn day(&mut self, day: NaiveDate) -> &mut DayStats {
        self.days.entry(day).or_default()
    }

    /// One record per day in `window` that has at least one variable
    pub fn into_records(
        self,
        source_id: SourceId,
        zone: &Zone,
        window: TimeWindow,
        issued_at: DateTime<Utc>,
        raw_confidence: Option<f64>,
    ) -> Vec<ForecastRecord> {
        let tz = self.tz;
        self.days
            .into_iter()
            .filter(|(day, stats)| window.contains(*day) && !stats.is_empty())
            .map(|(day, stats)| ForecastRecord {
                source_id,
                zone_id: zone.id.clone(),
                issued_at,
                valid_at: local_midnight_utc(day, tz),
                variables: stats.to_variables(),
                raw_confidence,
            })
            .collect()
    }

    /// Days in `window` with data, paired with their variables
    pub fn into_days(self, window: TimeWindow) -> Vec<(NaiveDate, Variables)> {
        self.days
            .into_iter()
            .filter(|(day, stats)| window.contains(*day) && !stats.is_empty())
            .map(|(day, stats)| (day, stats.to_variables()))
            .collect()
    }
}

/// Parse the timestamp shapes providers emit: RFC 3339, RFC 3339 without
/// seconds (`2025-01-02T09:00Z`), or naive local time interpreted in `tz`.
pub fn parse_timestamp(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Some(stripped) = raw.strip_suffix('Z') {
        if let Ok(naive) = NaiveDateTime::parse_from_str(stripped, "%Y-%m-%dT%H:%M") {
            return Some(naive.and_utc());
        }
    }
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| naive.and_local_timezone(tz).earliest())
        .map(|local| local.with_timezone(&Utc))
}

/// Unix seconds to UTC
pub fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

pub const KMH_TO_MS: f64 = 1.0 / 3.6;
pub const MPH_TO_MS: f64 = 0.44704;
