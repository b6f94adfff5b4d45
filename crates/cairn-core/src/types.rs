use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Forecast provider identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    MetOffice,
    MetNo,
    OpenMeteo,
    #[serde(rename = "openweather")]
    OpenWeather,
    GoogleWeather,
}

impl SourceId {
    /// All known sources, in default priority order (official services first)
    pub const ALL: [SourceId; 5] = [
        SourceId::MetOffice,
        SourceId::MetNo,
        SourceId::OpenMeteo,
        SourceId::OpenWeather,
        SourceId::GoogleWeather,
    ];

    /// Stable wire/storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetOffice => "met_office",
            Self::MetNo => "met_no",
            Self::OpenMeteo => "open_meteo",
            Self::OpenWeather => "openweather",
            Self::GoogleWeather => "google_weather",
        }
    }

    /// Human-readable provider name
    pub fn label(&self) -> &'static str {
        match self {
            Self::MetOffice => "UK Met Office",
            Self::MetNo => "MET Norway",
            Self::OpenMeteo => "Open-Meteo",
            Self::OpenWeather => "OpenWeather",
            Self::GoogleWeather => "Google Weather",
        }
    }

    /// Whether the provider is a national meteorological service
    pub fn is_official(&self) -> bool {
        matches!(self, Self::MetOffice | Self::MetNo)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown source or variable name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for SourceId {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownName {
                kind: "source",
                value: s.to_string(),
            })
    }
}

/// Identifier of a tracked mountain zone
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ZoneId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Forecast variable in canonical units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    /// Daily maximum temperature, °C
    TempMax,
    /// Daily minimum temperature, °C
    TempMin,
    /// Daily maximum sustained wind speed, m/s
    WindSpeed,
    /// Daily maximum precipitation probability, %
    PrecipitationProb,
    /// Daily minimum visibility, km
    Visibility,
    /// Dominant precipitation type, see [`PrecipType::code`]
    PrecipType,
}

impl Variable {
    pub const ALL: [Variable; 6] = [
        Variable::TempMax,
        Variable::TempMin,
        Variable::WindSpeed,
        Variable::PrecipitationProb,
        Variable::Visibility,
        Variable::PrecipType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TempMax => "temp_max",
            Self::TempMin => "temp_min",
            Self::WindSpeed => "wind_speed",
            Self::PrecipitationProb => "precipitation_prob",
            Self::Visibility => "visibility",
            Self::PrecipType => "precip_type",
        }
    }

    pub fn class(&self) -> VariableClass {
        match self {
            Self::TempMax | Self::TempMin => VariableClass::Temp,
            Self::WindSpeed => VariableClass::Wind,
            Self::PrecipitationProb | Self::PrecipType => VariableClass::Precip,
            Self::Visibility => VariableClass::Visibility,
        }
    }

    /// Categorical variables are compared by equality rather than distance
    pub fn is_categorical(&self) -> bool {
        matches!(self, Self::PrecipType)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variable {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownName {
                kind: "variable",
                value: s.to_string(),
            })
    }
}

/// Group of variables scored together
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableClass {
    Temp,
    Wind,
    Precip,
    Visibility,
}

impl VariableClass {
    pub const ALL: [VariableClass; 4] = [
        VariableClass::Temp,
        VariableClass::Wind,
        VariableClass::Precip,
        VariableClass::Visibility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temp => "temp",
            Self::Wind => "wind",
            Self::Precip => "precip",
            Self::Visibility => "visibility",
        }
    }

    /// Variables belonging to this class
    pub fn variables(&self) -> impl Iterator<Item = Variable> + '_ {
        Variable::ALL.into_iter().filter(move |v| v.class() == *self)
    }
}

impl fmt::Display for VariableClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariableClass {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownName {
                kind: "variable class",
                value: s.to_string(),
            })
    }
}

/// Precipitation type, stored as a numeric code under [`Variable::PrecipType`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrecipType {
    #[default]
    None,
    Rain,
    Snow,
    Mixed,
}

impl PrecipType {
    /// Map a WMO weather interpretation code to a precipitation type
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            51..=55 | 61..=65 | 80..=82 | 95 => Self::Rain,
            56 | 57 | 66 | 67 | 96 | 99 => Self::Mixed,
            71..=77 | 85 | 86 => Self::Snow,
            _ => Self::None,
        }
    }

    pub fn code(&self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Rain => 1.0,
            Self::Snow => 2.0,
            Self::Mixed => 3.0,
        }
    }

    /// Decode a stored code. Returns `None` for anything that isn't a known code.
    pub fn from_code(value: f64) -> Option<Self> {
        if !value.is_finite() || value.fract() != 0.0 {
            return None;
        }
        match value as i64 {
            0 => Some(Self::None),
            1 => Some(Self::Rain),
            2 => Some(Self::Snow),
            3 => Some(Self::Mixed),
            _ => None,
        }
    }

    /// Combine two observations of the same day; snow and rain together are mixed
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::None, x) | (x, Self::None) => x,
            (a, b) if a == b => a,
            _ => Self::Mixed,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::None => "dry",
            Self::Rain => "rain",
            Self::Snow => "snow",
            Self::Mixed => "sleet/mixed",
        }
    }
}

/// Variable values keyed by variable
pub type Variables = BTreeMap<Variable, f64>;

/// Unique key of a stored forecast record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub source_id: SourceId,
    pub zone_id: ZoneId,
    pub valid_at: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
}

/// A normalized prediction from one provider for one zone and instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub source_id: SourceId,
    pub zone_id: ZoneId,
    /// When the prediction was fetched
    pub issued_at: DateTime<Utc>,
    /// The instant the prediction describes
    pub valid_at: DateTime<Utc>,
    pub variables: Variables,
    /// Confidence reported by the provider itself, if any
    pub raw_confidence: Option<f64>,
}

impl ForecastRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            source_id: self.source_id,
            zone_id: self.zone_id.clone(),
            valid_at: self.valid_at,
            issued_at: self.issued_at,
        }
    }

    /// Issued strictly before the instant it describes
    pub fn is_ex_ante(&self) -> bool {
        self.issued_at < self.valid_at
    }

    pub fn get(&self, variable: Variable) -> Option<f64> {
        self.variables.get(&variable).copied()
    }
}

/// Best-available actual conditions for a zone at an instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualObservation {
    pub zone_id: ZoneId,
    pub observed_at: DateTime<Utc>,
    pub variables: Variables,
}

impl ActualObservation {
    /// Only settled observations may be used for benchmarking
    pub fn is_settled(&self, now: DateTime<Utc>) -> bool {
        self.observed_at <= now
    }

    pub fn get(&self, variable: Variable) -> Option<f64> {
        self.variables.get(&variable).copied()
    }
}

/// Derived accuracy score of a source for a zone and variable class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceScore {
    pub source_id: SourceId,
    pub zone_id: ZoneId,
    pub variable_class: VariableClass,
    pub sample_count: u32,
    /// Exponentially-weighted mean of normalized error, in [0, 1]
    pub rolling_error: f64,
    /// Derived from `rolling_error`, never set directly
    pub confidence_pct: f64,
}

/// A tracked mountain area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Ordered catalog of full-forecast PDF links for this zone
    #[serde(default)]
    pub pdf_links: Vec<String>,
}

/// Inclusive range of zone-local calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start
            .iter_days()
            .take_while(move |d| *d <= self.end)
    }
}

/// UTC instant of midnight at the start of `day` in `tz`
pub fn local_midnight_utc(day: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = day.and_time(chrono::NaiveTime::MIN);
    match tz.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Midnight skipped by a DST jump; fall back to the UTC reading
        None => Utc.from_utc_datetime(&naive),
    }
}

/// Calendar day of `ts` in `tz`
pub fn local_date(ts: DateTime<Utc>, tz: Tz) -> NaiveDate {
    ts.with_timezone(&tz).date_naive()
}

/// Shift a day by a signed number of days, saturating at the calendar bounds
pub fn offset_day(day: NaiveDate, offset: i64) -> NaiveDate {
    let shifted = if offset >= 0 {
        day.checked_add_days(Days::new(offset.unsigned_abs()))
    } else {
        day.checked_sub_days(Days::new(offset.unsigned_abs()))
    };
    shifted.unwrap_or(day)
}
