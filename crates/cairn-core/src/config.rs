use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;
use crate::types::{SourceId, Zone, ZoneId};

/// File name of the forecast store inside `data_dir`
pub const STORE_FILE_NAME: &str = "weather_benchmark.sqlite3";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the forecast store
    pub data_dir: PathBuf,

    /// IANA timezone defining the calendar day of daily forecasts
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Number of days ahead to fetch, starting tomorrow
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,

    /// Tracked zones, in briefing order
    #[serde(default = "default_zones")]
    pub zones: Vec<Zone>,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub benchmark: BenchmarkConfig,

    #[serde(default)]
    pub suitability: SuitabilityConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

fn default_timezone() -> String {
    "Europe/London".to_string()
}

fn default_forecast_days() -> u32 {
    1
}

fn default_zones() -> Vec<Zone> {
    [
        ("glencoe", "Glencoe", 56.68, -5.10),
        ("ben_nevis", "Ben Nevis", 56.7969, -5.0036),
        ("glenshee", "Glenshee", 56.8526, -3.4258),
        ("cairngorms", "Cairngorms", 57.1, -3.7),
    ]
    .into_iter()
    .map(|(id, name, latitude, longitude)| Zone {
        id: ZoneId::from(id),
        name: name.to_string(),
        latitude,
        longitude,
        pdf_links: Vec::new(),
    })
    .collect()
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Forecast source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Sources to fetch; those lacking credentials are reported as not configured
    #[serde(default = "default_enabled_sources")]
    pub enabled: Vec<SourceId>,

    /// Tie-break order when confidence and sample count are equal
    #[serde(default = "default_enabled_sources")]
    pub priority: Vec<SourceId>,

    /// Per-request timeout; an adapter call with retries is bounded by
    /// `(retry.max_retries + 1)` times this plus backoff
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_parallel_fetches")]
    pub max_parallel_fetches: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub met_office: MetOfficeConfig,

    #[serde(default)]
    pub met_no: MetNoConfig,

    #[serde(default)]
    pub open_meteo: OpenMeteoConfig,

    #[serde(default)]
    pub openweather: OpenWeatherConfig,

    #[serde(default)]
    pub google_weather: GoogleWeatherConfig,
}

fn default_enabled_sources() -> Vec<SourceId> {
    SourceId::ALL.to_vec()
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_max_parallel_fetches() -> usize {
    4
}

fn default_user_agent() -> String {
    "Cairn-WeatherBenchmark/0.1 (+https://github.com/cairn-weather/cairn)".to_string()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_sources(),
            priority: default_enabled_sources(),
            request_timeout_secs: default_request_timeout_secs(),
            max_parallel_fetches: default_max_parallel_fetches(),
            user_agent: default_user_agent(),
            retry: RetrySettings::default(),
            met_office: MetOfficeConfig::default(),
            met_no: MetNoConfig::default(),
            open_meteo: OpenMeteoConfig::default(),
            openweather: OpenWeatherConfig::default(),
            google_weather: GoogleWeatherConfig::default(),
        }
    }
}

/// Within-run retry policy for provider requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 250,
            max_delay_ms: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetOfficeConfig {
    #[serde(default = "env_metoffice_key")]
    pub api_key: Option<String>,
    #[serde(default = "default_metoffice_datasource")]
    pub datasource: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

fn env_metoffice_key() -> Option<String> {
    env_value("METOFFICE_API_KEY")
}

fn default_metoffice_datasource() -> String {
    "BD1".to_string()
}

impl Default for MetOfficeConfig {
    fn default() -> Self {
        Self {
            api_key: env_metoffice_key(),
            datasource: default_metoffice_datasource(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetNoConfig {
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenMeteoConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    /// Reanalysis archive used as the default ground truth
    #[serde(default)]
    pub archive_base_url: Option<String>,
}

/// Which OpenWeather API family to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OpenWeatherMode {
    /// One Call 3.0 first, then the 2.5 forecast
    #[default]
    Auto,
    OneCall,
    Forecast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenWeatherConfig {
    #[serde(default = "env_openweather_key")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub mode: OpenWeatherMode,
    #[serde(default)]
    pub onecall_base_url: Option<String>,
    #[serde(default)]
    pub forecast_base_url: Option<String>,
}

fn env_openweather_key() -> Option<String> {
    env_value("OPENWEATHER_API_KEY")
}

impl Default for OpenWeatherConfig {
    fn default() -> Self {
        Self {
            api_key: env_openweather_key(),
            mode: OpenWeatherMode::Auto,
            onecall_base_url: None,
            forecast_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleWeatherConfig {
    #[serde(default = "env_google_key")]
    pub api_key: Option<String>,
    /// OAuth2 bearer token; preferred over the API key when both are set
    #[serde(default = "env_google_token")]
    pub access_token: Option<String>,
    #[serde(default = "env_google_quota_project")]
    pub quota_project: Option<String>,
    #[serde(default = "default_units_system")]
    pub units_system: String,
    #[serde(default = "default_language_code")]
    pub language_code: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

fn env_google_key() -> Option<String> {
    env_value("GOOGLE_WEATHER_API_KEY")
}

fn env_google_token() -> Option<String> {
    env_value("GOOGLE_WEATHER_ACCESS_TOKEN")
}

fn env_google_quota_project() -> Option<String> {
    env_value("GOOGLE_WEATHER_QUOTA_PROJECT").or_else(|| env_value("GOOGLE_CLOUD_QUOTA_PROJECT"))
}

fn default_units_system() -> String {
    "METRIC".to_string()
}

fn default_language_code() -> String {
    "en-GB".to_string()
}

impl Default for GoogleWeatherConfig {
    fn default() -> Self {
        Self {
            api_key: env_google_key(),
            access_token: env_google_token(),
            quota_project: env_google_quota_project(),
            units_system: default_units_system(),
            language_code: default_language_code(),
            base_url: None,
        }
    }
}

impl SourcesConfig {
    /// Whether the credentials a source needs are present
    pub fn is_configured(&self, source: SourceId) -> bool {
        fn present(v: &Option<String>) -> bool {
            v.as_deref().is_some_and(|s| !s.trim().is_empty())
        }
        match source {
            SourceId::MetOffice => present(&self.met_office.api_key),
            SourceId::MetNo | SourceId::OpenMeteo => true,
            SourceId::OpenWeather => present(&self.openweather.api_key),
            SourceId::GoogleWeather => {
                present(&self.google_weather.api_key) || present(&self.google_weather.access_token)
            }
        }
    }

    /// Name of the setting that is missing for an unconfigured source
    pub fn missing_credential(source: SourceId) -> &'static str {
        match source {
            SourceId::MetOffice => "METOFFICE_API_KEY",
            SourceId::OpenWeather => "OPENWEATHER_API_KEY",
            SourceId::GoogleWeather => "GOOGLE_WEATHER_ACCESS_TOKEN",
            SourceId::MetNo | SourceId::OpenMeteo => "none",
        }
    }

    /// Position of a source in the tie-break order; unlisted sources sort last
    pub fn priority_rank(&self, source: SourceId) -> usize {
        self.priority
            .iter()
            .position(|s| *s == source)
            .unwrap_or(self.priority.len())
    }
}

/// Where settled "actual" conditions come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroundTruth {
    /// Open-Meteo reanalysis archive
    #[default]
    Archive,
    /// Treat one source's final forecast as the actual; that source is not benchmarked
    Source { source: SourceId },
}

/// Per-variable normalisation scales; an error equal to the scale counts as 1.0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationScales {
    /// °C
    pub temperature: f64,
    /// m/s
    pub wind_speed: f64,
    /// percentage points
    pub precipitation_prob: f64,
    /// km
    pub visibility: f64,
}

impl Default for NormalizationScales {
    fn default() -> Self {
        Self {
            temperature: 6.0,
            wind_speed: 20.0,
            precipitation_prob: 100.0,
            visibility: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Exponential weighting factor for the rolling error
    pub alpha: f64,
    /// Samples required before a score is trusted
    pub min_samples: u32,
    /// Confidence reported while history is insufficient
    pub neutral_confidence: f64,
    #[serde(default)]
    pub ground_truth: GroundTruth,
    #[serde(default)]
    pub scales: NormalizationScales,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            min_samples: 5,
            neutral_confidence: 50.0,
            ground_truth: GroundTruth::Archive,
            scales: NormalizationScales::default(),
        }
    }
}

/// Threshold rules for activity suitability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuitabilityConfig {
    /// Wind at or below this (m/s) favours cycling and hiking
    pub calm_wind_ms: f64,
    /// Wind at or above this (m/s) penalises cycling and hiking
    pub breezy_wind_ms: f64,
    /// Wind at or above this (m/s) penalises every activity
    pub gale_wind_ms: f64,
    /// Daily max at or above this (°C) is too warm for effort or snow
    pub warm_temp_c: f64,
    /// Daily min at or below this (°C) is a hard frost
    pub hard_frost_c: f64,
    /// Comfortable band for cycling and hiking
    pub comfortable_min_c: f64,
    pub comfortable_max_c: f64,
    /// Daily min must stay above this (°C) for the comfortable bonus
    pub comfortable_floor_c: f64,
    /// Daily max bands for snow quality
    pub ski_cold_max_c: f64,
    pub ski_cool_max_c: f64,
    pub ski_thaw_max_c: f64,
    /// Skiing needs the daily min at or below this (°C)
    pub ski_freezing_c: f64,
    /// Skiing needs visibility at or above this (km)
    pub ski_min_visibility_km: f64,
    /// Precipitation probability bands, %
    pub wet_precip_pct: f64,
    pub showery_precip_pct: f64,
    /// Visibility bands, km
    pub poor_visibility_km: f64,
    pub hazy_visibility_km: f64,
}

impl Default for SuitabilityConfig {
    fn default() -> Self {
        Self {
            calm_wind_ms: 5.0,
            breezy_wind_ms: 8.5,
            gale_wind_ms: 11.0,
            warm_temp_c: 22.0,
            hard_frost_c: -3.0,
            comfortable_min_c: 3.0,
            comfortable_max_c: 18.0,
            comfortable_floor_c: -1.0,
            ski_cold_max_c: 3.0,
            ski_cool_max_c: 6.0,
            ski_thaw_max_c: 10.0,
            ski_freezing_c: 0.0,
            ski_min_visibility_km: 1.0,
            wet_precip_pct: 70.0,
            showery_precip_pct: 40.0,
            poor_visibility_km: 1.0,
            hazy_visibility_km: 5.0,
        }
    }
}

/// Full-forecast PDF catalog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Scrape the MWIS forecast index for shared PDF links
    pub mwis_enabled: bool,
    pub mwis_index_url: String,
    pub max_links: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            mwis_enabled: true,
            mwis_index_url: "https://www.mwis.org.uk/forecasts".to_string(),
            max_links: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cairn");

        Self {
            data_dir,
            timezone: default_timezone(),
            forecast_days: default_forecast_days(),
            zones: default_zones(),
            sources: SourcesConfig::default(),
            benchmark: BenchmarkConfig::default(),
            suitability: SuitabilityConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors; warnings are logged.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Parsed timezone
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }

    /// Path of the SQLite forecast store
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }

    pub fn zone(&self, id: &ZoneId) -> Option<&Zone> {
        self.zones.iter().find(|z| &z.id == id)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.tz().is_err() {
            result.add_error("timezone", format!("Unknown timezone: {}", self.timezone));
        }

        if self.forecast_days == 0 {
            result.add_error("forecast_days", "At least one forecast day is required");
        } else if self.forecast_days > 7 {
            result.add_warning("forecast_days", "Most providers only forecast about a week ahead");
        }

        self.validate_zones(&mut result);
        self.validate_sources(&mut result);
        self.validate_benchmark(&mut result);

        if self.catalog.mwis_enabled {
            self.validate_url(&self.catalog.mwis_index_url, "catalog.mwis_index_url", &mut result);
        }

        result
    }

    fn validate_zones(&self, result: &mut ValidationResult) {
        if self.zones.is_empty() {
            result.add_error("zones", "At least one zone is required");
        }

        let mut seen = HashSet::new();
        for (i, zone) in self.zones.iter().enumerate() {
            let field = format!("zones[{}]", i);
            if zone.id.as_str().trim().is_empty() {
                result.add_error(&field, "Zone id must not be empty");
            } else if !seen.insert(zone.id.clone()) {
                result.add_error(&field, format!("Duplicate zone id: {}", zone.id));
            }
            if !(-90.0..=90.0).contains(&zone.latitude) {
                result.add_error(&field, format!("Latitude out of range: {}", zone.latitude));
            }
            if !(-180.0..=180.0).contains(&zone.longitude) {
                result.add_error(&field, format!("Longitude out of range: {}", zone.longitude));
            }
            for link in &zone.pdf_links {
                self.validate_url(link, &format!("{}.pdf_links", field), result);
            }
        }
    }

    fn validate_sources(&self, result: &mut ValidationResult) {
        let sources = &self.sources;

        if sources.enabled.is_empty() {
            result.add_error("sources.enabled", "At least one source must be enabled");
        }
        if sources.max_parallel_fetches == 0 {
            result.add_error("sources.max_parallel_fetches", "Must be greater than 0");
        }
        if sources.request_timeout_secs == 0 {
            result.add_error("sources.request_timeout_secs", "Must be greater than 0");
        } else if sources.request_timeout_secs > 300 {
            result.add_warning(
                "sources.request_timeout_secs",
                "Timeout above 5 minutes will stretch the run considerably",
            );
        }

        for source in &sources.enabled {
            if !sources.priority.contains(source) {
                result.add_warning(
                    "sources.priority",
                    format!("{} is enabled but has no priority; it sorts last", source),
                );
            }
            if !sources.is_configured(*source) {
                result.add_warning(
                    "sources.enabled",
                    format!(
                        "{} not configured ({} missing)",
                        source,
                        SourcesConfig::missing_credential(*source)
                    ),
                );
            }
        }

        let overrides = [
            ("sources.met_office.base_url", &sources.met_office.base_url),
            ("sources.met_no.base_url", &sources.met_no.base_url),
            ("sources.open_meteo.base_url", &sources.open_meteo.base_url),
            ("sources.open_meteo.archive_base_url", &sources.open_meteo.archive_base_url),
            ("sources.openweather.onecall_base_url", &sources.openweather.onecall_base_url),
            ("sources.openweather.forecast_base_url", &sources.openweather.forecast_base_url),
            ("sources.google_weather.base_url", &sources.google_weather.base_url),
        ];
        for (field, value) in overrides {
            if let Some(url) = value {
                self.validate_url(url, field, result);
            }
        }
    }

    fn validate_benchmark(&self, result: &mut ValidationResult) {
        let bench = &self.benchmark;

        if !(bench.alpha > 0.0 && bench.alpha <= 1.0) {
            result.add_error("benchmark.alpha", "Alpha must be in (0, 1]");
        }
        if bench.min_samples == 0 {
            result.add_error("benchmark.min_samples", "Must be at least 1");
        }
        if !(0.0..=100.0).contains(&bench.neutral_confidence) {
            result.add_error("benchmark.neutral_confidence", "Must be within 0-100");
        }

        let scales = [
            ("benchmark.scales.temperature", bench.scales.temperature),
            ("benchmark.scales.wind_speed", bench.scales.wind_speed),
            ("benchmark.scales.precipitation_prob", bench.scales.precipitation_prob),
            ("benchmark.scales.visibility", bench.scales.visibility),
        ];
        for (field, scale) in scales {
            if !(scale.is_finite() && scale > 0.0) {
                result.add_error(field, "Scale must be a positive number");
            }
        }

        if let GroundTruth::Source { source } = bench.ground_truth {
            if !self.sources.enabled.contains(&source) {
                result.add_warning(
                    "benchmark.ground_truth",
                    format!("Ground-truth source {} is not enabled; no actuals will be produced", source),
                );
            }
        }
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }
                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to a file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the default configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("cairn");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_default_zones() {
        let config = Config::default();
        let names: Vec<_> = config.zones.iter().map(|z| z.name.as_str()).collect();
        assert_eq!(names, vec!["Glencoe", "Ben Nevis", "Glenshee", "Cairngorms"]);
    }

    #[test]
    fn test_unknown_timezone() {
        let mut config = Config::default();
        config.timezone = "Mars/Olympus_Mons".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "timezone"));
        assert!(matches!(config.tz(), Err(ConfigError::UnknownTimezone(_))));
    }

    #[test]
    fn test_alpha_out_of_range() {
        let mut config = Config::default();
        config.benchmark.alpha = 0.0;
        assert!(config.validate().errors.iter().any(|e| e.field == "benchmark.alpha"));
        config.benchmark.alpha = 1.5;
        assert!(config.validate().errors.iter().any(|e| e.field == "benchmark.alpha"));
    }

    #[test]
    fn test_duplicate_zone_ids() {
        let mut config = Config::default();
        let dup = config.zones[0].clone();
        config.zones.push(dup);
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.message.contains("Duplicate zone id")));
    }

    #[test]
    fn test_invalid_pdf_link_scheme() {
        let mut config = Config::default();
        config.zones[0].pdf_links.push("ftp://example.com/a.pdf".to_string());
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_missing_credentials_is_warning() {
        let mut config = Config::default();
        config.sources.met_office.api_key = None;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.message.contains("METOFFICE_API_KEY")));
    }

    #[test]
    fn test_is_configured() {
        let mut sources = SourcesConfig::default();
        sources.openweather.api_key = Some("  ".to_string());
        assert!(!sources.is_configured(SourceId::OpenWeather));
        sources.openweather.api_key = Some("key".to_string());
        assert!(sources.is_configured(SourceId::OpenWeather));
        assert!(sources.is_configured(SourceId::MetNo));
    }

    #[test]
    fn test_priority_rank() {
        let mut sources = SourcesConfig::default();
        sources.priority = vec![SourceId::MetNo, SourceId::OpenMeteo];
        assert_eq!(sources.priority_rank(SourceId::MetNo), 0);
        assert_eq!(sources.priority_rank(SourceId::OpenMeteo), 1);
        assert_eq!(sources.priority_rank(SourceId::MetOffice), 2);
    }

    #[test]
    fn test_ground_truth_toml() {
        let toml_src = r#"
            alpha = 0.3
            min_samples = 3
            neutral_confidence = 50.0
            ground_truth = { kind = "source", source = "met_office" }
        "#;
        let bench: BenchmarkConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(bench.ground_truth, GroundTruth::Source { source: SourceId::MetOffice });
        assert_eq!(bench.scales.wind_speed, 20.0);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.forecast_days = 2;
        config.zones.truncate(1);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.forecast_days, 2);
        assert_eq!(loaded.zones.len(), 1);
        assert_eq!(loaded.zones[0].id, ZoneId::from("glencoe"));
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config: Config = toml::from_str(r#"data_dir = "/tmp/cairn""#).unwrap();
        assert_eq!(config.timezone, "Europe/London");
        assert_eq!(config.zones.len(), 4);
        assert_eq!(config.benchmark.min_samples, 5);
        assert_eq!(config.store_path(), PathBuf::from("/tmp/cairn").join(STORE_FILE_NAME));
    }
}
