//! Source registry and bounded parallel fetching.
//!
//! `SourceAdapter` wraps every provider behind one `fetch` capability so the
//! registry can treat them uniformly. Adapters hold no shared mutable state;
//! failures are captured per (source, zone) pair and never abort the others.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use cairn_core::{Config, ForecastRecord, SourceId, SourcesConfig, TimeWindow, Zone, ZoneId};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{SourceError, SourceResult};
use crate::google::GoogleWeatherAdapter;
use crate::http::HttpContext;
use crate::met_no::MetNoAdapter;
use crate::met_office::MetOfficeAdapter;
use crate::open_meteo::OpenMeteoAdapter;
use crate::openweather::OpenWeatherAdapter;

/// A forecast provider adapter.
pub enum SourceAdapter {
    MetOffice(MetOfficeAdapter),
    MetNo(MetNoAdapter),
    OpenMeteo(OpenMeteoAdapter),
    OpenWeather(OpenWeatherAdapter),
    GoogleWeather(GoogleWeatherAdapter),
}

impl SourceAdapter {
    /// Build the adapter for `source` from its settings.
    ///
    /// # Errors
    /// Returns `SourceError::NotConfigured` when credentials are missing.
    pub fn build(source: SourceId, ctx: HttpContext, config: &SourcesConfig) -> SourceResult<Self> {
        Ok(match source {
            SourceId::MetOffice => Self::MetOffice(MetOfficeAdapter::new(ctx, &config.met_office)?),
            SourceId::MetNo => Self::MetNo(MetNoAdapter::new(ctx, &config.met_no)),
            SourceId::OpenMeteo => Self::OpenMeteo(OpenMeteoAdapter::new(ctx, &config.open_meteo)),
            SourceId::OpenWeather => {
                Self::OpenWeather(OpenWeatherAdapter::new(ctx, &config.openweather)?)
            }
            SourceId::GoogleWeather => {
                Self::GoogleWeather(GoogleWeatherAdapter::new(ctx, &config.google_weather)?)
            }
        })
    }

    pub fn source_id(&self) -> SourceId {
        match self {
            Self::MetOffice(_) => SourceId::MetOffice,
            Self::MetNo(_) => SourceId::MetNo,
            Self::OpenMeteo(_) => SourceId::OpenMeteo,
            Self::OpenWeather(_) => SourceId::OpenWeather,
            Self::GoogleWeather(_) => SourceId::GoogleWeather,
        }
    }

    /// Fetch and normalise the forecast for one zone.
    pub async fn fetch(
        &self,
        zone: &Zone,
        window: TimeWindow,
        issued_at: DateTime<Utc>,
    ) -> SourceResult<Vec<ForecastRecord>> {
        match self {
            Self::MetOffice(a) => a.fetch(zone, window, issued_at).await,
            Self::MetNo(a) => a.fetch(zone, window, issued_at).await,
            Self::OpenMeteo(a) => a.fetch(zone, window, issued_at).await,
            Self::OpenWeather(a) => a.fetch(zone, window, issued_at).await,
            Self::GoogleWeather(a) => a.fetch(zone, window, issued_at).await,
        }
    }
}

/// First failure message per source for the current run.
#[derive(Debug, Default)]
pub struct SourceNotes {
    notes: Mutex<BTreeMap<SourceId, String>>,
}

impl SourceNotes {
    /// Record `message` unless the source already has a note.
    pub fn note_once(&self, source: SourceId, message: impl Into<String>) {
        let message = message.into();
        if message.is_empty() {
            return;
        }
        self.notes.lock().entry(source).or_insert(message);
    }

    pub fn snapshot(&self) -> BTreeMap<SourceId, String> {
        self.notes.lock().clone()
    }
}

/// Result of one (source, zone) fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    pub source_id: SourceId,
    pub zone_id: ZoneId,
    pub result: SourceResult<Vec<ForecastRecord>>,
}

/// Everything a parallel fetch produced.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Ordered by source priority, then zone order
    pub outcomes: Vec<FetchOutcome>,
    pub notes: BTreeMap<SourceId, String>,
}

impl FetchReport {
    pub fn records(&self) -> impl Iterator<Item = &ForecastRecord> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .flatten()
    }

    /// Whether `source` delivered records for `zone` in this fetch.
    pub fn succeeded(&self, source: SourceId, zone: &ZoneId) -> bool {
        self.outcomes.iter().any(|o| {
            o.source_id == source
                && &o.zone_id == zone
                && o.result.as_ref().is_ok_and(|r| !r.is_empty())
        })
    }

    /// Sources that produced nothing for any zone
    pub fn failed_sources(&self) -> Vec<SourceId> {
        let mut succeeded: BTreeMap<SourceId, bool> = BTreeMap::new();
        for outcome in &self.outcomes {
            let ok = outcome.result.as_ref().is_ok_and(|r| !r.is_empty());
            *succeeded.entry(outcome.source_id).or_insert(false) |= ok;
        }
        succeeded
            .into_iter()
            .filter_map(|(source, ok)| (!ok).then_some(source))
            .collect()
    }
}

/// Adapters for the enabled, configured sources.
pub struct SourceRegistry {
    adapters: Vec<Arc<SourceAdapter>>,
    not_configured: Vec<(SourceId, String)>,
    call_timeout: Duration,
    max_parallel: usize,
}

impl SourceRegistry {
    /// Build adapters for every enabled source in priority order.
    ///
    /// Sources missing credentials are listed in [`not_configured`](Self::not_configured).
    ///
    /// # Errors
    /// Fails only when the HTTP client cannot be constructed.
    pub fn from_config(config: &Config, tz: Tz) -> SourceResult<Self> {
        let sources = &config.sources;
        let ctx = HttpContext::new(sources, tz)?;

        let mut enabled = sources.enabled.clone();
        enabled.sort_by_key(|s| (sources.priority_rank(*s), *s));
        enabled.dedup();

        let mut adapters = Vec::new();
        let mut not_configured = Vec::new();
        for source in enabled {
            match SourceAdapter::build(source, ctx.clone(), sources) {
                Ok(adapter) => adapters.push(Arc::new(adapter)),
                Err(SourceError::NotConfigured(setting)) => {
                    tracing::info!("{} not configured ({} missing)", source.label(), setting);
                    not_configured.push((source, setting));
                }
                Err(e) => return Err(e),
            }
        }

        let retries = sources.retry.max_retries;
        let call_timeout = Duration::from_secs(sources.request_timeout_secs) * (retries + 1)
            + Duration::from_millis(sources.retry.max_delay_ms) * retries;

        Ok(Self {
            adapters,
            not_configured,
            call_timeout,
            max_parallel: sources.max_parallel_fetches.max(1),
        })
    }

    pub fn sources(&self) -> Vec<SourceId> {
        self.adapters.iter().map(|a| a.source_id()).collect()
    }

    /// Enabled sources skipped for missing credentials, with the missing setting
    pub fn not_configured(&self) -> &[(SourceId, String)] {
        &self.not_configured
    }

    /// Fetch every (source, zone) pair with bounded parallelism.
    pub async fn fetch_all(
        &self,
        zones: &[Zone],
        window: TimeWindow,
        issued_at: DateTime<Utc>,
    ) -> FetchReport {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let notes = Arc::new(SourceNotes::default());
        let mut tasks = JoinSet::new();

        for (source_idx, adapter) in self.adapters.iter().enumerate() {
            for (zone_idx, zone) in zones.iter().enumerate() {
                let adapter = Arc::clone(adapter);
                let semaphore = Arc::clone(&semaphore);
                let notes = Arc::clone(&notes);
                let zone = zone.clone();
                let call_timeout = self.call_timeout;

                tasks.spawn(async move {
                    let source_id = adapter.source_id();
                    let result = match semaphore.acquire_owned().await {
                        Ok(_permit) => {
                            match tokio::time::timeout(
                                call_timeout,
                                adapter.fetch(&zone, window, issued_at),
                            )
                            .await
                            {
                                Ok(result) => result,
                                Err(_) => Err(SourceError::Unavailable(format!(
                                    "timed out after {}s",
                                    call_timeout.as_secs()
                                ))),
                            }
                        }
                        Err(_) => Err(SourceError::Unavailable("fetch cancelled".to_string())),
                    };

                    if let Err(e) = &result {
                        tracing::warn!("{} failed for {}: {}", source_id.label(), zone.id, e);
                        notes.note_once(source_id, e.user_message());
                    }

                    (
                        (source_idx, zone_idx),
                        FetchOutcome {
                            source_id,
                            zone_id: zone.id.clone(),
                            result,
                        },
                    )
                });
            }
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!("Fetch task aborted: {}", e),
            }
        }
        outcomes.sort_by_key(|(order, _)| *order);

        let report = FetchReport {
            outcomes: outcomes.into_iter().map(|(_, o)| o).collect(),
            notes: notes.snapshot(),
        };
        tracing::info!(
            "Fetched {} records from {} source/zone pairs",
            report.records().count(),
            report.outcomes.len()
        );
        report
    }
}
