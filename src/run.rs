//! One batch run: fetch, store, benchmark, compose.

use std::collections::BTreeMap;

use cairn_benchmark::{actuals_from_source, evaluate_latest, BenchmarkEngine, LatestBenchmark};
use cairn_briefing::{BriefingReport, Composer, SourceSummary};
use cairn_core::{
    local_date, local_midnight_utc, offset_day, ActualObservation, Config, ForecastRecord,
    GroundTruth, SourceId, TimeWindow, Zone, ZoneId,
};
use cairn_sources::{FetchReport, HttpContext, MwisCatalog, ObservationAdapter, SourceRegistry};
use cairn_store::{EvaluationRecord, ForecastStore, RunRecord, WeightRecord};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RunError;

/// Capture settled actuals for `day` into the store.
///
/// Returns how many new observations were written.
async fn capture_actuals<S: ForecastStore + ?Sized>(
    config: &Config,
    store: &S,
    truth: GroundTruth,
    tz: Tz,
    day: NaiveDate,
    now: DateTime<Utc>,
) -> Result<usize, RunError> {
    let mut observations: Vec<ActualObservation> = Vec::new();

    match truth {
        GroundTruth::Archive => {
            let ctx = HttpContext::new(&config.sources, tz)?;
            let archive = ObservationAdapter::new(ctx, &config.sources.open_meteo);
            for zone in &config.zones {
                match archive.fetch_actuals(zone, TimeWindow::single(day), now).await {
                    Ok(obs) => observations.extend(obs),
                    Err(e) => warn!("No actuals for {}: {}", zone.id, e.user_message()),
                }
            }
        }
        GroundTruth::Source { source } => {
            let instant = local_midnight_utc(day, tz);
            for zone in &config.zones {
                observations.extend(actuals_from_source(store, source, &zone.id, &[instant], now)?);
            }
        }
    }

    let mut inserted = 0;
    for obs in &observations {
        if store.append_actual(obs)? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Produce the briefing for every configured zone.
///
/// Adapter failures are contained and reported in the briefing; a store
/// failure aborts the run before anything is composed.
///
/// # Errors
/// Returns `RunError::Store` on any fatal store failure and
/// `RunError::Config` / `RunError::Sources` when the run cannot be set up.
pub async fn produce_briefing<S: ForecastStore + ?Sized>(
    config: &Config,
    store: &S,
    now: DateTime<Utc>,
) -> Result<BriefingReport, RunError> {
    let run_id = Uuid::new_v4();
    let tz = config.tz()?;
    let today = local_date(now, tz);
    let target_date = offset_day(today, 1);
    let last_day = offset_day(today, i64::from(config.forecast_days.max(1)));
    let window = TimeWindow::new(target_date, last_day);
    let eval_day = offset_day(today, -1);
    info!(%run_id, "Briefing run for {} (evaluating {})", target_date, eval_day);

    let engine = BenchmarkEngine::new(&config.benchmark)?;
    let registry = SourceRegistry::from_config(config, tz)?;
    let sources = registry.sources();

    let catalog = if config.catalog.mwis_enabled {
        Some(MwisCatalog::new(HttpContext::new(&config.sources, tz)?, &config.catalog)?)
    } else {
        None
    };
    let links = async {
        match &catalog {
            Some(catalog) => catalog.latest_links().await,
            None => Vec::new(),
        }
    };
    let (fetched, shared_links) = tokio::join!(registry.fetch_all(&config.zones, window, now), links);

    let records: Vec<_> = fetched.records().cloned().collect();
    let appended = store.append(&records)?;
    info!(
        "Stored {} new forecasts ({} already present)",
        appended.inserted, appended.duplicates
    );

    let actuals_inserted =
        capture_actuals(config, store, config.benchmark.ground_truth, tz, eval_day, now).await?;

    let zone_ids: Vec<ZoneId> = config.zones.iter().map(|z| z.id.clone()).collect();
    let recomputed = engine.recompute(store, &sources, &zone_ids, now)?;
    info!(
        "Scored {} forecast/actual pairs ({} skipped)",
        recomputed.pairs_scored, recomputed.pairs_skipped
    );
    let latest_benchmark = evaluate_latest(store, &engine, &sources, &zone_ids, now)?;

    let composer = Composer::new(
        config.suitability.clone(),
        config.sources.priority.clone(),
        engine.rules().neutral_confidence,
    );
    let target_instant = local_midnight_utc(target_date, tz);

    let mut briefings = Vec::with_capacity(config.zones.len());
    let mut scores_by_zone = BTreeMap::new();
    let mut available: Vec<SourceId> = Vec::new();
    for zone in &config.zones {
        let predictions = current_predictions(store, zone, target_instant, &fetched, now)?;
        for record in &predictions {
            if !available.contains(&record.source_id) {
                available.push(record.source_id);
            }
        }
        let scores = store.load_scores(&zone.id)?;
        briefings.push(composer.compose_zone(zone, &predictions, &scores, now));
        scores_by_zone.insert(zone.id.clone(), scores);
    }
    available.sort_by_key(|s| sources.iter().position(|x| x == s));

    let summaries = composer.summarize_sources(&sources, &available, &scores_by_zone, &zone_ids);

    record_history(store, run_id, target_date, latest_benchmark.as_ref(), &summaries)?;

    let failed = fetched.failed_sources();
    let failed_sources: Vec<(SourceId, String)> = failed
        .iter()
        .map(|s| {
            let note = fetched
                .notes
                .get(s)
                .cloned()
                .unwrap_or_else(|| "no data for the target day".to_string());
            (*s, note)
        })
        .collect();

    let zones_unavailable = briefings.iter().filter(|b| b.is_unavailable()).count();
    if zones_unavailable > 0 {
        warn!("{} zone(s) without a usable forecast", zones_unavailable);
    }

    store.record_run(&RunRecord {
        run_id,
        started_at: now,
        finished_at: Utc::now().max(now),
        records_inserted: appended.inserted,
        records_duplicate: appended.duplicates,
        actuals_inserted,
        failed_sources: failed,
        zones_unavailable,
    })?;

    Ok(BriefingReport {
        run_id,
        generated_at: now,
        target_date,
        briefings,
        latest_benchmark,
        sources: summaries,
        failed_sources,
        not_configured: registry.not_configured().to_vec(),
        shared_links,
    })
}

/// Append this run's benchmark rows and ensemble weights to the dated history.
fn record_history<S: ForecastStore + ?Sized>(
    store: &S,
    run_id: Uuid,
    target_date: NaiveDate,
    latest: Option<&LatestBenchmark>,
    summaries: &[SourceSummary],
) -> Result<(), RunError> {
    if let Some(latest) = latest {
        let rows: Vec<EvaluationRecord> = latest
            .rows
            .iter()
            .map(|row| EvaluationRecord {
                observed_at: latest.observed_at,
                source_id: row.source_id,
                zones: row.zones,
                mean_abs_error: row.mean_abs_error.clone(),
                confidence_pct: row.confidence_pct,
                run_id,
            })
            .collect();
        let inserted = store.record_evaluations(&rows)?;
        debug!("Recorded {} benchmark rows for {}", inserted, latest.observed_at.date_naive());
    }

    let weights: Vec<WeightRecord> = summaries
        .iter()
        .map(|s| WeightRecord {
            target_date,
            source_id: s.source_id,
            weight: s.weight,
            confidence_pct: s.confidence_pct,
            sample_count: s.sample_count,
            run_id,
        })
        .collect();
    store.record_weights(&weights)?;
    Ok(())
}

/// Predictions for the target instant that this run fetched and stored.
///
/// Records left over from earlier runs never reach the briefing: a source
/// that failed for the zone this run is excluded even if history has a
/// forecast for the same day. Issue times round-trip through the store at
/// millisecond precision.
fn current_predictions<S: ForecastStore + ?Sized>(
    store: &S,
    zone: &Zone,
    target: DateTime<Utc>,
    fetched: &FetchReport,
    issued_at: DateTime<Utc>,
) -> Result<Vec<ForecastRecord>, RunError> {
    Ok(store
        .latest_predictions(&zone.id, target)?
        .into_iter()
        .filter(|r| {
            r.issued_at.timestamp_millis() == issued_at.timestamp_millis()
                && fetched.succeeded(r.source_id, &zone.id)
        })
        .collect())
}
