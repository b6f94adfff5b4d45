//! SQLite-backed forecast store.
//!
//! Timestamps are stored as INTEGER epoch milliseconds so range scans and
//! ordering happen in SQL; variable maps are stored as JSON text.

use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::path::Path;

use cairn_core::{
    ActualObservation, ForecastRecord, SourceId, SourceScore, Variables, VariableClass, ZoneId,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{StoreError, StoreResult};
use crate::store::{
    AppendOutcome, EvaluationRecord, ForecastStore, Predictions, RunRecord, WeightRecord,
};

/// Rows fetched per page by the prediction cursor
const PAGE_SIZE: usize = 256;

/// SQLite-based forecast store.
pub struct SqliteForecastStore {
    conn: Connection,
}

impl SqliteForecastStore {
    /// Open (or create) a store at the given path.
    ///
    /// Creates the parent directory, database file and schema if they don't exist.
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let store = Self { conn };
        store.init_schema()?;
        tracing::debug!("Opened forecast store at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory store (tests and dry runs).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS forecasts (
                source_id TEXT NOT NULL,
                zone_id TEXT NOT NULL,
                valid_at INTEGER NOT NULL,
                issued_at INTEGER NOT NULL,
                variables TEXT NOT NULL,
                raw_confidence REAL,
                stored_at INTEGER NOT NULL,
                PRIMARY KEY (source_id, zone_id, valid_at, issued_at)
            );

            CREATE INDEX IF NOT EXISTS idx_forecasts_issued
                ON forecasts(source_id, zone_id, issued_at, valid_at);
            CREATE INDEX IF NOT EXISTS idx_forecasts_zone_valid
                ON forecasts(zone_id, valid_at, source_id, issued_at);

            CREATE TABLE IF NOT EXISTS actuals (
                zone_id TEXT NOT NULL,
                observed_at INTEGER NOT NULL,
                variables TEXT NOT NULL,
                stored_at INTEGER NOT NULL,
                PRIMARY KEY (zone_id, observed_at)
            );

            CREATE TABLE IF NOT EXISTS source_scores (
                source_id TEXT NOT NULL,
                zone_id TEXT NOT NULL,
                variable_class TEXT NOT NULL,
                sample_count INTEGER NOT NULL,
                rolling_error REAL NOT NULL,
                confidence_pct REAL NOT NULL,
                computed_at INTEGER NOT NULL,
                PRIMARY KEY (source_id, zone_id, variable_class)
            );

            CREATE TABLE IF NOT EXISTS runs (
                run_id TEXT PRIMARY KEY,
                started_at INTEGER NOT NULL,
                finished_at INTEGER NOT NULL,
                records_inserted INTEGER NOT NULL,
                records_duplicate INTEGER NOT NULL,
                actuals_inserted INTEGER NOT NULL,
                failed_sources TEXT NOT NULL DEFAULT '[]',
                zones_unavailable INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS evaluations (
                observed_at INTEGER NOT NULL,
                source_id TEXT NOT NULL,
                zones INTEGER NOT NULL,
                mean_abs_error TEXT NOT NULL,
                confidence_pct REAL NOT NULL,
                run_id TEXT NOT NULL,
                PRIMARY KEY (observed_at, source_id)
            );

            CREATE TABLE IF NOT EXISTS weights (
                target_date TEXT NOT NULL,
                source_id TEXT NOT NULL,
                run_id TEXT NOT NULL,
                weight REAL NOT NULL,
                confidence_pct REAL NOT NULL,
                sample_count INTEGER NOT NULL,
                PRIMARY KEY (target_date, source_id, run_id)
            );
            "#,
        )?;
        Ok(())
    }

    /// Number of stored forecast rows.
    pub fn forecast_count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM forecasts", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Number of stored actual observations.
    pub fn actual_count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM actuals", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Most recent runs, newest first.
    pub fn list_runs(&self, limit: usize) -> StoreResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, started_at, finished_at, records_inserted, records_duplicate,
                    actuals_inserted, failed_sources, zones_unavailable
             FROM runs ORDER BY started_at DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?;

        let mut runs = Vec::new();
        for row in rows {
            let (id, started, finished, inserted, duplicate, actuals, failed, unavailable) = row?;
            runs.push(RunRecord {
                run_id: parse_run_id(&id)?,
                started_at: from_millis(started)?,
                finished_at: from_millis(finished)?,
                records_inserted: inserted as usize,
                records_duplicate: duplicate as usize,
                actuals_inserted: actuals as usize,
                failed_sources: serde_json::from_str(&failed)
                    .map_err(|e| StoreError::corrupt_row(format!("failed_sources: {}", e)))?,
                zones_unavailable: unavailable as usize,
            });
        }
        Ok(runs)
    }

    /// Dated benchmark history of one source, oldest day first.
    pub fn list_evaluations(&self, source_id: SourceId) -> StoreResult<Vec<EvaluationRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT observed_at, zones, mean_abs_error, confidence_pct, run_id
             FROM evaluations WHERE source_id = ?1 ORDER BY observed_at",
        )?;

        let rows = stmt.query_map(params![source_id.as_str()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut history = Vec::new();
        for row in rows {
            let (observed_at, zones, errors, confidence_pct, run_id) = row?;
            history.push(EvaluationRecord {
                observed_at: from_millis(observed_at)?,
                source_id,
                zones: zones as usize,
                mean_abs_error: decode_variables(&errors)?,
                confidence_pct,
                run_id: parse_run_id(&run_id)?,
            });
        }
        Ok(history)
    }

    /// Weights recorded for a target day, in the order runs wrote them.
    pub fn list_weights(&self, target_date: NaiveDate) -> StoreResult<Vec<WeightRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, run_id, weight, confidence_pct, sample_count
             FROM weights WHERE target_date = ?1 ORDER BY rowid",
        )?;

        let rows = stmt.query_map(params![target_date.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, u32>(4)?,
            ))
        })?;

        let mut weights = Vec::new();
        for row in rows {
            let (source, run_id, weight, confidence_pct, sample_count) = row?;
            let Ok(source_id) = source.parse::<SourceId>() else {
                tracing::warn!("Skipping weight for unknown source: {}", source);
                continue;
            };
            weights.push(WeightRecord {
                target_date,
                source_id,
                weight,
                confidence_pct,
                sample_count,
                run_id: parse_run_id(&run_id)?,
            });
        }
        Ok(weights)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn parse_run_id(raw: &str) -> StoreResult<uuid::Uuid> {
    raw.parse()
        .map_err(|e| StoreError::corrupt_row(format!("run id {}: {}", raw, e)))
}

fn from_millis(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::corrupt_row(format!("timestamp out of range: {}", ms)))
}

/// Serialize variables, dropping values JSON can't represent.
fn encode_variables(variables: &Variables) -> StoreResult<String> {
    let finite: Variables = variables
        .iter()
        .filter(|(variable, value)| {
            let keep = value.is_finite();
            if !keep {
                tracing::warn!("Dropping non-finite value for {}", variable);
            }
            keep
        })
        .map(|(k, v)| (*k, *v))
        .collect();
    serde_json::to_string(&finite)
        .map_err(|e| StoreError::QueryFailed(format!("Failed to encode variables: {}", e)))
}

fn decode_variables(raw: &str) -> StoreResult<Variables> {
    serde_json::from_str(raw).map_err(|e| StoreError::corrupt_row(format!("variables: {}", e)))
}

/// Undecoded forecast row; keeps the raw keys so paging can advance past bad rows.
struct RawForecastRow {
    source_id: String,
    zone_id: String,
    issued_at: i64,
    valid_at: i64,
    variables: String,
    raw_confidence: Option<f64>,
}

const FORECAST_COLUMNS: &str =
    "source_id, zone_id, issued_at, valid_at, variables, raw_confidence";

impl RawForecastRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            source_id: row.get(0)?,
            zone_id: row.get(1)?,
            issued_at: row.get(2)?,
            valid_at: row.get(3)?,
            variables: row.get(4)?,
            raw_confidence: row.get(5)?,
        })
    }

    fn decode(self) -> StoreResult<ForecastRecord> {
        let source_id: SourceId = self
            .source_id
            .parse()
            .map_err(|e| StoreError::corrupt_row(format!("{}", e)))?;
        Ok(ForecastRecord {
            source_id,
            zone_id: ZoneId(self.zone_id),
            issued_at: from_millis(self.issued_at)?,
            valid_at: from_millis(self.valid_at)?,
            variables: decode_variables(&self.variables)?,
            raw_confidence: self.raw_confidence,
        })
    }
}

/// Keyset-paged cursor over (issued_at, valid_at).
struct PredictionCursor<'a> {
    conn: &'a Connection,
    source_id: SourceId,
    zone_id: ZoneId,
    valid_from: i64,
    valid_to: i64,
    after: (i64, i64),
    buffer: VecDeque<StoreResult<ForecastRecord>>,
    exhausted: bool,
}

impl<'a> PredictionCursor<'a> {
    fn fetch_page(&mut self) -> StoreResult<()> {
        let conn: &'a Connection = self.conn;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {}
             FROM forecasts
             WHERE source_id = ?1 AND zone_id = ?2
               AND valid_at BETWEEN ?3 AND ?4
               AND (issued_at > ?5 OR (issued_at = ?5 AND valid_at > ?6))
             ORDER BY issued_at ASC, valid_at ASC
             LIMIT ?7",
            FORECAST_COLUMNS
        ))?;

        let rows = stmt.query_map(
            params![
                self.source_id.as_str(),
                self.zone_id.as_str(),
                self.valid_from,
                self.valid_to,
                self.after.0,
                self.after.1,
                PAGE_SIZE as i64,
            ],
            RawForecastRow::from_row,
        )?;

        let mut fetched = 0;
        for raw in rows {
            let raw = raw?;
            fetched += 1;
            self.after = (raw.issued_at, raw.valid_at);
            self.buffer.push_back(raw.decode());
        }

        if fetched < PAGE_SIZE {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl Iterator for PredictionCursor<'_> {
    type Item = StoreResult<ForecastRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front()
    }
}

fn decode_actual(zone_id: String, observed_at: i64, variables: &str) -> StoreResult<ActualObservation> {
    Ok(ActualObservation {
        zone_id: ZoneId(zone_id),
        observed_at: from_millis(observed_at)?,
        variables: decode_variables(variables)?,
    })
}

impl ForecastStore for SqliteForecastStore {
    fn append(&self, records: &[ForecastRecord]) -> StoreResult<AppendOutcome> {
        let now = Utc::now().timestamp_millis();
        let tx = self.conn.unchecked_transaction()?;
        let mut outcome = AppendOutcome::default();

        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT OR IGNORE INTO forecasts
                (source_id, zone_id, valid_at, issued_at, variables, raw_confidence, stored_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;

            for record in records {
                let variables = encode_variables(&record.variables)?;
                let changed = stmt.execute(params![
                    record.source_id.as_str(),
                    record.zone_id.as_str(),
                    record.valid_at.timestamp_millis(),
                    record.issued_at.timestamp_millis(),
                    variables,
                    record.raw_confidence,
                    now,
                ])?;
                if changed == 0 {
                    outcome.duplicates += 1;
                } else {
                    outcome.inserted += 1;
                }
            }
        }

        tx.commit()?;
        tracing::debug!(
            "Appended {} forecasts ({} duplicates ignored)",
            outcome.inserted,
            outcome.duplicates
        );
        Ok(outcome)
    }

    fn append_actual(&self, obs: &ActualObservation) -> StoreResult<bool> {
        let variables = encode_variables(&obs.variables)?;
        let changed = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO actuals (zone_id, observed_at, variables, stored_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                obs.zone_id.as_str(),
                obs.observed_at.timestamp_millis(),
                variables,
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn query_predictions(
        &self,
        source_id: SourceId,
        zone_id: &ZoneId,
        valid_at: RangeInclusive<DateTime<Utc>>,
    ) -> StoreResult<Predictions<'_>> {
        Ok(Box::new(PredictionCursor {
            conn: &self.conn,
            source_id,
            zone_id: zone_id.clone(),
            valid_from: valid_at.start().timestamp_millis(),
            valid_to: valid_at.end().timestamp_millis(),
            after: (i64::MIN, i64::MIN),
            buffer: VecDeque::new(),
            exhausted: false,
        }))
    }

    fn query_actual(
        &self,
        zone_id: &ZoneId,
        observed_at: DateTime<Utc>,
    ) -> StoreResult<ActualObservation> {
        let row = self
            .conn
            .query_row(
                "SELECT zone_id, observed_at, variables FROM actuals
                 WHERE zone_id = ?1 AND observed_at = ?2",
                params![zone_id.as_str(), observed_at.timestamp_millis()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((zone, at, vars)) => decode_actual(zone, at, &vars),
            None => Err(StoreError::not_found(format!(
                "actual for {} at {}",
                zone_id,
                observed_at.to_rfc3339()
            ))),
        }
    }

    fn list_actuals(
        &self,
        zone_id: &ZoneId,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<ActualObservation>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT zone_id, observed_at, variables FROM actuals
             WHERE zone_id = ?1 AND observed_at <= ?2
             ORDER BY observed_at ASC",
        )?;

        let rows = stmt.query_map(params![zone_id.as_str(), until.timestamp_millis()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut actuals = Vec::new();
        for row in rows {
            let (zone, at, vars) = row?;
            match decode_actual(zone, at, &vars) {
                Ok(obs) => actuals.push(obs),
                Err(e) if !e.is_fatal() => {
                    tracing::warn!("Skipping unreadable actual for {} at {}: {}", zone_id, at, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(actuals)
    }

    fn latest_predictions(
        &self,
        zone_id: &ZoneId,
        valid_at: DateTime<Utc>,
    ) -> StoreResult<Vec<ForecastRecord>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT f.source_id, f.zone_id, f.issued_at, f.valid_at, f.variables, f.raw_confidence
            FROM forecasts f
            JOIN (
                SELECT source_id, MAX(issued_at) AS issued_at
                FROM forecasts
                WHERE zone_id = ?1 AND valid_at = ?2
                GROUP BY source_id
            ) latest
              ON f.source_id = latest.source_id
             AND f.issued_at = latest.issued_at
            WHERE f.zone_id = ?1 AND f.valid_at = ?2
            ORDER BY f.source_id
            "#,
        )?;

        let rows = stmt.query_map(
            params![zone_id.as_str(), valid_at.timestamp_millis()],
            RawForecastRow::from_row,
        )?;

        let mut records = Vec::new();
        for raw in rows {
            match raw?.decode() {
                Ok(record) => records.push(record),
                Err(e) if !e.is_fatal() => {
                    tracing::warn!("Skipping unreadable forecast for {}: {}", zone_id, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    fn save_scores(&self, scores: &[SourceScore]) -> StoreResult<()> {
        let now = Utc::now().timestamp_millis();
        let tx = self.conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT OR REPLACE INTO source_scores
                (source_id, zone_id, variable_class, sample_count, rolling_error, confidence_pct, computed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for score in scores {
                stmt.execute(params![
                    score.source_id.as_str(),
                    score.zone_id.as_str(),
                    score.variable_class.as_str(),
                    score.sample_count,
                    score.rolling_error,
                    score.confidence_pct,
                    now,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn load_scores(&self, zone_id: &ZoneId) -> StoreResult<Vec<SourceScore>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT source_id, variable_class, sample_count, rolling_error, confidence_pct
             FROM source_scores
             WHERE zone_id = ?1
             ORDER BY source_id, variable_class",
        )?;

        let rows = stmt.query_map(params![zone_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
            ))
        })?;

        let mut scores = Vec::new();
        for row in rows {
            let (source, class, sample_count, rolling_error, confidence_pct) = row?;
            let (Ok(source_id), Ok(variable_class)) =
                (source.parse::<SourceId>(), class.parse::<VariableClass>())
            else {
                tracing::warn!("Skipping score with unknown source/class: {}/{}", source, class);
                continue;
            };
            scores.push(SourceScore {
                source_id,
                zone_id: zone_id.clone(),
                variable_class,
                sample_count,
                rolling_error,
                confidence_pct,
            });
        }
        Ok(scores)
    }

    fn record_run(&self, run: &RunRecord) -> StoreResult<()> {
        let failed = serde_json::to_string(&run.failed_sources)
            .map_err(|e| StoreError::QueryFailed(format!("Failed to encode run: {}", e)))?;
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO runs
            (run_id, started_at, finished_at, records_inserted, records_duplicate,
             actuals_inserted, failed_sources, zones_unavailable)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                run.run_id.to_string(),
                run.started_at.timestamp_millis(),
                run.finished_at.timestamp_millis(),
                run.records_inserted as i64,
                run.records_duplicate as i64,
                run.actuals_inserted as i64,
                failed,
                run.zones_unavailable as i64,
            ],
        )?;
        tracing::debug!("Recorded run {}", run.run_id);
        Ok(())
    }

    fn record_evaluations(&self, rows: &[EvaluationRecord]) -> StoreResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT OR IGNORE INTO evaluations
                (observed_at, source_id, zones, mean_abs_error, confidence_pct, run_id)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for row in rows {
                inserted += stmt.execute(params![
                    row.observed_at.timestamp_millis(),
                    row.source_id.as_str(),
                    row.zones as i64,
                    encode_variables(&row.mean_abs_error)?,
                    row.confidence_pct,
                    row.run_id.to_string(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn record_weights(&self, rows: &[WeightRecord]) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT OR IGNORE INTO weights
                (target_date, source_id, run_id, weight, confidence_pct, sample_count)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for row in rows {
                stmt.execute(params![
                    row.target_date.to_string(),
                    row.source_id.as_str(),
                    row.run_id.to_string(),
                    row.weight,
                    row.confidence_pct,
                    row.sample_count,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}
