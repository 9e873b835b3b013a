//! [`SqliteStore`], the SQLite implementation of [`Warehouse`].

use std::{collections::HashMap, path::Path};

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension as _, params};
use tracing::debug;

use rtv_core::{
  audit::{
    AlertSeverity, AlertStatus, ChangeCount, ChangeRecord, DataLineage, DataQualityLog,
    LineageSummary, NewAlert, NewChange, NewLineage, NewMetric, NewQualityLog, PipelineAlert,
    PipelineLog, PipelineMetric, PipelineStatus,
  },
  batch::{LoadSummary, WarehouseBatch},
  dimension::{
    Household, Indicator, NewHousehold, NewIndicator, NewSurveyRound, NewVillage, SurveyRound,
    Village,
  },
  fact::{
    HouseholdMeasurement, HouseholdSurvey, NewMeasurement, NewSurvey, SurveyStatus, Upserted,
  },
  progress::{HouseholdProgress, Overview, ProgressQuery},
  quality::{ASSESSMENT_CHECK, QualityReport, round2},
  registry::{self, ColumnDefinition, SchemaChanges},
  store::Warehouse,
};

use crate::{
  Error, Result,
  encode::{
    ALERT_COLUMNS, CHANGE_COLUMNS, HOUSEHOLD_COLUMNS, INDICATOR_COLUMNS, LINEAGE_COLUMNS,
    METRIC_COLUMNS, PIPELINE_LOG_COLUMNS, PROGRESS_COLUMNS, QUALITY_LOG_COLUMNS, REGISTRY_COLUMNS,
    ROUND_COLUMNS, RawAlert, RawChange, RawChangeCount, RawColumn, RawHousehold, RawIndicator,
    RawLineage, RawMeasurement, RawMetric, RawPipelineLog, RawProgress, RawQualityLog, RawRound,
    RawSurvey, RawVillage, VILLAGE_COLUMNS, encode_date, encode_dt,
  },
  ops, quality,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An RTV warehouse backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a warehouse at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory warehouse, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list<R, F>(&self, sql: String, from_row: F) -> Result<Vec<R>>
  where
    R: Send + 'static,
    F: Fn(&rusqlite::Row<'_>) -> rusqlite::Result<R> + Send + 'static,
  {
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], &from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }
}

/// Upsert every row of a batch on one connection (normally a transaction).
///
/// Villages and indicators are only created; their curated attributes are
/// left alone. Measurements find their survey through the (household, round)
/// pair, first among the batch's own surveys and then among stored ones.
fn load_batch(conn: &Connection, batch: &WarehouseBatch) -> rusqlite::Result<LoadSummary> {
  let mut summary = LoadSummary::default();

  for village in &batch.villages {
    summary.record("villages", ops::ensure_village(conn, village)?);
  }
  for round in &batch.rounds {
    summary.record("survey_rounds", ops::upsert_round(conn, round)?.1);
  }
  for indicator in &batch.indicators {
    summary.record("indicators", ops::ensure_indicator(conn, indicator)?);
  }
  for household in &batch.households {
    summary.record("households", ops::upsert_household(conn, household)?.1);
  }

  let mut survey_ids: HashMap<(String, String), i64> = HashMap::new();
  for row in &batch.surveys {
    let input = NewSurvey {
      household_id: row.household_id.clone(),
      round_id:     row.round_id.clone(),
      survey_date:  row.survey_date,
      surveyor:     row.surveyor.clone(),
      status:       row.status.clone(),
    };
    let (survey, change) = ops::upsert_survey(conn, &input)?;
    survey_ids.insert((row.household_id.clone(), row.round_id.clone()), survey.survey_id);
    summary.record("household_surveys", change);
  }

  for row in &batch.measurements {
    let key = (row.household_id.clone(), row.round_id.clone());
    let survey_id = match survey_ids.get(&key) {
      Some(id) => *id,
      None => {
        let survey = ops::find_survey(conn, &row.household_id, &row.round_id)?.ok_or_else(|| {
          ops::foreign_key_violation(format!(
            "no survey for household {} in round {}",
            row.household_id, row.round_id
          ))
        })?;
        survey_ids.insert(key, survey.survey_id);
        survey.survey_id
      }
    };
    let input = NewMeasurement::new(survey_id, row.indicator_id.clone(), row.value);
    summary.record("household_measurements", ops::upsert_measurement(conn, &input)?.1);
  }

  Ok(summary)
}

/// Outcome of closing a row that may only be closed once.
enum Finish<R> {
  Missing,
  AlreadyFinished,
  Done(R),
}

// ─── Warehouse impl ──────────────────────────────────────────────────────────

impl Warehouse for SqliteStore {
  type Error = Error;

  // ── Dimensions ────────────────────────────────────────────────────────────

  async fn upsert_village(&self, input: NewVillage) -> Result<Upserted<Village>> {
    let (raw, change) = self
      .conn
      .call(move |conn| Ok(ops::upsert_village(conn, &input)?))
      .await?;
    Ok(Upserted { row: raw.into_village()?, change })
  }

  async fn get_village(&self, village_id: String) -> Result<Option<Village>> {
    let raw = self
      .conn
      .call(move |conn| Ok(ops::select_village(conn, &village_id)?))
      .await?;
    raw.map(RawVillage::into_village).transpose()
  }

  async fn list_villages(&self) -> Result<Vec<Village>> {
    let raws = self
      .list(
        format!("SELECT {VILLAGE_COLUMNS} FROM villages ORDER BY village_id"),
        RawVillage::from_row,
      )
      .await?;
    raws.into_iter().map(RawVillage::into_village).collect()
  }

  async fn upsert_household(&self, input: NewHousehold) -> Result<Upserted<Household>> {
    let (raw, change) = self
      .conn
      .call(move |conn| Ok(ops::upsert_household(conn, &input)?))
      .await?;
    Ok(Upserted { row: raw.into_household()?, change })
  }

  async fn get_household(&self, household_id: String) -> Result<Option<Household>> {
    let raw = self
      .conn
      .call(move |conn| Ok(ops::select_household(conn, &household_id)?))
      .await?;
    raw.map(RawHousehold::into_household).transpose()
  }

  async fn list_households(&self, village_id: Option<String>) -> Result<Vec<Household>> {
    let raws: Vec<RawHousehold> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {HOUSEHOLD_COLUMNS} FROM households
            WHERE (?1 IS NULL OR village_id = ?1)
            ORDER BY household_id"
        ))?;
        let rows = stmt
          .query_map(params![village_id], RawHousehold::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawHousehold::into_household).collect()
  }

  async fn upsert_round(&self, input: NewSurveyRound) -> Result<Upserted<SurveyRound>> {
    let (raw, change) = self
      .conn
      .call(move |conn| Ok(ops::upsert_round(conn, &input)?))
      .await?;
    Ok(Upserted { row: raw.into_round()?, change })
  }

  async fn get_round(&self, round_id: String) -> Result<Option<SurveyRound>> {
    let raw = self
      .conn
      .call(move |conn| Ok(ops::select_round(conn, &round_id)?))
      .await?;
    raw.map(RawRound::into_round).transpose()
  }

  async fn list_rounds(&self) -> Result<Vec<SurveyRound>> {
    let raws = self
      .list(
        format!("SELECT {ROUND_COLUMNS} FROM survey_rounds ORDER BY round_id"),
        RawRound::from_row,
      )
      .await?;
    raws.into_iter().map(RawRound::into_round).collect()
  }

  async fn upsert_indicator(&self, input: NewIndicator) -> Result<Upserted<Indicator>> {
    let (raw, change) = self
      .conn
      .call(move |conn| Ok(ops::upsert_indicator(conn, &input)?))
      .await?;
    Ok(Upserted { row: raw.into_indicator()?, change })
  }

  async fn get_indicator(&self, indicator_id: String) -> Result<Option<Indicator>> {
    let raw = self
      .conn
      .call(move |conn| Ok(ops::select_indicator(conn, &indicator_id)?))
      .await?;
    raw.map(RawIndicator::into_indicator).transpose()
  }

  async fn list_indicators(&self) -> Result<Vec<Indicator>> {
    let raws = self
      .list(
        format!("SELECT {INDICATOR_COLUMNS} FROM indicators ORDER BY category, indicator_id"),
        RawIndicator::from_row,
      )
      .await?;
    raws.into_iter().map(RawIndicator::into_indicator).collect()
  }

  // ── Facts ─────────────────────────────────────────────────────────────────

  async fn record_survey(&self, input: NewSurvey) -> Result<HouseholdSurvey> {
    let household_id = input.household_id.clone();
    let round_id     = input.round_id.clone();

    let raw = self
      .conn
      .call(move |conn| Ok(ops::insert_survey(conn, &input)?))
      .await
      .map_err(|e| match Error::from(e) {
        Error::UniqueViolation(_) => Error::DuplicateSurvey { household_id, round_id },
        other => other,
      })?;

    raw.into_survey()
  }

  async fn upsert_survey(&self, input: NewSurvey) -> Result<Upserted<HouseholdSurvey>> {
    let (raw, change) = self
      .conn
      .call(move |conn| Ok(ops::upsert_survey(conn, &input)?))
      .await?;
    Ok(Upserted { row: raw.into_survey()?, change })
  }

  async fn find_survey(
    &self,
    household_id: String,
    round_id: String,
  ) -> Result<Option<HouseholdSurvey>> {
    let raw = self
      .conn
      .call(move |conn| Ok(ops::find_survey(conn, &household_id, &round_id)?))
      .await?;
    raw.map(RawSurvey::into_survey).transpose()
  }

  async fn update_survey_status(
    &self,
    survey_id: i64,
    status: SurveyStatus,
  ) -> Result<HouseholdSurvey> {
    let status_str = status.as_str().to_owned();

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE household_surveys SET status = ?2 WHERE survey_id = ?1",
          params![survey_id, status_str],
        )?;
        Ok(ops::select_survey(conn, survey_id)?)
      })
      .await?;

    raw.ok_or(Error::SurveyNotFound(survey_id))?.into_survey()
  }

  async fn record_measurement(&self, input: NewMeasurement) -> Result<HouseholdMeasurement> {
    let survey_id    = input.survey_id;
    let indicator_id = input.indicator_id.clone();

    let raw = self
      .conn
      .call(move |conn| Ok(ops::insert_measurement(conn, &input)?))
      .await
      .map_err(|e| match Error::from(e) {
        Error::UniqueViolation(_) => Error::DuplicateMeasurement { survey_id, indicator_id },
        other => other,
      })?;

    raw.into_measurement()
  }

  async fn upsert_measurement(
    &self,
    input: NewMeasurement,
  ) -> Result<Upserted<HouseholdMeasurement>> {
    let (raw, change) = self
      .conn
      .call(move |conn| Ok(ops::upsert_measurement(conn, &input)?))
      .await?;
    Ok(Upserted { row: raw.into_measurement()?, change })
  }

  async fn list_measurements(&self, survey_id: i64) -> Result<Vec<HouseholdMeasurement>> {
    let raws = self
      .conn
      .call(move |conn| Ok(ops::list_measurements(conn, survey_id)?))
      .await?;
    raws.into_iter().map(RawMeasurement::into_measurement).collect()
  }

  async fn load(&self, batch: WarehouseBatch) -> Result<LoadSummary> {
    let summary = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let summary = load_batch(&tx, &batch)?;
        tx.commit()?;
        Ok(summary)
      })
      .await?;

    for (table, tally) in &summary.tables {
      debug!(
        table = %table,
        inserted = tally.inserted,
        updated = tally.updated,
        unchanged = tally.unchanged,
        "loaded table"
      );
    }
    Ok(summary)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn progress<'a>(&'a self, query: &'a ProgressQuery) -> Result<Vec<HouseholdProgress>> {
    let village_id   = query.village_id.clone();
    let household_id = query.household_id.clone();
    let round_id     = query.round_id.clone();
    let category     = query.category.clone();
    let since        = query.since.map(encode_date);
    // A negative LIMIT means "no limit" to SQLite.
    let limit_val    = query.limit.map_or(-1, |l| l as i64);
    let offset_val   = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawProgress> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PROGRESS_COLUMNS} FROM household_progress
            WHERE (?1 IS NULL OR village_id = ?1)
              AND (?2 IS NULL OR household_id = ?2)
              AND (?3 IS NULL OR round_id = ?3)
              AND (?4 IS NULL OR indicator_category = ?4)
              AND (?5 IS NULL OR survey_date >= ?5)
            ORDER BY household_id, survey_date, indicator_id
            LIMIT ?6 OFFSET ?7"
        ))?;
        let rows = stmt
          .query_map(
            params![village_id, household_id, round_id, category, since, limit_val, offset_val],
            RawProgress::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProgress::into_progress).collect()
  }

  async fn overview(&self, as_of: NaiveDate) -> Result<Overview> {
    let as_of_str = encode_date(as_of);

    let (total_households, active_villages, total_surveys, average_progress, data_quality_score) =
      self
        .conn
        .call(move |conn| {
          Ok(conn.query_row(
            "SELECT
               (SELECT COUNT(*) FROM households),
               (SELECT COUNT(DISTINCT h.village_id)
                  FROM household_surveys s
                  JOIN households h ON h.household_id = s.household_id
                 WHERE s.survey_date <= ?1),
               (SELECT COUNT(*) FROM household_surveys WHERE survey_date <= ?1),
               (SELECT AVG(progress_pct) FROM household_progress WHERE survey_date <= ?1),
               (SELECT json_extract(details, '$.overall_quality_score')
                  FROM data_quality_logs
                 WHERE check_type = ?2
                 ORDER BY log_id DESC LIMIT 1)",
            params![as_of_str, ASSESSMENT_CHECK],
            |row| {
              Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, Option<f64>>(4)?,
              ))
            },
          )?)
        })
        .await?;

    Ok(Overview {
      total_households,
      active_villages,
      total_surveys,
      average_progress: average_progress.map(round2),
      data_quality_score,
      as_of,
    })
  }

  // ── Audit ─────────────────────────────────────────────────────────────────

  async fn log_quality(&self, input: NewQualityLog) -> Result<DataQualityLog> {
    let details = input.details.to_string();

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO data_quality_logs
             (table_name, check_type, check_description, status, details)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![
            input.table_name,
            input.check_type,
            input.check_description,
            input.status,
            details,
          ],
        )?;
        Ok(conn.query_row(
          &format!("SELECT {QUALITY_LOG_COLUMNS} FROM data_quality_logs WHERE log_id = ?1"),
          params![conn.last_insert_rowid()],
          RawQualityLog::from_row,
        )?)
      })
      .await?;

    raw.into_log()
  }

  async fn recent_quality_logs(&self, limit: usize) -> Result<Vec<DataQualityLog>> {
    let raws = self
      .list(
        format!(
          "SELECT {QUALITY_LOG_COLUMNS} FROM data_quality_logs ORDER BY log_id DESC LIMIT {limit}"
        ),
        RawQualityLog::from_row,
      )
      .await?;
    raws.into_iter().map(RawQualityLog::into_log).collect()
  }

  async fn start_pipeline_run(&self, pipeline_name: String, run_id: String) -> Result<PipelineLog> {
    let status = PipelineStatus::Running.to_string();

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO pipeline_logs (pipeline_name, run_id, status) VALUES (?1, ?2, ?3)",
          params![pipeline_name, run_id, status],
        )?;
        Ok(conn.query_row(
          &format!("SELECT {PIPELINE_LOG_COLUMNS} FROM pipeline_logs WHERE log_id = ?1"),
          params![conn.last_insert_rowid()],
          RawPipelineLog::from_row,
        )?)
      })
      .await?;

    raw.into_log()
  }

  async fn finish_pipeline_run(
    &self,
    log_id: i64,
    status: PipelineStatus,
    details: serde_json::Value,
  ) -> Result<PipelineLog> {
    let status_str  = status.to_string();
    let running     = PipelineStatus::Running.to_string();
    let details_str = details.to_string();

    let outcome = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE pipeline_logs
              SET status = ?2,
                  end_time = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                  details = ?3
            WHERE log_id = ?1 AND status = ?4",
          params![log_id, status_str, details_str, running],
        )?;
        let raw = conn
          .query_row(
            &format!("SELECT {PIPELINE_LOG_COLUMNS} FROM pipeline_logs WHERE log_id = ?1"),
            params![log_id],
            RawPipelineLog::from_row,
          )
          .optional()?;
        Ok(match raw {
          None => Finish::Missing,
          Some(_) if updated == 0 => Finish::AlreadyFinished,
          Some(raw) => Finish::Done(raw),
        })
      })
      .await?;

    match outcome {
      Finish::Missing => Err(Error::PipelineRunNotFound(log_id)),
      Finish::AlreadyFinished => Err(Error::PipelineRunFinished(log_id)),
      Finish::Done(raw) => raw.into_log(),
    }
  }

  async fn recent_pipeline_runs(&self, limit: usize) -> Result<Vec<PipelineLog>> {
    let raws = self
      .list(
        format!("SELECT {PIPELINE_LOG_COLUMNS} FROM pipeline_logs ORDER BY log_id DESC LIMIT {limit}"),
        RawPipelineLog::from_row,
      )
      .await?;
    raws.into_iter().map(RawPipelineLog::into_log).collect()
  }

  // ── Monitoring ────────────────────────────────────────────────────────────

  async fn record_metrics(
    &self,
    log_id: i64,
    metrics: Vec<NewMetric>,
  ) -> Result<Vec<PipelineMetric>> {
    let rows: Vec<(String, f64, String, String)> = metrics
      .into_iter()
      .map(|m| (m.metric_name, m.metric_value, m.metric_type.to_string(), m.metadata.to_string()))
      .collect();

    let raws: Vec<RawMetric> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut raws = Vec::with_capacity(rows.len());
        for (name, value, metric_type, metadata) in rows {
          tx.execute(
            "INSERT INTO pipeline_metrics (log_id, metric_name, metric_value, metric_type, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![log_id, name, value, metric_type, metadata],
          )?;
          raws.push(tx.query_row(
            &format!(
              "SELECT {METRIC_COLUMNS} FROM pipeline_metrics m
                 JOIN pipeline_logs l ON l.log_id = m.log_id
                WHERE m.metric_id = ?1"
            ),
            params![tx.last_insert_rowid()],
            RawMetric::from_row,
          )?);
        }
        tx.commit()?;
        Ok(raws)
      })
      .await?;

    raws.into_iter().map(RawMetric::into_metric).collect()
  }

  async fn pipeline_metrics(
    &self,
    pipeline_name: Option<String>,
    metric_name: Option<String>,
    limit: usize,
  ) -> Result<Vec<PipelineMetric>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {METRIC_COLUMNS} FROM pipeline_metrics m
             JOIN pipeline_logs l ON l.log_id = m.log_id
            WHERE (?1 IS NULL OR l.pipeline_name = ?1)
              AND (?2 IS NULL OR m.metric_name = ?2)
            ORDER BY m.metric_id DESC
            LIMIT ?3"
        ))?;
        let rows = stmt
          .query_map(params![pipeline_name, metric_name, limit as i64], RawMetric::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawMetric::into_metric).collect()
  }

  async fn record_alert(&self, log_id: i64, alert: NewAlert) -> Result<PipelineAlert> {
    let severity = alert.severity.to_string();
    let status   = AlertStatus::Active.to_string();
    let metadata = alert.metadata.to_string();

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO pipeline_alerts
             (log_id, alert_type, alert_message, severity, status, metadata)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![log_id, alert.alert_type, alert.alert_message, severity, status, metadata],
        )?;
        Ok(
          select_alert(conn, conn.last_insert_rowid())?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?,
        )
      })
      .await?;

    raw.into_alert()
  }

  async fn active_alerts(
    &self,
    pipeline_name: Option<String>,
    severity: Option<AlertSeverity>,
  ) -> Result<Vec<PipelineAlert>> {
    let severity = severity.map(|s| s.to_string());
    let active   = AlertStatus::Active.to_string();

    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ALERT_COLUMNS} FROM pipeline_alerts a
             JOIN pipeline_logs l ON l.log_id = a.log_id
            WHERE a.status = ?1
              AND (?2 IS NULL OR l.pipeline_name = ?2)
              AND (?3 IS NULL OR a.severity = ?3)
            ORDER BY a.alert_id DESC"
        ))?;
        let rows = stmt
          .query_map(params![active, pipeline_name, severity], RawAlert::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawAlert::into_alert).collect()
  }

  async fn resolve_alert(&self, alert_id: i64) -> Result<PipelineAlert> {
    let active   = AlertStatus::Active.to_string();
    let resolved = AlertStatus::Resolved.to_string();

    let outcome = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE pipeline_alerts
              SET status = ?2,
                  resolved_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE alert_id = ?1 AND status = ?3",
          params![alert_id, resolved, active],
        )?;
        Ok(match select_alert(conn, alert_id)? {
          None => Finish::Missing,
          Some(_) if updated == 0 => Finish::AlreadyFinished,
          Some(raw) => Finish::Done(raw),
        })
      })
      .await?;

    match outcome {
      Finish::Missing => Err(Error::AlertNotFound(alert_id)),
      Finish::AlreadyFinished => Err(Error::AlertResolved(alert_id)),
      Finish::Done(raw) => raw.into_alert(),
    }
  }

  // ── Lineage ───────────────────────────────────────────────────────────────

  async fn find_lineage_by_hash(&self, hash_value: String) -> Result<Option<DataLineage>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {LINEAGE_COLUMNS} FROM data_lineage
                  WHERE hash_value = ?1 ORDER BY lineage_id DESC LIMIT 1"
              ),
              params![hash_value],
              RawLineage::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawLineage::into_lineage).transpose()
  }

  async fn record_lineage(&self, input: NewLineage) -> Result<DataLineage> {
    let ingestion_time = encode_dt(input.ingestion_time);
    let metadata       = input.metadata.to_string();

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO data_lineage
             (source_file, ingestion_time, record_count, hash_value, metadata, parent_lineage_id)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![
            input.source_file,
            ingestion_time,
            input.record_count,
            input.hash_value,
            metadata,
            input.parent_lineage_id,
          ],
        )?;
        Ok(conn.query_row(
          &format!("SELECT {LINEAGE_COLUMNS} FROM data_lineage WHERE lineage_id = ?1"),
          params![conn.last_insert_rowid()],
          RawLineage::from_row,
        )?)
      })
      .await?;

    raw.into_lineage()
  }

  async fn record_changes(
    &self,
    lineage_id: i64,
    changes: Vec<NewChange>,
  ) -> Result<Vec<ChangeRecord>> {
    let rows: Vec<(String, String, i64, String)> = changes
      .into_iter()
      .map(|c| (c.table_name, c.operation.to_string(), c.record_count, c.details.to_string()))
      .collect();

    let raws: Vec<RawChange> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut raws = Vec::with_capacity(rows.len());
        for (table_name, operation, record_count, details) in rows {
          tx.execute(
            "INSERT INTO change_log (lineage_id, table_name, operation, record_count, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![lineage_id, table_name, operation, record_count, details],
          )?;
          raws.push(tx.query_row(
            &format!("SELECT {CHANGE_COLUMNS} FROM change_log WHERE change_id = ?1"),
            params![tx.last_insert_rowid()],
            RawChange::from_row,
          )?);
        }
        tx.commit()?;
        Ok(raws)
      })
      .await?;

    raws.into_iter().map(RawChange::into_change).collect()
  }

  async fn lineage_history(&self, limit: usize) -> Result<Vec<LineageSummary>> {
    let raws: Vec<(RawLineage, Vec<RawChangeCount>)> = self
      .conn
      .call(move |conn| {
        let lineages = {
          let mut stmt = conn.prepare(&format!(
            "SELECT {LINEAGE_COLUMNS} FROM data_lineage ORDER BY lineage_id DESC LIMIT ?1"
          ))?;
          stmt
            .query_map(params![limit as i64], RawLineage::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        let mut out = Vec::with_capacity(lineages.len());
        for lineage in lineages {
          let counts = change_counts(conn, lineage.lineage_id)?;
          out.push((lineage, counts));
        }
        Ok(out)
      })
      .await?;

    raws
      .into_iter()
      .map(|(lineage, counts)| {
        Ok(LineageSummary {
          lineage: lineage.into_lineage()?,
          changes: counts.into_iter().map(RawChangeCount::into_count).collect::<Result<_>>()?,
        })
      })
      .collect()
  }

  async fn change_summary(&self, lineage_id: i64) -> Result<Vec<ChangeCount>> {
    let raws = self
      .conn
      .call(move |conn| Ok(change_counts(conn, lineage_id)?))
      .await?;
    raws.into_iter().map(RawChangeCount::into_count).collect()
  }

  async fn annotate_lineage(
    &self,
    lineage_id: i64,
    patch: serde_json::Value,
  ) -> Result<DataLineage> {
    let patch = patch.to_string();

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE data_lineage SET metadata = json_patch(metadata, ?2) WHERE lineage_id = ?1",
          params![lineage_id, patch],
        )?;
        Ok(
          conn
            .query_row(
              &format!("SELECT {LINEAGE_COLUMNS} FROM data_lineage WHERE lineage_id = ?1"),
              params![lineage_id],
              RawLineage::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.ok_or(Error::LineageNotFound(lineage_id))?.into_lineage()
  }

  async fn remove_lineage(&self, lineage_id: i64) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM change_log WHERE lineage_id = ?1", params![lineage_id])?;
        let removed =
          tx.execute("DELETE FROM data_lineage WHERE lineage_id = ?1", params![lineage_id])?;
        tx.commit()?;
        Ok(removed > 0)
      })
      .await?;
    if removed {
      debug!(lineage_id, "removed lineage");
    }
    Ok(removed)
  }

  // ── Schema registry ───────────────────────────────────────────────────────

  async fn register_column(
    &self,
    round_id: String,
    column: ColumnDefinition,
    reason: Option<String>,
  ) -> Result<i64> {
    let valid_values = column.valid_values.as_ref().map(serde_json::to_string).transpose()?;
    let data_type    = column.data_type.to_string();

    let version = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let active: Option<i64> = tx
          .query_row(
            "SELECT version FROM schema_registry
              WHERE round_id = ?1 AND column_name = ?2 AND deprecated_date IS NULL",
            params![round_id, column.name],
            |row| row.get(0),
          )
          .optional()?;
        let latest: i64 = tx.query_row(
          "SELECT COALESCE(MAX(version), 0) FROM schema_registry
            WHERE round_id = ?1 AND column_name = ?2",
          params![round_id, column.name],
          |row| row.get(0),
        )?;
        let version = latest + 1;

        if let Some(old) = active {
          tx.execute(
            "UPDATE schema_registry SET deprecated_date = date('now')
              WHERE round_id = ?1 AND column_name = ?2 AND version = ?3",
            params![round_id, column.name, old],
          )?;
        }

        tx.execute(
          "INSERT INTO schema_registry
             (round_id, column_name, data_type, description, valid_values, is_required, version)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          params![
            round_id,
            column.name,
            data_type,
            column.description,
            valid_values,
            column.is_required,
            version,
          ],
        )?;

        let change_type = if active.is_some() { "MODIFY" } else { "ADD" };
        tx.execute(
          "INSERT INTO schema_changes
             (round_id, change_type, column_name, old_version, new_version, change_reason)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![round_id, change_type, column.name, active, version, reason],
        )?;

        tx.commit()?;
        Ok(version)
      })
      .await?;

    Ok(version)
  }

  async fn column_definition(
    &self,
    round_id: String,
    column_name: String,
    version: Option<i64>,
  ) -> Result<Option<ColumnDefinition>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {REGISTRY_COLUMNS} FROM schema_registry
                  WHERE round_id = ?1 AND column_name = ?2
                    AND (CASE WHEN ?3 IS NULL THEN deprecated_date IS NULL ELSE version = ?3 END)"
              ),
              params![round_id, column_name, version],
              RawColumn::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawColumn::into_definition).transpose()
  }

  async fn active_schema(&self, round_id: String) -> Result<Vec<ColumnDefinition>> {
    let raws: Vec<RawColumn> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {REGISTRY_COLUMNS} FROM schema_registry
            WHERE round_id = ?1 AND deprecated_date IS NULL
            ORDER BY column_name"
        ))?;
        let rows = stmt
          .query_map(params![round_id], RawColumn::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawColumn::into_definition).collect()
  }

  async fn detect_schema_changes(
    &self,
    current_round: String,
    previous_round: String,
  ) -> Result<SchemaChanges> {
    let current  = self.active_schema(current_round).await?;
    let previous = self.active_schema(previous_round).await?;
    Ok(registry::diff(&current, &previous))
  }

  // ── Quality ───────────────────────────────────────────────────────────────

  async fn assess_quality(&self, as_of: NaiveDate) -> Result<QualityReport> {
    let report = self
      .conn
      .call(move |conn| Ok(quality::assess(conn, as_of)?))
      .await?;
    debug!(score = report.overall_quality_score, "quality assessed");
    Ok(report)
  }
}

fn select_alert(conn: &Connection, alert_id: i64) -> rusqlite::Result<Option<RawAlert>> {
  conn
    .query_row(
      &format!(
        "SELECT {ALERT_COLUMNS} FROM pipeline_alerts a
           JOIN pipeline_logs l ON l.log_id = a.log_id
          WHERE a.alert_id = ?1"
      ),
      params![alert_id],
      RawAlert::from_row,
    )
    .optional()
}

fn change_counts(conn: &Connection, lineage_id: i64) -> rusqlite::Result<Vec<RawChangeCount>> {
  let mut stmt = conn.prepare(
    "SELECT table_name, operation, SUM(record_count), COUNT(*)
       FROM change_log
      WHERE lineage_id = ?1
      GROUP BY table_name, operation
      ORDER BY table_name, operation",
  )?;
  stmt
    .query_map(params![lineage_id], RawChangeCount::from_row)?
    .collect()
}
