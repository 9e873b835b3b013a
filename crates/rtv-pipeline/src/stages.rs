//! The pipeline stages: ingest, load, quality, and a full logged run.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::{Duration, Instant},
};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};
use uuid::Uuid;

use rtv_core::{
  audit::{
    AlertSeverity, ChangeOperation, MetricType, NewAlert, NewChange, NewLineage, NewMetric,
    PipelineStatus,
  },
  batch::LoadSummary,
  quality::{QualityReport, Severity},
  registry::validate_record,
  store::Warehouse,
};
use rtv_etl::{
  TransformStats, clean, clean::round_id, content_hash, read::SourceFormat, transform,
};

use crate::{
  Error, PipelineConfig, Result,
  lake::{DataLake, FAILED_PREFIX, PROCESSED_PREFIX, StagedBatch},
};

/// Schema errors kept per rejected file.
const MAX_SCHEMA_ERRORS: usize = 20;

// ─── Reports ─────────────────────────────────────────────────────────────────

/// A file or batch a stage gave up on while carrying on with the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
  /// Source file name, or the object name the batch was quarantined under.
  pub name:  String,
  pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
  pub total_files:     usize,
  pub processed_files: usize,
  /// Files whose content was already ingested.
  pub skipped_files:   usize,
  pub failed_files:    usize,
  pub total_records:   usize,
  /// Object names of the staged batches written.
  pub staged:          Vec<String>,
  pub failures:        Vec<StageFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
  pub batches:        usize,
  /// Batches moved under `failed/`.
  pub failed_batches: usize,
  pub summary:        LoadSummary,
  pub transform:      Vec<TransformStats>,
  pub failures:       Vec<StageFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
  pub run_id:  String,
  pub log_id:  i64,
  pub ingest:  IngestReport,
  pub load:    LoadReport,
  pub quality: QualityReport,
}

/// Change-log rows for one loaded batch: an `INSERT` and an `UPDATE` row
/// per table that saw any. Unchanged rows are noted in the details.
pub fn change_log(summary: &LoadSummary) -> Vec<NewChange> {
  let mut changes = Vec::new();
  for (table, tally) in &summary.tables {
    for (operation, count) in
      [(ChangeOperation::Insert, tally.inserted), (ChangeOperation::Update, tally.updated)]
    {
      if count > 0 {
        changes.push(NewChange {
          table_name: table.clone(),
          operation,
          record_count: count,
          details: json!({ "unchanged": tally.unchanged }),
        });
      }
    }
  }
  changes
}

// ─── Monitoring ──────────────────────────────────────────────────────────────

/// Per-stage measurements of a successful run.
pub fn run_metrics(
  ingest: &IngestReport,
  load: &LoadReport,
  quality: &QualityReport,
  elapsed: Duration,
) -> Vec<NewMetric> {
  let count = |name: &str, value: usize| NewMetric::new(name, value as f64, MetricType::Count);
  let mut metrics = vec![
    count("files_processed", ingest.processed_files),
    count("files_skipped", ingest.skipped_files),
    count("files_failed", ingest.failed_files),
    count("records_ingested", ingest.total_records),
    count("batches_loaded", load.batches),
    count("batches_failed", load.failed_batches),
  ];

  for (table, tally) in &load.summary.tables {
    for (name, value) in [("rows_inserted", tally.inserted), ("rows_updated", tally.updated)] {
      metrics.push(NewMetric {
        metadata: json!({ "table": table }),
        ..NewMetric::new(name, value as f64, MetricType::Count)
      });
    }
  }

  metrics.push(NewMetric::new(
    "overall_quality_score",
    quality.overall_quality_score,
    MetricType::Gauge,
  ));
  metrics.push(NewMetric::new("timeliness_score", quality.timeliness_score, MetricType::Gauge));
  metrics.push(NewMetric::new(
    "run_duration_seconds",
    elapsed.as_secs_f64(),
    MetricType::Duration,
  ));
  metrics
}

/// Alerts raised by a successful run: one per file or batch a stage gave up
/// on and one per high-severity quality issue.
pub fn run_alerts(
  ingest: &IngestReport,
  load: &LoadReport,
  quality: &QualityReport,
) -> Vec<NewAlert> {
  let mut alerts = Vec::new();

  for failure in &ingest.failures {
    alerts.push(NewAlert {
      alert_type:    "ingest_failure".to_owned(),
      alert_message: format!("could not ingest {}: {}", failure.name, failure.error),
      severity:      AlertSeverity::Warning,
      metadata:      json!({ "file": failure.name }),
    });
  }
  for failure in &load.failures {
    alerts.push(NewAlert {
      alert_type:    "load_failure".to_owned(),
      alert_message: format!("quarantined {}: {}", failure.name, failure.error),
      severity:      AlertSeverity::Error,
      metadata:      json!({ "object": failure.name }),
    });
  }
  for issue in quality.issues().filter(|i| i.severity == Severity::High) {
    alerts.push(NewAlert {
      alert_type:    "data_quality".to_owned(),
      alert_message: format!(
        "{} check {} found {} rows",
        issue.check_type, issue.check_name, issue.count
      ),
      severity:      AlertSeverity::Error,
      metadata:      json!({
        "check_type": issue.check_type,
        "check_name": issue.check_name,
        "count": issue.count,
      }),
    });
  }
  alerts
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// The ordered stages of the survey pipeline over a warehouse and a lake.
pub struct Pipeline<S> {
  store:      Arc<S>,
  lake:       DataLake,
  source_dir: PathBuf,
  name:       String,
}

impl<S> Pipeline<S>
where
  S: Warehouse,
{
  pub fn new(store: Arc<S>, lake: DataLake, config: &PipelineConfig) -> Self {
    Self {
      store,
      lake,
      source_dir: config.source_dir.clone(),
      name: config.pipeline_name.clone(),
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn lake(&self) -> &DataLake { &self.lake }

  // ── Ingest ────────────────────────────────────────────────────────────────

  /// Ingest every CSV and XLSX file in the source directory, in name order.
  /// A file that fails is logged and counted; the stage carries on.
  pub async fn ingest(&self) -> Result<IngestReport> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(&self.source_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if entry.file_type().await?.is_file() && SourceFormat::from_path(&path).is_some() {
        files.push(path);
      }
    }
    files.sort();

    let mut report = IngestReport { total_files: files.len(), ..Default::default() };
    for path in files {
      match self.ingest_file(&path).await {
        Ok(Some((object, records))) => {
          report.processed_files += 1;
          report.total_records += records;
          report.staged.push(object);
        }
        Ok(None) => report.skipped_files += 1,
        Err(e) => {
          warn!(file = %path.display(), error = %e, "failed to ingest file");
          report.failed_files += 1;
          report.failures.push(StageFailure {
            name:  path
              .file_name()
              .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned()),
            error: e.to_string(),
          });
        }
      }
    }

    info!(
      total = report.total_files,
      processed = report.processed_files,
      skipped = report.skipped_files,
      failed = report.failed_files,
      records = report.total_records,
      "ingest finished"
    );
    Ok(report)
  }

  /// Ingest one file and return the staged object with its record count,
  /// or `None` when identical content was ingested before.
  pub async fn ingest_file(&self, path: &Path) -> Result<Option<(String, usize)>> {
    let source_file = path
      .file_name()
      .and_then(|n| n.to_str())
      .ok_or_else(|| Error::InvalidObjectName(path.display().to_string()))?
      .to_owned();

    let owned = path.to_path_buf();
    let table = tokio::task::spawn_blocking(move || rtv_etl::read_table(&owned)).await??;
    let hash_value = content_hash(&table);
    let record_count = table.len();

    if let Some(existing) = self
      .store
      .find_lineage_by_hash(hash_value.clone())
      .await
      .map_err(Error::store)?
      && existing.record_count == record_count as i64
    {
      info!(file = %source_file, lineage_id = existing.lineage_id, "already ingested, skipping");
      return Ok(None);
    }

    let ingested_at = Utc::now();
    let round = round_id(&source_file);
    let table = clean(table, &source_file, ingested_at);

    let schema = self
      .store
      .active_schema(round.clone())
      .await
      .map_err(Error::store)?;
    if !schema.is_empty() {
      let errors: Vec<String> = table
        .records()
        .enumerate()
        .flat_map(|(i, record)| {
          validate_record(&schema, &record)
            .into_iter()
            .map(move |e| format!("row {}: {e}", i + 1))
        })
        .take(MAX_SCHEMA_ERRORS)
        .collect();
      if !errors.is_empty() {
        return Err(Error::SchemaViolation { file: source_file, round_id: round, errors });
      }
    }

    let mut metadata = Map::new();
    metadata.insert("round_id".into(), Value::from(round.as_str()));
    metadata.insert("hash_value".into(), Value::from(hash_value.as_str()));
    metadata.insert("record_count".into(), Value::from(record_count));
    let raw_object = self.lake.store_raw(path, metadata).await?;

    let lineage = self
      .store
      .record_lineage(NewLineage {
        source_file: source_file.clone(),
        ingestion_time: ingested_at,
        record_count: record_count as i64,
        hash_value: hash_value.clone(),
        metadata: json!({
          "round_id": round,
          "file_type": "survey",
          "raw_object": raw_object,
          "columns": table.columns,
        }),
        parent_lineage_id: None,
      })
      .await
      .map_err(Error::store)?;

    let staged = self
      .lake
      .put_staged(&StagedBatch {
        source_file: source_file.clone(),
        round_id: round,
        lineage_id: lineage.lineage_id,
        hash_value,
        ingested_at,
        table,
      })
      .await;
    let object = match staged {
      Ok(object) => object,
      Err(e) => {
        // An unstaged file must not be skipped as already ingested.
        if let Err(undo) = self.store.remove_lineage(lineage.lineage_id).await {
          error!(lineage_id = lineage.lineage_id, error = %undo, "failed to roll back lineage");
        }
        return Err(e);
      }
    };

    info!(
      file = %source_file,
      lineage_id = lineage.lineage_id,
      records = record_count,
      object = %object,
      "ingested file"
    );
    Ok(Some((object, record_count)))
  }

  // ── Load ──────────────────────────────────────────────────────────────────

  /// Transform and load every staged batch, oldest name first. Each batch
  /// is loaded atomically, its changes logged against its lineage, and the
  /// batch archived. A batch that fails is moved under `failed/`, the error
  /// noted on its lineage, and the stage carries on.
  pub async fn load(&self) -> Result<LoadReport> {
    let mut report = LoadReport::default();

    for object in self.lake.list(PROCESSED_PREFIX).await? {
      let staged = match self.lake.get_staged(&object).await {
        Ok(staged) => staged,
        Err(e) => {
          self.reject(&object, None, e, &mut report).await?;
          continue;
        }
      };

      let (summary, stats) = match self.load_batch(&object, &staged).await {
        Ok(loaded) => loaded,
        Err(e) => {
          self.reject(&object, Some(staged.lineage_id), e, &mut report).await?;
          continue;
        }
      };

      for (table, tally) in summary.tables {
        let total = report.summary.tables.entry(table).or_default();
        total.inserted += tally.inserted;
        total.updated += tally.updated;
        total.unchanged += tally.unchanged;
      }
      report.transform.push(stats);
      report.batches += 1;
    }

    info!(batches = report.batches, failed = report.failed_batches, "load finished");
    Ok(report)
  }

  async fn load_batch(
    &self,
    object: &str,
    staged: &StagedBatch,
  ) -> Result<(LoadSummary, TransformStats)> {
    let transformed = transform(&staged.table)?;
    if transformed.stats.rows_without_household > 0 || transformed.stats.surveys_without_date > 0 {
      warn!(
        object = %object,
        without_household = transformed.stats.rows_without_household,
        without_date = transformed.stats.surveys_without_date,
        "dropped rows while transforming"
      );
    }

    let summary = self
      .store
      .load(transformed.batch)
      .await
      .map_err(Error::store)?;
    self
      .store
      .record_changes(staged.lineage_id, change_log(&summary))
      .await
      .map_err(Error::store)?;
    self
      .store
      .annotate_lineage(
        staged.lineage_id,
        json!({ "load_status": "loaded", "load_error": null, "failed_object": null }),
      )
      .await
      .map_err(Error::store)?;
    self.lake.archive(object).await?;

    info!(
      object = %object,
      households = summary.tally("households").total(),
      surveys = summary.tally("household_surveys").total(),
      measurements = summary.tally("household_measurements").total(),
      "loaded batch"
    );
    Ok((summary, transformed.stats))
  }

  /// Quarantine a batch that failed to load and note why on its lineage.
  async fn reject(
    &self,
    object: &str,
    lineage_id: Option<i64>,
    error: Error,
    report: &mut LoadReport,
  ) -> Result<()> {
    let failed = self.lake.quarantine(object).await?;
    let message = error.to_string();
    if let Some(lineage_id) = lineage_id {
      self
        .store
        .annotate_lineage(
          lineage_id,
          json!({ "load_status": "failed", "load_error": message, "failed_object": failed }),
        )
        .await
        .map_err(Error::store)?;
    }

    error!(object = %object, quarantined = %failed, error = %message, "failed to load batch");
    report.failed_batches += 1;
    report.failures.push(StageFailure { name: failed, error: message });
    Ok(())
  }

  /// Move every quarantined batch back under `processed/` for the next
  /// load. Returns the requeued object names.
  pub async fn requeue(&self) -> Result<Vec<String>> {
    let mut requeued = Vec::new();
    for object in self.lake.list(FAILED_PREFIX).await? {
      requeued.push(self.lake.requeue(&object).await?);
    }
    info!(count = requeued.len(), "requeued failed batches");
    Ok(requeued)
  }

  // ── Quality ───────────────────────────────────────────────────────────────

  /// Assess the warehouse and append the result to `data_quality_logs`.
  pub async fn quality(&self, as_of: NaiveDate) -> Result<QualityReport> {
    let report = self.store.assess_quality(as_of).await.map_err(Error::store)?;
    self
      .store
      .log_quality(report.to_log()?)
      .await
      .map_err(Error::store)?;

    for issue in report.issues() {
      warn!(
        check_type = %issue.check_type,
        check = %issue.check_name,
        count = issue.count,
        severity = ?issue.severity,
        "data quality issue"
      );
    }
    info!(score = report.overall_quality_score, "quality assessment finished");
    Ok(report)
  }

  // ── Run ───────────────────────────────────────────────────────────────────

  /// Ingest, load and assess inside one `pipeline_logs` row, then record
  /// the run's metrics and alerts. A failing stage marks the run `failed`,
  /// raises a critical alert and stops it.
  pub async fn run(&self, as_of: NaiveDate) -> Result<RunReport> {
    let started = Instant::now();
    let run_id = Uuid::new_v4().to_string();
    let log = self
      .store
      .start_pipeline_run(self.name.clone(), run_id.clone())
      .await
      .map_err(Error::store)?;
    info!(pipeline = %self.name, run_id = %run_id, "pipeline run started");

    let outcome = match self.stages(as_of).await {
      Ok((ingest, load, quality)) => self
        .monitor(log.log_id, &ingest, &load, &quality, started.elapsed())
        .await
        .map(|()| (ingest, load, quality))
        .map_err(|e| ("monitoring", e)),
      Err(failure) => Err(failure),
    };

    match outcome {
      Ok((ingest, load, quality)) => {
        let details = json!({
          "ingest": ingest,
          "load": load,
          "overall_quality_score": quality.overall_quality_score,
        });
        self
          .store
          .finish_pipeline_run(log.log_id, PipelineStatus::Completed, details)
          .await
          .map_err(Error::store)?;
        info!(run_id = %run_id, "pipeline run completed");
        Ok(RunReport { run_id, log_id: log.log_id, ingest, load, quality })
      }
      Err((stage, e)) => {
        error!(run_id = %run_id, stage, error = %e, "pipeline run failed");
        let alert = NewAlert {
          alert_type:    "pipeline_failure".to_owned(),
          alert_message: format!("{stage} stage failed: {e}"),
          severity:      AlertSeverity::Critical,
          metadata:      json!({ "stage": stage, "run_id": run_id }),
        };
        if let Err(alert_err) = self.store.record_alert(log.log_id, alert).await {
          warn!(run_id = %run_id, error = %alert_err, "failed to record alert");
        }
        self
          .store
          .finish_pipeline_run(
            log.log_id,
            PipelineStatus::Failed,
            json!({ "stage": stage, "error": e.to_string() }),
          )
          .await
          .map_err(Error::store)?;
        Err(e)
      }
    }
  }

  async fn stages(
    &self,
    as_of: NaiveDate,
  ) -> Result<(IngestReport, LoadReport, QualityReport), (&'static str, Error)> {
    let ingest = self.ingest().await.map_err(|e| ("ingest", e))?;
    let load = self.load().await.map_err(|e| ("load", e))?;
    let quality = self.quality(as_of).await.map_err(|e| ("quality", e))?;
    Ok((ingest, load, quality))
  }

  async fn monitor(
    &self,
    log_id: i64,
    ingest: &IngestReport,
    load: &LoadReport,
    quality: &QualityReport,
    elapsed: Duration,
  ) -> Result<()> {
    self
      .store
      .record_metrics(log_id, run_metrics(ingest, load, quality, elapsed))
      .await
      .map_err(Error::store)?;
    for alert in run_alerts(ingest, load, quality) {
      warn!(alert_type = %alert.alert_type, severity = %alert.severity, "{}", alert.alert_message);
      self
        .store
        .record_alert(log_id, alert)
        .await
        .map_err(Error::store)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use rtv_core::{
    audit::AlertStatus,
    progress::ProgressQuery,
    quality::{Issue, QualityCheckType},
    registry::{ColumnDefinition, DataType},
  };
  use rtv_store_sqlite::SqliteStore;
  use tempfile::TempDir;

  use super::*;

  const BASELINE: &str = "\
household_id,village_id,household_code,head_of_household,household_size,survey_date,status,indicator_income_monthly
H1,V1,kb-001,jane doe,5,2024-03-01,completed,120
H2,V1,kb-002,john roe,4,2024-03-02,completed,80
";

  const MIDLINE: &str = "\
household_id,village_id,household_code,head_of_household,household_size,survey_date,status,indicator_income_monthly
H1,V1,kb-001,jane doe,5,2024-03-04,completed,150
";

  struct Fixture {
    _dir:     TempDir,
    source:   PathBuf,
    pipeline: Pipeline<SqliteStore>,
  }

  async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("data");
    std::fs::create_dir_all(&source).unwrap();

    let config = PipelineConfig {
      source_dir: source.clone(),
      lake_dir: dir.path().join("lake"),
      ..Default::default()
    };
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let lake = DataLake::open(&config.lake_dir).await.unwrap();
    Fixture { _dir: dir, source, pipeline: Pipeline::new(store, lake, &config) }
  }

  fn as_of() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 3, 5).unwrap() }

  #[tokio::test]
  async fn ingest_stages_files_and_skips_repeats() {
    let f = fixture().await;
    std::fs::write(f.source.join("01_baseline.csv"), BASELINE).unwrap();
    std::fs::write(f.source.join("notes.txt"), "ignored").unwrap();
    std::fs::write(f.source.join("02_broken.csv"), "").unwrap();

    let report = f.pipeline.ingest().await.unwrap();
    assert_eq!(report.total_files, 2);
    assert_eq!(report.processed_files, 1);
    assert_eq!(report.failed_files, 1);
    assert_eq!(report.total_records, 2);
    assert!(report.staged[0].starts_with("processed/01_baseline_"));

    let staged = f.pipeline.lake().get_staged(&report.staged[0]).await.unwrap();
    assert_eq!(staged.round_id, "01");
    assert!(staged.table.has_column("survey_round"));

    let again = f.pipeline.ingest().await.unwrap();
    assert_eq!(again.processed_files, 0);
    assert_eq!(again.skipped_files, 1);
  }

  #[tokio::test]
  async fn schema_violations_reject_the_file() {
    let f = fixture().await;
    let mut size = ColumnDefinition::new("household_size", DataType::Integer);
    size.description = "Members of the household".into();
    f.pipeline
      .store()
      .register_column("01".into(), size, None)
      .await
      .unwrap();
    f.pipeline
      .store()
      .register_column("01".into(), ColumnDefinition::new("consent", DataType::Boolean), None)
      .await
      .unwrap();
    let path = f.source.join("01_baseline.csv");
    std::fs::write(&path, BASELINE).unwrap();

    match f.pipeline.ingest_file(&path).await {
      Err(Error::SchemaViolation { round_id, errors, .. }) => {
        assert_eq!(round_id, "01");
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("row 1: required column consent"));
      }
      other => panic!("expected SchemaViolation, got {other:?}"),
    }
    assert!(f.pipeline.lake().list("").await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn load_moves_batches_into_the_warehouse() {
    let f = fixture().await;
    std::fs::write(f.source.join("01_baseline.csv"), BASELINE).unwrap();
    let ingest = f.pipeline.ingest().await.unwrap();

    let report = f.pipeline.load().await.unwrap();
    assert_eq!(report.batches, 1);
    assert_eq!(report.summary.tally("households").inserted, 2);
    assert_eq!(report.summary.tally("household_measurements").inserted, 2);

    let rows = f.pipeline.store().progress(&ProgressQuery::default()).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].household_code, "KB-001");
    assert_eq!(rows[0].survey_round, "Baseline");

    let archived = f.pipeline.lake().list("archive/").await.unwrap();
    assert_eq!(archived, [format!("archive/{}", ingest.staged[0])]);

    let history = f.pipeline.store().lineage_history(10).await.unwrap();
    let households = history[0]
      .changes
      .iter()
      .find(|c| c.table_name == "households")
      .unwrap();
    assert_eq!(households.operation, ChangeOperation::Insert);
    assert_eq!(households.total_records, 2);
  }

  #[tokio::test]
  async fn run_is_logged_and_scored() {
    let f = fixture().await;
    std::fs::write(f.source.join("01_baseline.csv"), BASELINE).unwrap();

    let report = f.pipeline.run(as_of()).await.unwrap();
    assert_eq!(report.ingest.processed_files, 1);
    assert_eq!(report.load.batches, 1);
    assert_eq!(report.quality.timeliness_score, 100.0);

    let runs = f.pipeline.store().recent_pipeline_runs(1).await.unwrap();
    assert_eq!(runs[0].run_id, report.run_id);
    assert_eq!(runs[0].status, PipelineStatus::Completed);
    assert_eq!(runs[0].details["ingest"]["processed_files"], 1);

    let logs = f.pipeline.store().recent_quality_logs(1).await.unwrap();
    assert_eq!(logs[0].check_type, "data_quality");

    let overview = f.pipeline.store().overview(as_of()).await.unwrap();
    let score = overview.data_quality_score.unwrap();
    assert!((score - report.quality.overall_quality_score).abs() < 1e-9);
  }

  #[tokio::test]
  async fn failing_stage_marks_the_run_failed() {
    let f = fixture().await;
    std::fs::remove_dir_all(&f.source).unwrap();

    assert!(matches!(f.pipeline.run(as_of()).await, Err(Error::Io(_))));

    let runs = f.pipeline.store().recent_pipeline_runs(1).await.unwrap();
    assert_eq!(runs[0].status, PipelineStatus::Failed);
    assert_eq!(runs[0].details["stage"], "ingest");
    assert!(runs[0].end_time.is_some());

    let alerts = f.pipeline.store().active_alerts(None, None).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, "pipeline_failure");
    assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    assert_eq!(alerts[0].metadata["stage"], "ingest");
  }

  #[tokio::test]
  async fn run_records_its_metrics() {
    let f = fixture().await;
    std::fs::write(f.source.join("01_baseline.csv"), BASELINE).unwrap();

    let report = f.pipeline.run(as_of()).await.unwrap();

    let store = f.pipeline.store();
    let loaded = store
      .pipeline_metrics(None, Some("batches_loaded".into()), 10)
      .await
      .unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].run_id, report.run_id);
    assert_eq!(loaded[0].metric_value, 1.0);

    let inserted = store
      .pipeline_metrics(Some("rtv_pipeline".into()), Some("rows_inserted".into()), 50)
      .await
      .unwrap();
    let households = inserted
      .iter()
      .find(|m| m.metadata["table"] == "households")
      .unwrap();
    assert_eq!(households.metric_value, 2.0);

    let score = store
      .pipeline_metrics(None, Some("overall_quality_score".into()), 1)
      .await
      .unwrap();
    assert_eq!(score[0].metric_type, MetricType::Gauge);
    assert_eq!(score[0].metric_value, report.quality.overall_quality_score);

    assert!(store.active_alerts(None, None).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn blank_household_codes_still_load() {
    let f = fixture().await;
    let blank_codes = BASELINE.replace("kb-001", "").replace("kb-002", "");
    std::fs::write(f.source.join("01_baseline.csv"), blank_codes).unwrap();
    f.pipeline.ingest().await.unwrap();

    let report = f.pipeline.load().await.unwrap();
    assert_eq!(report.failed_batches, 0);
    assert_eq!(report.summary.tally("households").inserted, 2);

    let rows = f.pipeline.store().progress(&ProgressQuery::default()).await.unwrap();
    let mut codes: Vec<_> = rows.iter().map(|r| r.household_code.as_str()).collect();
    codes.sort_unstable();
    assert_eq!(codes, ["H1", "H2"]);
  }

  #[tokio::test]
  async fn uploads_staged_in_the_same_second_are_all_loaded() {
    let f = fixture().await;
    std::fs::write(f.source.join("01_baseline.csv"), BASELINE).unwrap();
    std::fs::write(f.source.join("01_baseline.CSV"), MIDLINE).unwrap();

    let ingest = f.pipeline.ingest().await.unwrap();
    assert_eq!(ingest.processed_files, 2);
    assert_ne!(ingest.staged[0], ingest.staged[1]);
    assert!(ingest.staged.iter().all(|o| o.starts_with("processed/01_baseline_")));

    let load = f.pipeline.load().await.unwrap();
    assert_eq!(load.batches, 2);
    assert_eq!(f.pipeline.lake().list("archive/").await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn staging_failure_leaves_the_file_ingestible() {
    let f = fixture().await;
    let path = f.source.join("01_baseline.csv");
    std::fs::write(&path, BASELINE).unwrap();
    // A plain file where the staging directory belongs.
    let blocker = f.pipeline.lake().root().join("processed");
    std::fs::write(&blocker, "").unwrap();

    assert!(matches!(f.pipeline.ingest_file(&path).await, Err(Error::Io(_))));
    assert!(f.pipeline.store().lineage_history(10).await.unwrap().is_empty());

    std::fs::remove_file(&blocker).unwrap();
    let (object, records) = f.pipeline.ingest_file(&path).await.unwrap().unwrap();
    assert!(object.starts_with("processed/01_baseline_"));
    assert_eq!(records, 2);
    assert_eq!(f.pipeline.store().lineage_history(10).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn bad_batch_is_quarantined_and_later_runs_proceed() {
    let f = fixture().await;
    let path = f.source.join("01_baseline.csv");
    std::fs::write(&path, BASELINE).unwrap();
    let ingest = f.pipeline.ingest().await.unwrap();

    // Restage the batch without cleaning it, so it lacks `survey_round`.
    let lake = f.pipeline.lake();
    let mut batch = lake.get_staged(&ingest.staged[0]).await.unwrap();
    batch.table = rtv_etl::read_table(&path).unwrap();
    assert!(lake.delete(&ingest.staged[0]).await.unwrap());
    let broken = lake.put_staged(&batch).await.unwrap();

    let first = f.pipeline.run(as_of()).await.unwrap();
    let quarantined = format!("{FAILED_PREFIX}{broken}");
    assert_eq!(first.ingest.skipped_files, 1);
    assert_eq!(first.load.batches, 0);
    assert_eq!(first.load.failed_batches, 1);
    assert_eq!(first.load.failures[0].name, quarantined);
    assert_eq!(lake.list(FAILED_PREFIX).await.unwrap(), [quarantined.clone()]);
    assert!(lake.list(PROCESSED_PREFIX).await.unwrap().is_empty());

    let lineage = f
      .pipeline
      .store()
      .find_lineage_by_hash(batch.hash_value.clone())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(lineage.metadata["load_status"], "failed");
    assert_eq!(lineage.metadata["failed_object"], quarantined.as_str());
    assert!(lineage.metadata["load_error"].as_str().unwrap().contains("survey_round"));

    let alerts = f.pipeline.store().active_alerts(None, None).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, "load_failure");
    assert_eq!(alerts[0].severity, AlertSeverity::Error);
    assert_eq!(alerts[0].status, AlertStatus::Active);

    std::fs::write(f.source.join("02_midline.csv"), MIDLINE).unwrap();
    let second = f.pipeline.run(as_of()).await.unwrap();
    assert_eq!(second.ingest.processed_files, 1);
    assert_eq!(second.load.batches, 1);
    assert_eq!(second.load.failed_batches, 0);

    let runs = f.pipeline.store().recent_pipeline_runs(2).await.unwrap();
    assert!(runs.iter().all(|r| r.status == PipelineStatus::Completed));
    assert_eq!(lake.list(FAILED_PREFIX).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn requeued_batches_load_and_clear_their_error() {
    let f = fixture().await;
    std::fs::write(f.source.join("01_baseline.csv"), BASELINE).unwrap();
    let ingest = f.pipeline.ingest().await.unwrap();
    let staged = &ingest.staged[0];
    f.pipeline.lake().quarantine(staged).await.unwrap();
    assert_eq!(f.pipeline.load().await.unwrap().batches, 0);

    assert_eq!(f.pipeline.requeue().await.unwrap(), [staged.clone()]);
    let load = f.pipeline.load().await.unwrap();
    assert_eq!(load.batches, 1);

    let history = f.pipeline.store().lineage_history(1).await.unwrap();
    let metadata = &history[0].lineage.metadata;
    assert_eq!(metadata["load_status"], "loaded");
    assert!(metadata.get("load_error").is_none());
  }

  #[test]
  fn run_alerts_cover_failures_and_high_severity_issues() {
    let issue = |check_name: &str, severity| Issue {
      check_type: QualityCheckType::Consistency,
      check_name: check_name.to_owned(),
      count: 150,
      severity,
    };
    let quality = QualityReport::new(
      as_of(),
      BTreeMap::new(),
      vec![
        issue("orphan_surveys", Severity::High),
        issue("orphan_measurements", Severity::Medium),
      ],
      100.0,
      Vec::new(),
      Vec::new(),
    );
    let ingest = IngestReport {
      failures: vec![StageFailure { name: "02_broken.csv".into(), error: "empty".into() }],
      ..Default::default()
    };

    let alerts = run_alerts(&ingest, &LoadReport::default(), &quality);
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].alert_type, "ingest_failure");
    assert_eq!(alerts[0].severity, AlertSeverity::Warning);
    assert_eq!(alerts[1].alert_type, "data_quality");
    assert_eq!(alerts[1].severity, AlertSeverity::Error);
    assert_eq!(alerts[1].metadata["check_name"], "orphan_surveys");
  }

  #[test]
  fn change_log_skips_empty_operations() {
    let mut summary = LoadSummary::default();
    summary.record("households", rtv_core::fact::Change::Inserted);
    summary.record("households", rtv_core::fact::Change::Unchanged);
    summary.record("indicators", rtv_core::fact::Change::Unchanged);

    let changes = change_log(&summary);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].table_name, "households");
    assert_eq!(changes[0].operation, ChangeOperation::Insert);
    assert_eq!(changes[0].details["unchanged"], 1);
  }
}
