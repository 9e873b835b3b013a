//! The `Warehouse` trait.
//!
//! The trait is implemented by storage backends (e.g. `rtv-store-sqlite`).
//! Higher layers (`rtv-api`, `rtv-pipeline`) depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  audit::{
    AlertSeverity, ChangeCount, ChangeRecord, DataLineage, DataQualityLog, LineageSummary,
    NewAlert, NewChange, NewLineage, NewMetric, NewQualityLog, PipelineAlert, PipelineLog,
    PipelineMetric, PipelineStatus,
  },
  batch::{LoadSummary, WarehouseBatch},
  dimension::{
    Household, Indicator, NewHousehold, NewIndicator, NewSurveyRound, NewVillage, SurveyRound,
    Village,
  },
  fact::{HouseholdMeasurement, HouseholdSurvey, NewMeasurement, NewSurvey, SurveyStatus, Upserted},
  progress::{HouseholdProgress, Overview, ProgressQuery},
  quality::QualityReport,
  registry::{ColumnDefinition, SchemaChanges},
};

/// Abstraction over a survey warehouse backend.
///
/// Dimension writes are upserts. Fact writes come in two flavours: strict
/// `record_*` inserts that reject duplicates, and `upsert_*` used by reloads.
/// Audit tables are append-only.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait Warehouse: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Dimensions ────────────────────────────────────────────────────────

  fn upsert_village(
    &self,
    input: NewVillage,
  ) -> impl Future<Output = Result<Upserted<Village>, Self::Error>> + Send + '_;

  fn get_village(
    &self,
    village_id: String,
  ) -> impl Future<Output = Result<Option<Village>, Self::Error>> + Send + '_;

  fn list_villages(&self) -> impl Future<Output = Result<Vec<Village>, Self::Error>> + Send + '_;

  /// Insert or update a household. Fails if its village does not exist.
  fn upsert_household(
    &self,
    input: NewHousehold,
  ) -> impl Future<Output = Result<Upserted<Household>, Self::Error>> + Send + '_;

  fn get_household(
    &self,
    household_id: String,
  ) -> impl Future<Output = Result<Option<Household>, Self::Error>> + Send + '_;

  /// List households, optionally restricted to one village.
  fn list_households(
    &self,
    village_id: Option<String>,
  ) -> impl Future<Output = Result<Vec<Household>, Self::Error>> + Send + '_;

  fn upsert_round(
    &self,
    input: NewSurveyRound,
  ) -> impl Future<Output = Result<Upserted<SurveyRound>, Self::Error>> + Send + '_;

  fn get_round(
    &self,
    round_id: String,
  ) -> impl Future<Output = Result<Option<SurveyRound>, Self::Error>> + Send + '_;

  fn list_rounds(&self) -> impl Future<Output = Result<Vec<SurveyRound>, Self::Error>> + Send + '_;

  fn upsert_indicator(
    &self,
    input: NewIndicator,
  ) -> impl Future<Output = Result<Upserted<Indicator>, Self::Error>> + Send + '_;

  fn get_indicator(
    &self,
    indicator_id: String,
  ) -> impl Future<Output = Result<Option<Indicator>, Self::Error>> + Send + '_;

  fn list_indicators(
    &self,
  ) -> impl Future<Output = Result<Vec<Indicator>, Self::Error>> + Send + '_;

  // ── Facts ─────────────────────────────────────────────────────────────

  /// Insert a survey header. A second survey for the same household and
  /// round is rejected.
  fn record_survey(
    &self,
    input: NewSurvey,
  ) -> impl Future<Output = Result<HouseholdSurvey, Self::Error>> + Send + '_;

  /// Insert a survey header, or update date, surveyor and status of the one
  /// already stored for the same household and round.
  fn upsert_survey(
    &self,
    input: NewSurvey,
  ) -> impl Future<Output = Result<Upserted<HouseholdSurvey>, Self::Error>> + Send + '_;

  fn find_survey(
    &self,
    household_id: String,
    round_id: String,
  ) -> impl Future<Output = Result<Option<HouseholdSurvey>, Self::Error>> + Send + '_;

  fn update_survey_status(
    &self,
    survey_id: i64,
    status: SurveyStatus,
  ) -> impl Future<Output = Result<HouseholdSurvey, Self::Error>> + Send + '_;

  /// Insert a measurement. A second measurement for the same survey and
  /// indicator is rejected.
  fn record_measurement(
    &self,
    input: NewMeasurement,
  ) -> impl Future<Output = Result<HouseholdMeasurement, Self::Error>> + Send + '_;

  fn upsert_measurement(
    &self,
    input: NewMeasurement,
  ) -> impl Future<Output = Result<Upserted<HouseholdMeasurement>, Self::Error>> + Send + '_;

  fn list_measurements(
    &self,
    survey_id: i64,
  ) -> impl Future<Output = Result<Vec<HouseholdMeasurement>, Self::Error>> + Send + '_;

  /// Upsert every row of `batch` atomically: either the whole batch is
  /// stored or nothing is.
  fn load(
    &self,
    batch: WarehouseBatch,
  ) -> impl Future<Output = Result<LoadSummary, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Rows of the `household_progress` view matching `query`, ordered by
  /// household, survey date and indicator.
  fn progress<'a>(
    &'a self,
    query: &'a ProgressQuery,
  ) -> impl Future<Output = Result<Vec<HouseholdProgress>, Self::Error>> + Send + 'a;

  fn overview(
    &self,
    as_of: NaiveDate,
  ) -> impl Future<Output = Result<Overview, Self::Error>> + Send + '_;

  // ── Audit ─────────────────────────────────────────────────────────────

  fn log_quality(
    &self,
    input: NewQualityLog,
  ) -> impl Future<Output = Result<DataQualityLog, Self::Error>> + Send + '_;

  /// Most recent quality logs first.
  fn recent_quality_logs(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<DataQualityLog>, Self::Error>> + Send + '_;

  /// Open a pipeline log row with status `running`.
  fn start_pipeline_run(
    &self,
    pipeline_name: String,
    run_id: String,
  ) -> impl Future<Output = Result<PipelineLog, Self::Error>> + Send + '_;

  /// Close a running pipeline log row. Closing a finished run is an error.
  fn finish_pipeline_run(
    &self,
    log_id: i64,
    status: PipelineStatus,
    details: serde_json::Value,
  ) -> impl Future<Output = Result<PipelineLog, Self::Error>> + Send + '_;

  fn recent_pipeline_runs(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<PipelineLog>, Self::Error>> + Send + '_;

  // ── Monitoring ────────────────────────────────────────────────────────

  /// Attach metrics to a pipeline run, all or none.
  fn record_metrics(
    &self,
    log_id: i64,
    metrics: Vec<NewMetric>,
  ) -> impl Future<Output = Result<Vec<PipelineMetric>, Self::Error>> + Send + '_;

  /// Most recent metrics first, optionally narrowed to one pipeline and one
  /// metric name.
  fn pipeline_metrics(
    &self,
    pipeline_name: Option<String>,
    metric_name: Option<String>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<PipelineMetric>, Self::Error>> + Send + '_;

  /// Raise an active alert against a pipeline run.
  fn record_alert(
    &self,
    log_id: i64,
    alert: NewAlert,
  ) -> impl Future<Output = Result<PipelineAlert, Self::Error>> + Send + '_;

  /// Unresolved alerts, newest first.
  fn active_alerts(
    &self,
    pipeline_name: Option<String>,
    severity: Option<AlertSeverity>,
  ) -> impl Future<Output = Result<Vec<PipelineAlert>, Self::Error>> + Send + '_;

  /// Resolve an active alert. Resolving it again is an error.
  fn resolve_alert(
    &self,
    alert_id: i64,
  ) -> impl Future<Output = Result<PipelineAlert, Self::Error>> + Send + '_;

  // ── Lineage ───────────────────────────────────────────────────────────

  /// The most recent lineage row with this content hash, if any.
  fn find_lineage_by_hash(
    &self,
    hash_value: String,
  ) -> impl Future<Output = Result<Option<DataLineage>, Self::Error>> + Send + '_;

  fn record_lineage(
    &self,
    input: NewLineage,
  ) -> impl Future<Output = Result<DataLineage, Self::Error>> + Send + '_;

  fn record_changes(
    &self,
    lineage_id: i64,
    changes: Vec<NewChange>,
  ) -> impl Future<Output = Result<Vec<ChangeRecord>, Self::Error>> + Send + '_;

  /// Most recent lineage rows first, each with its change log rolled up.
  fn lineage_history(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<LineageSummary>, Self::Error>> + Send + '_;

  fn change_summary(
    &self,
    lineage_id: i64,
  ) -> impl Future<Output = Result<Vec<ChangeCount>, Self::Error>> + Send + '_;

  /// Merge `patch` into a lineage row's metadata (JSON merge patch: `null`
  /// removes a key).
  fn annotate_lineage(
    &self,
    lineage_id: i64,
    patch: serde_json::Value,
  ) -> impl Future<Output = Result<DataLineage, Self::Error>> + Send + '_;

  /// Delete a lineage row and its change log. Returns `false` when there was
  /// no such row.
  fn remove_lineage(
    &self,
    lineage_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Schema registry ───────────────────────────────────────────────────

  /// Register a column for a round and return its new version. An existing
  /// active version is deprecated and the change is logged with `reason`.
  fn register_column(
    &self,
    round_id: String,
    column: ColumnDefinition,
    reason: Option<String>,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// A specific version of a column, or the active one when `version` is
  /// `None`.
  fn column_definition(
    &self,
    round_id: String,
    column_name: String,
    version: Option<i64>,
  ) -> impl Future<Output = Result<Option<ColumnDefinition>, Self::Error>> + Send + '_;

  /// All active column definitions of a round, sorted by name.
  fn active_schema(
    &self,
    round_id: String,
  ) -> impl Future<Output = Result<Vec<ColumnDefinition>, Self::Error>> + Send + '_;

  fn detect_schema_changes(
    &self,
    current_round: String,
    previous_round: String,
  ) -> impl Future<Output = Result<SchemaChanges, Self::Error>> + Send + '_;

  // ── Quality ───────────────────────────────────────────────────────────

  /// Run every quality check against the stored data. `as_of` anchors the
  /// timeliness window.
  fn assess_quality(
    &self,
    as_of: NaiveDate,
  ) -> impl Future<Output = Result<QualityReport, Self::Error>> + Send + '_;
}
