//! Audit records: data-quality logs, pipeline run logs, run metrics and
//! alerts, and lineage.
//!
//! All of these are append-only, with three exceptions: a pipeline log row
//! is closed exactly once when its run finishes, an alert is resolved at most
//! once, and a lineage row's metadata records how its batch was loaded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

// ─── Data quality ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityLog {
  pub log_id:            i64,
  pub table_name:        String,
  pub check_type:        String,
  pub check_description: Option<String>,
  pub status:            String,
  pub details:           serde_json::Value,
  pub created_at:        DateTime<Utc>,
}

/// Input to [`crate::store::Warehouse::log_quality`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewQualityLog {
  pub table_name:        String,
  pub check_type:        String,
  pub check_description: Option<String>,
  pub status:            String,
  pub details:           serde_json::Value,
}

// ─── Pipeline runs ───────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PipelineStatus {
  Running,
  Completed,
  Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineLog {
  pub log_id:        i64,
  pub pipeline_name: String,
  pub run_id:        String,
  pub status:        PipelineStatus,
  pub start_time:    DateTime<Utc>,
  /// `None` while the run is still in progress.
  pub end_time:      Option<DateTime<Utc>>,
  pub details:       serde_json::Value,
}

// ─── Lineage ─────────────────────────────────────────────────────────────────

/// Where a batch of rows came from and what it looked like on arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataLineage {
  pub lineage_id:        i64,
  pub source_file:       String,
  pub ingestion_time:    DateTime<Utc>,
  pub record_count:      i64,
  /// SHA-256 hex digest of the column-sorted table contents.
  pub hash_value:        String,
  pub metadata:          serde_json::Value,
  pub parent_lineage_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLineage {
  pub source_file:       String,
  pub ingestion_time:    DateTime<Utc>,
  pub record_count:      i64,
  pub hash_value:        String,
  pub metadata:          serde_json::Value,
  pub parent_lineage_id: Option<i64>,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ChangeOperation {
  Insert,
  Update,
}

/// One row of the change log: how many rows of a table a lineage batch
/// inserted or updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
  pub change_id:    i64,
  pub lineage_id:   i64,
  pub table_name:   String,
  pub operation:    ChangeOperation,
  pub record_count: i64,
  pub change_time:  DateTime<Utc>,
  pub details:      serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewChange {
  pub table_name:   String,
  pub operation:    ChangeOperation,
  pub record_count: i64,
  pub details:      serde_json::Value,
}

/// A lineage row with its change log rolled up; returned by
/// [`crate::store::Warehouse::lineage_history`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageSummary {
  pub lineage: DataLineage,
  pub changes: Vec<ChangeCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeCount {
  pub table_name:    String,
  pub operation:     ChangeOperation,
  pub total_records: i64,
  pub change_count:  i64,
}

// ─── Monitoring ──────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MetricType {
  /// Files, batches or rows.
  Count,
  /// A percentage score.
  Gauge,
  /// Seconds.
  Duration,
}

/// A measured value of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetric {
  pub metric_id:    i64,
  pub log_id:       i64,
  pub run_id:       String,
  pub metric_name:  String,
  pub metric_value: f64,
  pub metric_type:  MetricType,
  pub recorded_at:  DateTime<Utc>,
  pub metadata:     serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMetric {
  pub metric_name:  String,
  pub metric_value: f64,
  pub metric_type:  MetricType,
  pub metadata:     serde_json::Value,
}

impl NewMetric {
  pub fn new(name: impl Into<String>, value: f64, metric_type: MetricType) -> Self {
    Self {
      metric_name: name.into(),
      metric_value: value,
      metric_type,
      metadata: serde_json::Value::Object(Default::default()),
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AlertSeverity {
  Info,
  Warning,
  Error,
  Critical,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AlertStatus {
  Active,
  Resolved,
}

/// Something a pipeline run wants an operator to look at. Alerts stay
/// active until resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineAlert {
  pub alert_id:      i64,
  pub log_id:        i64,
  pub pipeline_name: String,
  pub alert_type:    String,
  pub alert_message: String,
  pub severity:      AlertSeverity,
  pub status:        AlertStatus,
  pub created_at:    DateTime<Utc>,
  pub resolved_at:   Option<DateTime<Utc>>,
  pub metadata:      serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
  pub alert_type:    String,
  pub alert_message: String,
  pub severity:      AlertSeverity,
  pub metadata:      serde_json::Value,
}
