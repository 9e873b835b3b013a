//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Audit timestamps are RFC 3339 strings written by SQLite. Calendar dates are
//! `YYYY-MM-DD`. JSON payloads are stored as compact text.

use chrono::{DateTime, NaiveDate, Utc};
use rtv_core::{
  audit::{
    AlertSeverity, AlertStatus, ChangeCount, ChangeOperation, ChangeRecord, DataLineage,
    DataQualityLog, MetricType, PipelineAlert, PipelineLog, PipelineMetric, PipelineStatus,
  },
  dimension::{GeoPoint, Household, Indicator, SurveyRound, Village},
  fact::{HouseholdMeasurement, HouseholdSurvey, SurveyStatus},
  progress::HouseholdProgress,
  registry::{ColumnDefinition, DataType},
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

fn decode_opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
  s.as_deref().map(decode_date).transpose()
}

// ─── JSON ────────────────────────────────────────────────────────────────────

pub fn decode_json(s: &str) -> Result<serde_json::Value> { Ok(serde_json::from_str(s)?) }

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_pipeline_status(s: &str) -> Result<PipelineStatus> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown pipeline status: {s:?}")))
}

pub fn decode_change_operation(s: &str) -> Result<ChangeOperation> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown change operation: {s:?}")))
}

pub fn decode_data_type(s: &str) -> Result<DataType> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown data type: {s:?}")))
}

fn decode_metric_type(s: &str) -> Result<MetricType> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown metric type: {s:?}")))
}

fn decode_alert_severity(s: &str) -> Result<AlertSeverity> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown alert severity: {s:?}")))
}

fn decode_alert_status(s: &str) -> Result<AlertStatus> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown alert status: {s:?}")))
}

// ─── Villages ────────────────────────────────────────────────────────────────

pub const VILLAGE_COLUMNS: &str =
  "village_id, name, district, region, latitude, longitude, created_at";

#[derive(Debug, Clone, PartialEq)]
pub struct RawVillage {
  pub village_id: String,
  pub name:       String,
  pub district:   Option<String>,
  pub region:     Option<String>,
  pub latitude:   Option<f64>,
  pub longitude:  Option<f64>,
  pub created_at: String,
}

impl RawVillage {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      village_id: row.get(0)?,
      name:       row.get(1)?,
      district:   row.get(2)?,
      region:     row.get(3)?,
      latitude:   row.get(4)?,
      longitude:  row.get(5)?,
      created_at: row.get(6)?,
    })
  }

  pub fn into_village(self) -> Result<Village> {
    let location = match (self.latitude, self.longitude) {
      (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
      _ => None,
    };
    Ok(Village {
      village_id: self.village_id,
      name: self.name,
      district: self.district,
      region: self.region,
      location,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

// ─── Households ──────────────────────────────────────────────────────────────

pub const HOUSEHOLD_COLUMNS: &str = "household_id, village_id, household_code, \
                                     head_of_household, household_size, created_at, updated_at";

#[derive(Debug, Clone, PartialEq)]
pub struct RawHousehold {
  pub household_id:      String,
  pub village_id:        String,
  pub household_code:    String,
  pub head_of_household: Option<String>,
  pub household_size:    Option<i64>,
  pub created_at:        String,
  pub updated_at:        String,
}

impl RawHousehold {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      household_id:      row.get(0)?,
      village_id:        row.get(1)?,
      household_code:    row.get(2)?,
      head_of_household: row.get(3)?,
      household_size:    row.get(4)?,
      created_at:        row.get(5)?,
      updated_at:        row.get(6)?,
    })
  }

  pub fn into_household(self) -> Result<Household> {
    Ok(Household {
      household_id:      self.household_id,
      village_id:        self.village_id,
      household_code:    self.household_code,
      head_of_household: self.head_of_household,
      household_size:    self.household_size,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Survey rounds ───────────────────────────────────────────────────────────

pub const ROUND_COLUMNS: &str = "round_id, name, start_date, end_date, description, created_at";

#[derive(Debug, Clone, PartialEq)]
pub struct RawRound {
  pub round_id:    String,
  pub name:        String,
  pub start_date:  Option<String>,
  pub end_date:    Option<String>,
  pub description: Option<String>,
  pub created_at:  String,
}

impl RawRound {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      round_id:    row.get(0)?,
      name:        row.get(1)?,
      start_date:  row.get(2)?,
      end_date:    row.get(3)?,
      description: row.get(4)?,
      created_at:  row.get(5)?,
    })
  }

  pub fn into_round(self) -> Result<SurveyRound> {
    Ok(SurveyRound {
      round_id:    self.round_id,
      name:        self.name,
      start_date:  decode_opt_date(self.start_date)?,
      end_date:    decode_opt_date(self.end_date)?,
      description: self.description,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

// ─── Indicators ──────────────────────────────────────────────────────────────

pub const INDICATOR_COLUMNS: &str =
  "indicator_id, category, name, unit, target_value, is_positive, created_at, updated_at";

#[derive(Debug, Clone, PartialEq)]
pub struct RawIndicator {
  pub indicator_id: String,
  pub category:     String,
  pub name:         String,
  pub unit:         String,
  pub target_value: Option<f64>,
  pub is_positive:  bool,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawIndicator {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      indicator_id: row.get(0)?,
      category:     row.get(1)?,
      name:         row.get(2)?,
      unit:         row.get(3)?,
      target_value: row.get(4)?,
      is_positive:  row.get(5)?,
      created_at:   row.get(6)?,
      updated_at:   row.get(7)?,
    })
  }

  pub fn into_indicator(self) -> Result<Indicator> {
    Ok(Indicator {
      indicator_id: self.indicator_id,
      category:     self.category,
      name:         self.name,
      unit:         self.unit,
      target_value: self.target_value,
      is_positive:  self.is_positive,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Surveys ─────────────────────────────────────────────────────────────────

pub const SURVEY_COLUMNS: &str = "survey_id, household_id, round_id, survey_date, surveyor, \
                                  status, created_at, updated_at";

#[derive(Debug, Clone, PartialEq)]
pub struct RawSurvey {
  pub survey_id:    i64,
  pub household_id: String,
  pub round_id:     String,
  pub survey_date:  String,
  pub surveyor:     Option<String>,
  pub status:       String,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawSurvey {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      survey_id:    row.get(0)?,
      household_id: row.get(1)?,
      round_id:     row.get(2)?,
      survey_date:  row.get(3)?,
      surveyor:     row.get(4)?,
      status:       row.get(5)?,
      created_at:   row.get(6)?,
      updated_at:   row.get(7)?,
    })
  }

  pub fn into_survey(self) -> Result<HouseholdSurvey> {
    Ok(HouseholdSurvey {
      survey_id:    self.survey_id,
      household_id: self.household_id,
      round_id:     self.round_id,
      survey_date:  decode_date(&self.survey_date)?,
      surveyor:     self.surveyor,
      status:       SurveyStatus::parse(&self.status),
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Measurements ────────────────────────────────────────────────────────────

pub const MEASUREMENT_COLUMNS: &str =
  "measurement_id, survey_id, indicator_id, value, notes, created_at, updated_at";

#[derive(Debug, Clone, PartialEq)]
pub struct RawMeasurement {
  pub measurement_id: i64,
  pub survey_id:      i64,
  pub indicator_id:   String,
  pub value:          f64,
  pub notes:          Option<String>,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawMeasurement {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      measurement_id: row.get(0)?,
      survey_id:      row.get(1)?,
      indicator_id:   row.get(2)?,
      value:          row.get(3)?,
      notes:          row.get(4)?,
      created_at:     row.get(5)?,
      updated_at:     row.get(6)?,
    })
  }

  pub fn into_measurement(self) -> Result<HouseholdMeasurement> {
    Ok(HouseholdMeasurement {
      measurement_id: self.measurement_id,
      survey_id:      self.survey_id,
      indicator_id:   self.indicator_id,
      value:          self.value,
      notes:          self.notes,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

// ─── household_progress ──────────────────────────────────────────────────────

pub const PROGRESS_COLUMNS: &str = "household_id, household_code, head_of_household, \
  household_size, village_id, village_name, district, region, round_id, survey_round, \
  survey_id, survey_date, surveyor, survey_status, indicator_id, indicator_category, \
  indicator_name, indicator_unit, target_value, is_positive, measurement_id, \
  measurement_value, measurement_notes, progress_pct";

/// Raw values read from one `household_progress` row.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProgress {
  pub household_id:       String,
  pub household_code:     String,
  pub head_of_household:  Option<String>,
  pub household_size:     Option<i64>,
  pub village_id:         String,
  pub village_name:       String,
  pub district:           Option<String>,
  pub region:             Option<String>,
  pub round_id:           String,
  pub survey_round:       String,
  pub survey_id:          i64,
  pub survey_date:        String,
  pub surveyor:           Option<String>,
  pub survey_status:      String,
  pub indicator_id:       String,
  pub indicator_category: String,
  pub indicator_name:     String,
  pub indicator_unit:     String,
  pub target_value:       Option<f64>,
  pub is_positive:        bool,
  pub measurement_id:     i64,
  pub measurement_value:  f64,
  pub measurement_notes:  Option<String>,
  pub progress_pct:       Option<f64>,
}

impl RawProgress {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      household_id:       row.get(0)?,
      household_code:     row.get(1)?,
      head_of_household:  row.get(2)?,
      household_size:     row.get(3)?,
      village_id:         row.get(4)?,
      village_name:       row.get(5)?,
      district:           row.get(6)?,
      region:             row.get(7)?,
      round_id:           row.get(8)?,
      survey_round:       row.get(9)?,
      survey_id:          row.get(10)?,
      survey_date:        row.get(11)?,
      surveyor:           row.get(12)?,
      survey_status:      row.get(13)?,
      indicator_id:       row.get(14)?,
      indicator_category: row.get(15)?,
      indicator_name:     row.get(16)?,
      indicator_unit:     row.get(17)?,
      target_value:       row.get(18)?,
      is_positive:        row.get(19)?,
      measurement_id:     row.get(20)?,
      measurement_value:  row.get(21)?,
      measurement_notes:  row.get(22)?,
      progress_pct:       row.get(23)?,
    })
  }

  pub fn into_progress(self) -> Result<HouseholdProgress> {
    Ok(HouseholdProgress {
      household_id:       self.household_id,
      household_code:     self.household_code,
      head_of_household:  self.head_of_household,
      household_size:     self.household_size,
      village_id:         self.village_id,
      village_name:       self.village_name,
      district:           self.district,
      region:             self.region,
      round_id:           self.round_id,
      survey_round:       self.survey_round,
      survey_id:          self.survey_id,
      survey_date:        decode_date(&self.survey_date)?,
      surveyor:           self.surveyor,
      survey_status:      SurveyStatus::parse(&self.survey_status),
      indicator_id:       self.indicator_id,
      indicator_category: self.indicator_category,
      indicator_name:     self.indicator_name,
      indicator_unit:     self.indicator_unit,
      target_value:       self.target_value,
      is_positive:        self.is_positive,
      measurement_id:     self.measurement_id,
      measurement_value:  self.measurement_value,
      measurement_notes:  self.measurement_notes,
      progress_pct:       self.progress_pct,
    })
  }
}

// ─── Audit rows ──────────────────────────────────────────────────────────────

pub const QUALITY_LOG_COLUMNS: &str =
  "log_id, table_name, check_type, check_description, status, details, created_at";

pub struct RawQualityLog {
  pub log_id:            i64,
  pub table_name:        String,
  pub check_type:        String,
  pub check_description: Option<String>,
  pub status:            String,
  pub details:           String,
  pub created_at:        String,
}

impl RawQualityLog {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      log_id:            row.get(0)?,
      table_name:        row.get(1)?,
      check_type:        row.get(2)?,
      check_description: row.get(3)?,
      status:            row.get(4)?,
      details:           row.get(5)?,
      created_at:        row.get(6)?,
    })
  }

  pub fn into_log(self) -> Result<DataQualityLog> {
    Ok(DataQualityLog {
      log_id:            self.log_id,
      table_name:        self.table_name,
      check_type:        self.check_type,
      check_description: self.check_description,
      status:            self.status,
      details:           decode_json(&self.details)?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

pub const PIPELINE_LOG_COLUMNS: &str =
  "log_id, pipeline_name, run_id, status, start_time, end_time, details";

pub struct RawPipelineLog {
  pub log_id:        i64,
  pub pipeline_name: String,
  pub run_id:        String,
  pub status:        String,
  pub start_time:    String,
  pub end_time:      Option<String>,
  pub details:       String,
}

impl RawPipelineLog {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      log_id:        row.get(0)?,
      pipeline_name: row.get(1)?,
      run_id:        row.get(2)?,
      status:        row.get(3)?,
      start_time:    row.get(4)?,
      end_time:      row.get(5)?,
      details:       row.get(6)?,
    })
  }

  pub fn into_log(self) -> Result<PipelineLog> {
    Ok(PipelineLog {
      log_id:        self.log_id,
      pipeline_name: self.pipeline_name,
      run_id:        self.run_id,
      status:        decode_pipeline_status(&self.status)?,
      start_time:    decode_dt(&self.start_time)?,
      end_time:      self.end_time.as_deref().map(decode_dt).transpose()?,
      details:       decode_json(&self.details)?,
    })
  }
}

/// Selected from `pipeline_metrics m JOIN pipeline_logs l`.
pub const METRIC_COLUMNS: &str = "m.metric_id, m.log_id, l.run_id, m.metric_name, m.metric_value, \
                                  m.metric_type, m.recorded_at, m.metadata";

pub struct RawMetric {
  pub metric_id:    i64,
  pub log_id:       i64,
  pub run_id:       String,
  pub metric_name:  String,
  pub metric_value: f64,
  pub metric_type:  String,
  pub recorded_at:  String,
  pub metadata:     String,
}

impl RawMetric {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      metric_id:    row.get(0)?,
      log_id:       row.get(1)?,
      run_id:       row.get(2)?,
      metric_name:  row.get(3)?,
      metric_value: row.get(4)?,
      metric_type:  row.get(5)?,
      recorded_at:  row.get(6)?,
      metadata:     row.get(7)?,
    })
  }

  pub fn into_metric(self) -> Result<PipelineMetric> {
    Ok(PipelineMetric {
      metric_id:    self.metric_id,
      log_id:       self.log_id,
      run_id:       self.run_id,
      metric_name:  self.metric_name,
      metric_value: self.metric_value,
      metric_type:  decode_metric_type(&self.metric_type)?,
      recorded_at:  decode_dt(&self.recorded_at)?,
      metadata:     decode_json(&self.metadata)?,
    })
  }
}

/// Selected from `pipeline_alerts a JOIN pipeline_logs l`.
pub const ALERT_COLUMNS: &str = "a.alert_id, a.log_id, l.pipeline_name, a.alert_type, \
                                 a.alert_message, a.severity, a.status, a.created_at, \
                                 a.resolved_at, a.metadata";

pub struct RawAlert {
  pub alert_id:      i64,
  pub log_id:        i64,
  pub pipeline_name: String,
  pub alert_type:    String,
  pub alert_message: String,
  pub severity:      String,
  pub status:        String,
  pub created_at:    String,
  pub resolved_at:   Option<String>,
  pub metadata:      String,
}

impl RawAlert {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      alert_id:      row.get(0)?,
      log_id:        row.get(1)?,
      pipeline_name: row.get(2)?,
      alert_type:    row.get(3)?,
      alert_message: row.get(4)?,
      severity:      row.get(5)?,
      status:        row.get(6)?,
      created_at:    row.get(7)?,
      resolved_at:   row.get(8)?,
      metadata:      row.get(9)?,
    })
  }

  pub fn into_alert(self) -> Result<PipelineAlert> {
    Ok(PipelineAlert {
      alert_id:      self.alert_id,
      log_id:        self.log_id,
      pipeline_name: self.pipeline_name,
      alert_type:    self.alert_type,
      alert_message: self.alert_message,
      severity:      decode_alert_severity(&self.severity)?,
      status:        decode_alert_status(&self.status)?,
      created_at:    decode_dt(&self.created_at)?,
      resolved_at:   self.resolved_at.as_deref().map(decode_dt).transpose()?,
      metadata:      decode_json(&self.metadata)?,
    })
  }
}

pub const LINEAGE_COLUMNS: &str = "lineage_id, source_file, ingestion_time, record_count, \
                                   hash_value, metadata, parent_lineage_id";

pub struct RawLineage {
  pub lineage_id:        i64,
  pub source_file:       String,
  pub ingestion_time:    String,
  pub record_count:      i64,
  pub hash_value:        String,
  pub metadata:          String,
  pub parent_lineage_id: Option<i64>,
}

impl RawLineage {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      lineage_id:        row.get(0)?,
      source_file:       row.get(1)?,
      ingestion_time:    row.get(2)?,
      record_count:      row.get(3)?,
      hash_value:        row.get(4)?,
      metadata:          row.get(5)?,
      parent_lineage_id: row.get(6)?,
    })
  }

  pub fn into_lineage(self) -> Result<DataLineage> {
    Ok(DataLineage {
      lineage_id:        self.lineage_id,
      source_file:       self.source_file,
      ingestion_time:    decode_dt(&self.ingestion_time)?,
      record_count:      self.record_count,
      hash_value:        self.hash_value,
      metadata:          decode_json(&self.metadata)?,
      parent_lineage_id: self.parent_lineage_id,
    })
  }
}

pub const CHANGE_COLUMNS: &str =
  "change_id, lineage_id, table_name, operation, record_count, change_time, details";

pub struct RawChange {
  pub change_id:    i64,
  pub lineage_id:   i64,
  pub table_name:   String,
  pub operation:    String,
  pub record_count: i64,
  pub change_time:  String,
  pub details:      String,
}

impl RawChange {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      change_id:    row.get(0)?,
      lineage_id:   row.get(1)?,
      table_name:   row.get(2)?,
      operation:    row.get(3)?,
      record_count: row.get(4)?,
      change_time:  row.get(5)?,
      details:      row.get(6)?,
    })
  }

  pub fn into_change(self) -> Result<ChangeRecord> {
    Ok(ChangeRecord {
      change_id:    self.change_id,
      lineage_id:   self.lineage_id,
      table_name:   self.table_name,
      operation:    decode_change_operation(&self.operation)?,
      record_count: self.record_count,
      change_time:  decode_dt(&self.change_time)?,
      details:      decode_json(&self.details)?,
    })
  }
}

pub struct RawChangeCount {
  pub table_name:    String,
  pub operation:     String,
  pub total_records: i64,
  pub change_count:  i64,
}

impl RawChangeCount {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      table_name:    row.get(0)?,
      operation:     row.get(1)?,
      total_records: row.get(2)?,
      change_count:  row.get(3)?,
    })
  }

  pub fn into_count(self) -> Result<ChangeCount> {
    Ok(ChangeCount {
      table_name:    self.table_name,
      operation:     decode_change_operation(&self.operation)?,
      total_records: self.total_records,
      change_count:  self.change_count,
    })
  }
}

// ─── Schema registry ─────────────────────────────────────────────────────────

pub const REGISTRY_COLUMNS: &str =
  "column_name, data_type, description, valid_values, is_required, version";

pub struct RawColumn {
  pub column_name:  String,
  pub data_type:    String,
  pub description:  String,
  pub valid_values: Option<String>,
  pub is_required:  bool,
  pub version:      i64,
}

impl RawColumn {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      column_name:  row.get(0)?,
      data_type:    row.get(1)?,
      description:  row.get(2)?,
      valid_values: row.get(3)?,
      is_required:  row.get(4)?,
      version:      row.get(5)?,
    })
  }

  pub fn into_definition(self) -> Result<ColumnDefinition> {
    let valid_values = self
      .valid_values
      .as_deref()
      .map(serde_json::from_str::<Vec<serde_json::Value>>)
      .transpose()?;
    Ok(ColumnDefinition {
      name: self.column_name,
      data_type: decode_data_type(&self.data_type)?,
      description: self.description,
      valid_values,
      is_required: self.is_required,
      version: self.version,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Datelike as _, TimeZone as _, Timelike as _};

  use super::*;

  #[test]
  fn sqlite_timestamps_decode() {
    let dt = decode_dt("2024-03-05T10:20:30.456Z").unwrap();
    assert_eq!(dt.year(), 2024);
    assert_eq!(dt.second(), 30);
    assert_eq!(dt.timestamp_subsec_millis(), 456);
  }

  #[test]
  fn encoded_timestamps_match_sqlite_format() {
    let dt = Utc.with_ymd_and_hms(2024, 3, 5, 10, 20, 30).unwrap();
    assert_eq!(encode_dt(dt), "2024-03-05T10:20:30.000Z");
  }

  #[test]
  fn bad_date_is_a_decode_error() {
    assert!(matches!(decode_date("05/03/2024"), Err(Error::Decode(_))));
  }
}
