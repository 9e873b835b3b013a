//! Fact types: survey headers and the measurements recorded under them.
//!
//! A survey is unique per (household, round); a measurement is unique per
//! (survey, indicator). Both are appended once per round.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Outcome of a survey visit as reported by the enumerator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum SurveyStatus {
  Completed,
  Partial,
  Pending,
  Refused,
  /// A status the field team used that has no dedicated variant.
  Other(String),
}

impl SurveyStatus {
  /// Parse a free-text status. Matching is case-insensitive and never fails.
  pub fn parse(raw: &str) -> Self {
    let lowered = raw.trim().to_lowercase();
    match lowered.as_str() {
      "completed" => Self::Completed,
      "partial" => Self::Partial,
      "pending" => Self::Pending,
      "refused" => Self::Refused,
      _ => Self::Other(lowered),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::Completed => "completed",
      Self::Partial => "partial",
      Self::Pending => "pending",
      Self::Refused => "refused",
      Self::Other(s) => s,
    }
  }
}

impl fmt::Display for SurveyStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl From<String> for SurveyStatus {
  fn from(s: String) -> Self { Self::parse(&s) }
}

impl From<SurveyStatus> for String {
  fn from(s: SurveyStatus) -> Self { s.as_str().to_owned() }
}

// ─── Survey ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdSurvey {
  pub survey_id:    i64,
  pub household_id: String,
  pub round_id:     String,
  pub survey_date:  NaiveDate,
  pub surveyor:     Option<String>,
  pub status:       SurveyStatus,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

/// Input to [`crate::store::Warehouse::record_survey`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewSurvey {
  pub household_id: String,
  pub round_id:     String,
  pub survey_date:  NaiveDate,
  pub surveyor:     Option<String>,
  pub status:       SurveyStatus,
}

// ─── Measurement ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdMeasurement {
  pub measurement_id: i64,
  pub survey_id:      i64,
  pub indicator_id:   String,
  pub value:          f64,
  pub notes:          Option<String>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
  pub survey_id:    i64,
  pub indicator_id: String,
  pub value:        f64,
  pub notes:        Option<String>,
}

impl NewMeasurement {
  pub fn new(survey_id: i64, indicator_id: impl Into<String>, value: f64) -> Self {
    Self { survey_id, indicator_id: indicator_id.into(), value, notes: None }
  }
}

// ─── Upserts ─────────────────────────────────────────────────────────────────

/// What an upsert did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
  Inserted,
  Updated,
  Unchanged,
}

/// A row returned from an upsert together with the change it caused.
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted<T> {
  pub row:    T,
  pub change: Change,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_parse_is_case_insensitive() {
    assert_eq!(SurveyStatus::parse("COMPLETED"), SurveyStatus::Completed);
    assert_eq!(SurveyStatus::parse(" Completed "), SurveyStatus::Completed);
    assert_eq!(SurveyStatus::parse("Refused"), SurveyStatus::Refused);
  }

  #[test]
  fn near_miss_statuses_are_not_aliased() {
    assert_eq!(SurveyStatus::parse("Complete"), SurveyStatus::Other("complete".into()));
  }

  #[test]
  fn unknown_status_is_kept_lowercased() {
    let status = SurveyStatus::parse("Moved Away");
    assert_eq!(status, SurveyStatus::Other("moved away".into()));
    assert_eq!(status.to_string(), "moved away");
  }

  #[test]
  fn status_serializes_as_plain_string() {
    let json = serde_json::to_string(&SurveyStatus::Pending).unwrap();
    assert_eq!(json, "\"pending\"");
    let back: SurveyStatus = serde_json::from_str("\"partial\"").unwrap();
    assert_eq!(back, SurveyStatus::Partial);
  }
}
