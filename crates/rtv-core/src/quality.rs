//! Data-quality assessment types and the overall scoring rule.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{Result, audit::NewQualityLog};

/// `table_name` of the log row written for a full assessment.
pub const ASSESSMENT_TABLE: &str = "all_tables";
/// `check_type` of the log row written for a full assessment.
pub const ASSESSMENT_CHECK: &str = "data_quality";

/// The families of checks run against the warehouse.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QualityCheckType {
  Completeness,
  Consistency,
  Accuracy,
  Timeliness,
  Uniqueness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
  Medium,
  High,
}

impl Severity {
  /// `High` once `count` exceeds `high_above`.
  pub fn for_count(count: i64, high_above: i64) -> Self {
    if count > high_above { Self::High } else { Self::Medium }
  }
}

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
  pub check_type: QualityCheckType,
  /// Stable identifier of the check, e.g. `household_surveys_household_id`.
  pub check_name: String,
  pub count:      i64,
  pub severity:   Severity,
}

/// Result of one full quality assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
  pub timestamp:             DateTime<Utc>,
  pub as_of:                 NaiveDate,
  /// Percentage of non-null cells per table.
  pub completeness_scores:   BTreeMap<String, f64>,
  pub consistency_issues:    Vec<Issue>,
  /// Percentage of surveys taken within the recency window.
  pub timeliness_score:      f64,
  pub accuracy_issues:       Vec<Issue>,
  pub uniqueness_issues:     Vec<Issue>,
  pub overall_quality_score: f64,
}

impl QualityReport {
  /// Assemble a report and compute its overall score.
  pub fn new(
    as_of: NaiveDate,
    completeness_scores: BTreeMap<String, f64>,
    consistency_issues: Vec<Issue>,
    timeliness_score: f64,
    accuracy_issues: Vec<Issue>,
    uniqueness_issues: Vec<Issue>,
  ) -> Self {
    let overall_quality_score = overall_score(
      &completeness_scores,
      consistency_issues.len(),
      timeliness_score,
      accuracy_issues.len(),
    );
    Self {
      timestamp: Utc::now(),
      as_of,
      completeness_scores,
      consistency_issues,
      timeliness_score,
      accuracy_issues,
      uniqueness_issues,
      overall_quality_score,
    }
  }

  /// `true` when no check produced an issue.
  pub fn is_clean(&self) -> bool {
    self.consistency_issues.is_empty()
      && self.accuracy_issues.is_empty()
      && self.uniqueness_issues.is_empty()
  }

  pub fn issues(&self) -> impl Iterator<Item = &Issue> {
    self
      .consistency_issues
      .iter()
      .chain(&self.accuracy_issues)
      .chain(&self.uniqueness_issues)
  }

  /// The `data_quality_logs` row recording this report.
  pub fn to_log(&self) -> Result<NewQualityLog> {
    Ok(NewQualityLog {
      table_name:        ASSESSMENT_TABLE.to_owned(),
      check_type:        ASSESSMENT_CHECK.to_owned(),
      check_description: Some("Comprehensive data quality check".to_owned()),
      status:            if self.is_clean() { "completed" } else { "issues_found" }.to_owned(),
      details:           serde_json::to_value(self)?,
    })
  }
}

/// Weighted score: completeness 40%, consistency 30%, timeliness 20%,
/// accuracy 10%. Each consistency issue costs 10 points of its component and
/// each accuracy issue 5.
pub fn overall_score(
  completeness: &BTreeMap<String, f64>,
  consistency_issues: usize,
  timeliness: f64,
  accuracy_issues: usize,
) -> f64 {
  let mean_completeness = if completeness.is_empty() {
    0.0
  } else {
    completeness.values().sum::<f64>() / completeness.len() as f64
  };

  let score = mean_completeness * 0.4
    + (100.0 - consistency_issues as f64 * 10.0) * 0.3
    + timeliness * 0.2
    + (100.0 - accuracy_issues as f64 * 5.0) * 0.1;

  round2(score)
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 { (value * 100.0).round() / 100.0 }

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator as _;

  use super::*;

  fn full_completeness() -> BTreeMap<String, f64> {
    ["households", "indicators"]
      .into_iter()
      .map(|t| (t.to_owned(), 100.0))
      .collect()
  }

  #[test]
  fn perfect_data_scores_one_hundred() {
    assert_eq!(overall_score(&full_completeness(), 0, 100.0, 0), 100.0);
  }

  #[test]
  fn issues_reduce_their_components() {
    // 40 + (100 - 20) * 0.3 + 50 * 0.2 + (100 - 5) * 0.1
    let score = overall_score(&full_completeness(), 2, 50.0, 1);
    assert_eq!(score, 40.0 + 24.0 + 10.0 + 9.5);
  }

  #[test]
  fn empty_completeness_contributes_zero() {
    let score = overall_score(&BTreeMap::new(), 0, 0.0, 0);
    assert_eq!(score, 40.0);
  }

  #[test]
  fn severity_threshold_is_exclusive() {
    assert_eq!(Severity::for_count(100, 100), Severity::Medium);
    assert_eq!(Severity::for_count(101, 100), Severity::High);
  }

  #[test]
  fn check_types_round_trip_through_strings() {
    for ty in QualityCheckType::iter() {
      let parsed: QualityCheckType = ty.as_ref().parse().unwrap();
      assert_eq!(parsed, ty);
    }
    assert_eq!(QualityCheckType::Timeliness.to_string(), "timeliness");
  }

  #[test]
  fn report_lists_every_issue() {
    let issue = |ty| Issue {
      check_type: ty,
      check_name: "x".into(),
      count:      1,
      severity:   Severity::Medium,
    };
    let report = QualityReport::new(
      NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
      full_completeness(),
      vec![issue(QualityCheckType::Consistency)],
      100.0,
      vec![issue(QualityCheckType::Accuracy)],
      vec![],
    );
    assert!(!report.is_clean());
    assert_eq!(report.issues().count(), 2);
    assert_eq!(report.overall_quality_score, 40.0 + 27.0 + 20.0 + 9.5);

    let log = report.to_log().unwrap();
    assert_eq!(log.check_type, ASSESSMENT_CHECK);
    assert_eq!(log.status, "issues_found");
    assert_eq!(log.details["overall_quality_score"], 96.5);
  }
}
