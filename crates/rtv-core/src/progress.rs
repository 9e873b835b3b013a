//! The `household_progress` read model and dashboard summaries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::fact::SurveyStatus;

/// One denormalised row of the `household_progress` view, a single
/// measurement with every dimension it hangs off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdProgress {
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
  pub survey_date:        NaiveDate,
  pub surveyor:           Option<String>,
  pub survey_status:      SurveyStatus,
  pub indicator_id:       String,
  pub indicator_category: String,
  pub indicator_name:     String,
  pub indicator_unit:     String,
  pub target_value:       Option<f64>,
  pub is_positive:        bool,
  pub measurement_id:     i64,
  pub measurement_value:  f64,
  pub measurement_notes:  Option<String>,
  /// Percentage of target reached, polarity-adjusted. `None` without a
  /// target.
  pub progress_pct:       Option<f64>,
}

/// Filters for [`crate::store::Warehouse::progress`]. All fields are
/// conjunctive; `None` means "any".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressQuery {
  pub village_id:   Option<String>,
  pub household_id: Option<String>,
  pub round_id:     Option<String>,
  pub category:     Option<String>,
  /// Only surveys on or after this date.
  pub since:        Option<NaiveDate>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

/// Headline numbers for the dashboard overview page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
  pub total_households:   i64,
  /// Villages with at least one survey.
  pub active_villages:    i64,
  pub total_surveys:      i64,
  pub average_progress:   Option<f64>,
  /// Overall score of the most recent quality assessment, if any.
  pub data_quality_score: Option<f64>,
  pub as_of:              NaiveDate,
}
