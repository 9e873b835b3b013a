//! Dimension types: villages, households, survey rounds and indicators.
//!
//! Dimensions are keyed by natural identifiers taken straight from the survey
//! files. They are inserted once by ingestion and occasionally updated.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ─── Village ─────────────────────────────────────────────────────────────────

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
  pub latitude:  f64,
  pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Village {
  pub village_id: String,
  pub name:       String,
  pub district:   Option<String>,
  pub region:     Option<String>,
  pub location:   Option<GeoPoint>,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::Warehouse::upsert_village`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewVillage {
  pub village_id: String,
  pub name:       String,
  pub district:   Option<String>,
  pub region:     Option<String>,
  pub location:   Option<GeoPoint>,
}

impl NewVillage {
  /// A village known only by its identifier, which doubles as its name.
  pub fn bare(village_id: impl Into<String>) -> Self {
    let village_id = village_id.into();
    Self {
      name: village_id.clone(),
      village_id,
      district: None,
      region: None,
      location: None,
    }
  }
}

// ─── Household ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Household {
  pub household_id:      String,
  pub village_id:        String,
  /// Field code printed on the household's survey card; unique.
  pub household_code:    String,
  pub head_of_household: Option<String>,
  pub household_size:    Option<i64>,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHousehold {
  pub household_id:      String,
  pub village_id:        String,
  pub household_code:    String,
  pub head_of_household: Option<String>,
  pub household_size:    Option<i64>,
}

// ─── Survey round ────────────────────────────────────────────────────────────

/// A named data-collection wave, e.g. "Baseline" or "Year One".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyRound {
  pub round_id:    String,
  pub name:        String,
  pub start_date:  Option<NaiveDate>,
  pub end_date:    Option<NaiveDate>,
  pub description: Option<String>,
  pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSurveyRound {
  pub round_id:    String,
  pub name:        String,
  pub start_date:  Option<NaiveDate>,
  pub end_date:    Option<NaiveDate>,
  pub description: Option<String>,
}

impl NewSurveyRound {
  pub fn new(round_id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      round_id:    round_id.into(),
      name:        name.into(),
      start_date:  None,
      end_date:    None,
      description: None,
    }
  }
}

// ─── Indicator ───────────────────────────────────────────────────────────────

/// A poverty-related metric tracked across rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
  pub indicator_id: String,
  pub category:     String,
  pub name:         String,
  pub unit:         String,
  pub target_value: Option<f64>,
  /// `true` when a higher value means the household is doing better.
  pub is_positive:  bool,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewIndicator {
  pub indicator_id: String,
  pub category:     String,
  pub name:         String,
  pub unit:         String,
  pub target_value: Option<f64>,
  pub is_positive:  bool,
}
