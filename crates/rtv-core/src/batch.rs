//! A transformed survey batch ready to be loaded in one transaction.
//!
//! Facts in a batch reference surveys by their natural (household, round)
//! pair because generated survey ids only exist once the header rows are
//! stored.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  dimension::{NewHousehold, NewIndicator, NewSurveyRound, NewVillage},
  fact::{Change, SurveyStatus},
};

#[derive(Debug, Clone, PartialEq)]
pub struct SurveyRow {
  pub household_id: String,
  pub round_id:     String,
  pub survey_date:  NaiveDate,
  pub surveyor:     Option<String>,
  pub status:       SurveyStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
  pub household_id: String,
  pub round_id:     String,
  pub indicator_id: String,
  pub value:        f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarehouseBatch {
  pub villages:     Vec<NewVillage>,
  pub rounds:       Vec<NewSurveyRound>,
  pub indicators:   Vec<NewIndicator>,
  pub households:   Vec<NewHousehold>,
  pub surveys:      Vec<SurveyRow>,
  pub measurements: Vec<MeasurementRow>,
}

impl WarehouseBatch {
  pub fn is_empty(&self) -> bool {
    self.households.is_empty() && self.surveys.is_empty() && self.measurements.is_empty()
  }
}

/// Per-table tally of what a load did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTally {
  pub inserted:  i64,
  pub updated:   i64,
  pub unchanged: i64,
}

impl ChangeTally {
  pub fn record(&mut self, change: Change) {
    match change {
      Change::Inserted => self.inserted += 1,
      Change::Updated => self.updated += 1,
      Change::Unchanged => self.unchanged += 1,
    }
  }

  pub fn total(&self) -> i64 { self.inserted + self.updated + self.unchanged }
}

/// Outcome of [`crate::store::Warehouse::load`], keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
  pub tables: BTreeMap<String, ChangeTally>,
}

impl LoadSummary {
  pub fn record(&mut self, table: &str, change: Change) {
    self.tables.entry(table.to_owned()).or_default().record(change);
  }

  pub fn tally(&self, table: &str) -> ChangeTally {
    self.tables.get(table).copied().unwrap_or_default()
  }
}
