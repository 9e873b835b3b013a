//! Shaping a cleaned survey table into warehouse rows.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use rtv_core::{
  batch::{MeasurementRow, SurveyRow, WarehouseBatch},
  dimension::{NewHousehold, NewIndicator, NewSurveyRound, NewVillage},
  fact::SurveyStatus,
  record::Cell,
};

use crate::{
  Error, Result,
  clean::{ROUND_COLUMN, SOURCE_COLUMN, UNKNOWN, round_name},
  table::{Table, title_case},
};

/// Prefix marking a column as an indicator measurement.
pub const INDICATOR_PREFIX: &str = "indicator_";

/// Counts describing one transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformStats {
  pub households:             usize,
  pub villages:               usize,
  pub surveys:                usize,
  pub indicators:             usize,
  pub measurements:           usize,
  /// Rows dropped because they carry no household id.
  pub rows_without_household: usize,
  /// Rows that yield no survey because their date is missing or invalid.
  pub surveys_without_date:   usize,
  /// Indicator cells that are missing or not numeric.
  pub skipped_measurements:   usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
  pub batch: WarehouseBatch,
  pub stats: TransformStats,
}

/// An indicator definition derived from an `indicator_<id>` column.
///
/// The name is the id with underscores as spaces, title-cased. The category
/// is the first segment after the prefix when the column name has more than
/// two segments, otherwise `General`.
pub fn indicator_from_column(column: &str) -> Option<NewIndicator> {
  let id = column.strip_prefix(INDICATOR_PREFIX)?;
  if id.is_empty() {
    return None;
  }
  let segments: Vec<&str> = column.split('_').collect();
  let category = if segments.len() > 2 { segments[1].to_owned() } else { "General".to_owned() };
  Some(NewIndicator {
    indicator_id: id.to_owned(),
    category,
    name: title_case(&id.replace('_', " ")),
    unit: "Numeric".to_owned(),
    target_value: None,
    is_positive: true,
  })
}

/// Text of a present cell.
fn text(cell: Option<&Cell>) -> Option<String> {
  cell.and_then(Cell::as_text).filter(|s| !s.trim().is_empty())
}

/// Text of a cell that is neither missing nor the `Unknown` fill value.
fn known_text(cell: Option<&Cell>) -> Option<String> { text(cell).filter(|s| s != UNKNOWN) }

/// Turn a cleaned table into a batch of warehouse rows.
///
/// * households are de-duplicated by id, first row wins; codes are
///   upper-cased and heads of household title-cased. A blank code falls
///   back to the household id, since codes are unique across households,
/// * every village referenced by a household is included,
/// * one round per distinct `survey_round`, spanning its survey dates,
/// * one survey per (household, round) with a valid date; status is
///   lower-cased,
/// * one measurement per numeric indicator cell of a surveyed row.
pub fn transform(table: &Table) -> Result<Transformed> {
  let missing = table.missing_columns(&["household_id", "village_id", "survey_date", ROUND_COLUMN]);
  if !missing.is_empty() {
    return Err(Error::MissingColumns(missing.into_iter().map(str::to_owned).collect()));
  }

  let indicator_columns: Vec<(usize, NewIndicator)> = table
    .columns
    .iter()
    .enumerate()
    .filter_map(|(idx, name)| indicator_from_column(name).map(|ind| (idx, ind)))
    .collect();

  let mut stats = TransformStats::default();
  let mut batch = WarehouseBatch::default();
  let mut seen_households = HashSet::new();
  let mut seen_villages = HashSet::new();
  let mut seen_surveys = HashSet::new();
  let mut seen_measurements = HashSet::new();
  let mut round_spans: BTreeMap<String, (Option<String>, Option<NaiveDate>, Option<NaiveDate>)> =
    BTreeMap::new();

  for record in table.records() {
    let Some(household_id) = known_text(record.get("household_id")) else {
      stats.rows_without_household += 1;
      continue;
    };
    let village_id = text(record.get("village_id")).unwrap_or_else(|| UNKNOWN.to_owned());
    let round_id = text(record.get(ROUND_COLUMN)).unwrap_or_else(|| UNKNOWN.to_owned());
    let survey_date = record.get("survey_date").and_then(Cell::as_date);

    let span = round_spans.entry(round_id.clone()).or_default();
    if span.0.is_none() {
      span.0 = text(record.get(SOURCE_COLUMN));
    }
    if let Some(d) = survey_date {
      span.1 = Some(span.1.map_or(d, |s| s.min(d)));
      span.2 = Some(span.2.map_or(d, |e| e.max(d)));
    }

    if seen_villages.insert(village_id.clone()) {
      batch.villages.push(NewVillage::bare(village_id.clone()));
    }

    if seen_households.insert(household_id.clone()) {
      batch.households.push(NewHousehold {
        household_id:      household_id.clone(),
        village_id,
        household_code:    known_text(record.get("household_code"))
          .unwrap_or_else(|| household_id.clone())
          .to_uppercase(),
        head_of_household: known_text(record.get("head_of_household")).map(|h| title_case(&h)),
        household_size:    record.get("household_size").and_then(Cell::as_i64),
      });
    }

    let Some(survey_date) = survey_date else {
      stats.surveys_without_date += 1;
      continue;
    };

    if seen_surveys.insert((household_id.clone(), round_id.clone())) {
      batch.surveys.push(SurveyRow {
        household_id: household_id.clone(),
        round_id:     round_id.clone(),
        survey_date,
        surveyor:     known_text(record.get("surveyor_id")),
        status:       SurveyStatus::parse(
          &text(record.get("status")).unwrap_or_else(|| UNKNOWN.to_owned()),
        ),
      });
    }

    for (idx, indicator) in &indicator_columns {
      let Some(value) = record.get(&table.columns[*idx]).and_then(Cell::as_f64) else {
        stats.skipped_measurements += 1;
        continue;
      };
      let key = (household_id.clone(), round_id.clone(), indicator.indicator_id.clone());
      if seen_measurements.insert(key) {
        batch.measurements.push(MeasurementRow {
          household_id: household_id.clone(),
          round_id: round_id.clone(),
          indicator_id: indicator.indicator_id.clone(),
          value,
        });
      }
    }
  }

  batch.rounds = round_spans
    .into_iter()
    .map(|(round_id, (source, start, end))| NewSurveyRound {
      name:        source
        .as_deref()
        .map(round_name)
        .unwrap_or_else(|| format!("Round {round_id}")),
      description: source.map(|s| format!("Loaded from {s}")),
      round_id,
      start_date:  start,
      end_date:    end,
    })
    .collect();
  batch.indicators = indicator_columns.into_iter().map(|(_, ind)| ind).collect();

  stats.households = batch.households.len();
  stats.villages = batch.villages.len();
  stats.surveys = batch.surveys.len();
  stats.indicators = batch.indicators.len();
  stats.measurements = batch.measurements.len();

  Ok(Transformed { batch, stats })
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone as _, Utc};

  use super::*;
  use crate::{clean::clean, table::parse_cell};

  fn cleaned(csv: &str) -> Table {
    let mut lines = csv.lines();
    let header = lines.next().unwrap();
    let mut t = Table::new(header.split(',').map(str::to_owned).collect());
    for line in lines {
      t.push_row(line.split(',').map(parse_cell).collect());
    }
    let at = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
    clean(t, "01_baseline.csv", at)
  }

  const SAMPLE: &str = "\
household_id,village_id,household_code,head_of_household,household_size,survey_date,surveyor_id,status,indicator_income_monthly,indicator_meals
H1,V1,kb-001,jane doe,5,2024-03-01,S1,COMPLETED,120.5,3
H2,V1,kb-002,john roe,4,2024-03-02,S2,Partial,n/a,refused
H3,V2,kb-003,,,garbage,S1,completed,80,1
H1,V1,kb-001,jane doe,5,2024-03-01,S1,completed,999,9";

  #[test]
  fn indicators_are_derived_from_column_names() {
    let income = indicator_from_column("indicator_income_monthly").unwrap();
    assert_eq!(income.indicator_id, "income_monthly");
    assert_eq!(income.category, "income");
    assert_eq!(income.name, "Income Monthly");
    assert_eq!(income.unit, "Numeric");
    assert!(income.is_positive);

    let meals = indicator_from_column("indicator_meals").unwrap();
    assert_eq!(meals.category, "General");
    assert_eq!(meals.name, "Meals");

    assert!(indicator_from_column("household_size").is_none());
    assert!(indicator_from_column("indicator_").is_none());
  }

  #[test]
  fn households_are_standardised_and_deduplicated() {
    let out = transform(&cleaned(SAMPLE)).unwrap();
    let hh = &out.batch.households;

    assert_eq!(hh.len(), 3);
    assert_eq!(hh[0].household_code, "KB-001");
    assert_eq!(hh[0].head_of_household.as_deref(), Some("Jane Doe"));
    assert_eq!(hh[0].household_size, Some(5));
    assert_eq!(hh[2].head_of_household, None);
    assert_eq!(hh[2].household_size, Some(0));

    let villages: Vec<_> = out.batch.villages.iter().map(|v| v.village_id.as_str()).collect();
    assert_eq!(villages, ["V1", "V2"]);
  }

  #[test]
  fn surveys_need_a_valid_date() {
    let out = transform(&cleaned(SAMPLE)).unwrap();

    assert_eq!(out.batch.surveys.len(), 2);
    assert_eq!(out.stats.surveys_without_date, 1);
    assert_eq!(out.batch.surveys[0].status, SurveyStatus::Completed);
    assert_eq!(out.batch.surveys[1].status, SurveyStatus::Partial);
    assert_eq!(out.batch.surveys[0].surveyor.as_deref(), Some("S1"));

    let round = &out.batch.rounds[0];
    assert_eq!(round.round_id, "01");
    assert_eq!(round.name, "Baseline");
    assert_eq!(round.start_date, NaiveDate::from_ymd_opt(2024, 3, 1));
    assert_eq!(round.end_date, NaiveDate::from_ymd_opt(2024, 3, 2));
  }

  #[test]
  fn measurements_melt_numeric_indicator_cells() {
    let out = transform(&cleaned(SAMPLE)).unwrap();

    // H1's second row is a duplicate, H2's missing income was filled with 0
    // and its text meals cell is skipped. H3 has no survey.
    assert_eq!(out.stats.measurements, 3);
    assert_eq!(out.stats.skipped_measurements, 1);
    assert_eq!(out.batch.indicators.len(), 2);

    let h1_income = out
      .batch
      .measurements
      .iter()
      .find(|m| m.household_id == "H1" && m.indicator_id == "income_monthly")
      .unwrap();
    assert_eq!(h1_income.value, 120.5);
    assert_eq!(h1_income.round_id, "01");

    let h2_income = out.batch.measurements.iter().find(|m| m.household_id == "H2").unwrap();
    assert_eq!(h2_income.indicator_id, "income_monthly");
    assert_eq!(h2_income.value, 0.0);
  }

  #[test]
  fn blank_household_codes_fall_back_to_the_id() {
    let out = transform(&cleaned(
      "\
household_id,village_id,household_code,survey_date
H1,V1,,2024-03-01
h2,V1,,2024-03-01
H3,V1,kb-003,2024-03-01",
    ))
    .unwrap();

    let codes: Vec<_> = out.batch.households.iter().map(|h| h.household_code.as_str()).collect();
    assert_eq!(codes, ["H1", "H2", "KB-003"]);
  }

  #[test]
  fn an_all_blank_code_column_still_yields_distinct_codes() {
    let out = transform(&cleaned(
      "\
household_id,village_id,household_code,survey_date
H1,V1,,2024-03-01
H2,V1,,2024-03-02",
    ))
    .unwrap();

    let codes: Vec<_> = out.batch.households.iter().map(|h| h.household_code.as_str()).collect();
    assert_eq!(codes, ["H1", "H2"]);
  }

  #[test]
  fn uncleaned_table_is_rejected() {
    let mut t = Table::new(vec!["household_id".into(), "village_id".into(), "survey_date".into()]);
    t.push_row(vec![Cell::Text("H1".into()), Cell::Text("V1".into()), Cell::Missing]);
    assert!(matches!(transform(&t), Err(Error::MissingColumns(cols)) if cols == [ROUND_COLUMN]));
  }
}
