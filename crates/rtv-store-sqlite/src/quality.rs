//! SQL side of the data-quality assessment.
//!
//! Each check is a plain function over a connection; [`assess`] runs them all
//! and folds the results into a [`QualityReport`].

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use rusqlite::{Connection, params};

use rtv_core::quality::{Issue, QualityCheckType, QualityReport, Severity, round2};

use crate::{encode::encode_date, schema::COMPLETENESS_TABLES};

/// Surveys taken this many days before the reference date count as timely.
pub const TIMELINESS_WINDOW_DAYS: u64 = 7;

/// Orphan counts above this are high severity.
const CONSISTENCY_HIGH_ABOVE: i64 = 100;
/// Outlier counts above this are high severity.
const ACCURACY_HIGH_ABOVE: i64 = 50;
/// Duplicate group counts above this are high severity.
const UNIQUENESS_HIGH_ABOVE: i64 = 10;

/// Values this many standard deviations from the mean are outliers.
const OUTLIER_SIGMAS: f64 = 3.0;

pub fn assess(conn: &Connection, as_of: NaiveDate) -> rusqlite::Result<QualityReport> {
  Ok(QualityReport::new(
    as_of,
    completeness(conn)?,
    consistency(conn)?,
    timeliness(conn, as_of)?,
    accuracy(conn)?,
    uniqueness(conn)?,
  ))
}

// ─── Completeness ────────────────────────────────────────────────────────────

pub fn completeness(conn: &Connection) -> rusqlite::Result<BTreeMap<String, f64>> {
  let mut scores = BTreeMap::new();
  for table in COMPLETENESS_TABLES {
    scores.insert(table.to_owned(), table_completeness(conn, table)?);
  }
  Ok(scores)
}

fn table_completeness(conn: &Connection, table: &str) -> rusqlite::Result<f64> {
  let columns: Vec<String> = {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    stmt
      .query_map(params![table], |row| row.get(0))?
      .collect::<rusqlite::Result<_>>()?
  };
  if columns.is_empty() {
    return Ok(100.0);
  }

  let non_null = columns
    .iter()
    .map(|c| format!("COUNT(\"{c}\")"))
    .collect::<Vec<_>>()
    .join(" + ");
  let (rows, filled): (i64, i64) = conn.query_row(
    &format!("SELECT COUNT(*), {non_null} FROM \"{table}\""),
    [],
    |row| Ok((row.get(0)?, row.get(1)?)),
  )?;

  let cells = rows * columns.len() as i64;
  if cells == 0 {
    return Ok(100.0);
  }
  Ok(round2(filled as f64 / cells as f64 * 100.0))
}

// ─── Consistency ─────────────────────────────────────────────────────────────

/// (check name, orphan-counting query)
const ORPHAN_CHECKS: [(&str, &str); 3] = [
  (
    "household_surveys_household_id",
    "SELECT COUNT(*) FROM household_surveys s
       LEFT JOIN households h ON h.household_id = s.household_id
      WHERE h.household_id IS NULL",
  ),
  (
    "household_measurements_survey_id",
    "SELECT COUNT(*) FROM household_measurements m
       LEFT JOIN household_surveys s ON s.survey_id = m.survey_id
      WHERE s.survey_id IS NULL",
  ),
  (
    "household_measurements_indicator_id",
    "SELECT COUNT(*) FROM household_measurements m
       LEFT JOIN indicators i ON i.indicator_id = m.indicator_id
      WHERE i.indicator_id IS NULL",
  ),
];

pub fn consistency(conn: &Connection) -> rusqlite::Result<Vec<Issue>> {
  count_issues(conn, QualityCheckType::Consistency, &ORPHAN_CHECKS, CONSISTENCY_HIGH_ABOVE)
}

// ─── Timeliness ──────────────────────────────────────────────────────────────

/// Share of surveys dated within the window ending at `as_of`. No surveys
/// scores zero.
pub fn timeliness(conn: &Connection, as_of: NaiveDate) -> rusqlite::Result<f64> {
  let since = as_of
    .checked_sub_days(Days::new(TIMELINESS_WINDOW_DAYS))
    .unwrap_or(NaiveDate::MIN);
  let (total, recent): (i64, i64) = conn.query_row(
    "SELECT COUNT(*),
            COALESCE(SUM(survey_date >= ?1 AND survey_date <= ?2), 0)
       FROM household_surveys",
    params![encode_date(since), encode_date(as_of)],
    |row| Ok((row.get(0)?, row.get(1)?)),
  )?;

  if total == 0 {
    return Ok(0.0);
  }
  Ok(round2(recent as f64 / total as f64 * 100.0))
}

// ─── Accuracy ────────────────────────────────────────────────────────────────

/// One issue per indicator whose values include statistical outliers.
pub fn accuracy(conn: &Connection) -> rusqlite::Result<Vec<Issue>> {
  let mut values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
  {
    let mut stmt = conn.prepare("SELECT indicator_id, value FROM household_measurements")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?;
    for row in rows {
      let (indicator_id, value) = row?;
      values.entry(indicator_id).or_default().push(value);
    }
  }

  Ok(
    values
      .into_iter()
      .filter_map(|(indicator_id, xs)| {
        let count = count_outliers(&xs);
        (count > 0).then(|| Issue {
          check_type: QualityCheckType::Accuracy,
          check_name: indicator_id,
          count,
          severity: Severity::for_count(count, ACCURACY_HIGH_ABOVE),
        })
      })
      .collect(),
  )
}

/// Values further than three sample standard deviations from the mean.
/// Fewer than two values never produce outliers.
pub fn count_outliers(xs: &[f64]) -> i64 {
  if xs.len() < 2 {
    return 0;
  }
  let n = xs.len() as f64;
  let mean = xs.iter().sum::<f64>() / n;
  let variance = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
  let limit = OUTLIER_SIGMAS * variance.sqrt();
  xs.iter().filter(|x| (*x - mean).abs() > limit).count() as i64
}

// ─── Uniqueness ──────────────────────────────────────────────────────────────

const DUPLICATE_CHECKS: [(&str, &str); 2] = [
  (
    "household_surveys_household_round",
    "SELECT COUNT(*) FROM (
       SELECT 1 FROM household_surveys
        GROUP BY household_id, round_id HAVING COUNT(*) > 1)",
  ),
  (
    "household_measurements_survey_indicator",
    "SELECT COUNT(*) FROM (
       SELECT 1 FROM household_measurements
        GROUP BY survey_id, indicator_id HAVING COUNT(*) > 1)",
  ),
];

pub fn uniqueness(conn: &Connection) -> rusqlite::Result<Vec<Issue>> {
  count_issues(conn, QualityCheckType::Uniqueness, &DUPLICATE_CHECKS, UNIQUENESS_HIGH_ABOVE)
}

fn count_issues(
  conn: &Connection,
  check_type: QualityCheckType,
  checks: &[(&str, &str)],
  high_above: i64,
) -> rusqlite::Result<Vec<Issue>> {
  let mut issues = Vec::new();
  for (name, sql) in checks {
    let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    if count > 0 {
      issues.push(Issue {
        check_type,
        check_name: (*name).to_owned(),
        count,
        severity: Severity::for_count(count, high_above),
      });
    }
  }
  Ok(issues)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn single_value_has_no_outliers() {
    assert_eq!(count_outliers(&[5.0]), 0);
  }

  #[test]
  fn constant_values_have_no_outliers() {
    assert_eq!(count_outliers(&[3.0; 10]), 0);
  }

  #[test]
  fn far_value_is_an_outlier() {
    let mut xs = vec![10.0; 30];
    xs.push(1000.0);
    assert_eq!(count_outliers(&xs), 1);
  }
}
