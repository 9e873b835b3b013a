//! Standardising a freshly read survey table.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::warn;

use rtv_core::record::Cell;

use crate::table::{Table, parse_date, title_case};

/// Column added by [`clean`] holding the round id.
pub const ROUND_COLUMN: &str = "survey_round";
/// Column added by [`clean`] holding the ingestion timestamp.
pub const INGESTION_COLUMN: &str = "ingestion_date";
/// Column added by [`clean`] holding the source file name.
pub const SOURCE_COLUMN: &str = "source_file";

/// Fill value for missing text.
pub const UNKNOWN: &str = "Unknown";

/// Identifier columns. They are never filled, so a blank id or code stays
/// missing instead of colliding with every other blank one.
pub const KEY_COLUMNS: [&str; 3] = ["household_id", "village_id", "household_code"];

/// Round id encoded in a survey file name: the stem up to its first `_`.
///
/// `01_baseline.csv` belongs to round `01`.
pub fn round_id(source_file: &str) -> String {
  let stem = file_stem(source_file);
  stem.split('_').next().unwrap_or(stem).to_owned()
}

/// Display name of a round from the rest of the file stem, title-cased.
/// Files without a suffix fall back to `Round <id>`.
pub fn round_name(source_file: &str) -> String {
  match file_stem(source_file).split_once('_') {
    Some((_, rest)) if !rest.trim().is_empty() => title_case(&rest.replace('_', " ")),
    _ => format!("Round {}", round_id(source_file)),
  }
}

fn file_stem(source_file: &str) -> &str {
  Path::new(source_file)
    .file_stem()
    .and_then(|s| s.to_str())
    .unwrap_or(source_file)
}

fn is_date_column(name: &str) -> bool { name.to_ascii_lowercase().contains("date") }

/// Clean a table read from `source_file`:
///
/// * columns whose name contains `date` are coerced to dates; values that do
///   not parse become missing,
/// * missing values in numeric columns become `0`,
/// * missing values in every other non-date column become `"Unknown"`,
///   except in the [`KEY_COLUMNS`], which are left as they are,
/// * the round id, ingestion time and source file name are added as columns.
pub fn clean(mut table: Table, source_file: &str, ingested_at: DateTime<Utc>) -> Table {
  let round = round_id(source_file);

  for idx in 0..table.columns.len() {
    let name = table.columns[idx].clone();

    if is_date_column(&name) {
      let mut unparsed = 0usize;
      for row in &mut table.rows {
        let coerced = match &row[idx] {
          Cell::Date(d) => Cell::Date(*d),
          Cell::Text(s) => parse_date(s).map(Cell::Date).unwrap_or(Cell::Missing),
          _ => Cell::Missing,
        };
        if coerced.is_missing() && !row[idx].is_missing() {
          unparsed += 1;
        }
        row[idx] = coerced;
      }
      if unparsed > 0 {
        warn!(column = %name, unparsed, "date values could not be parsed");
      }
      continue;
    }

    if KEY_COLUMNS.contains(&name.as_str()) {
      continue;
    }

    let present = || table.rows.iter().map(|r| &r[idx]).filter(|c| !c.is_missing());
    let numeric = present().all(|c| c.as_f64().is_some());
    let fill = if !numeric {
      Cell::Text(UNKNOWN.to_owned())
    } else if present().any(|c| matches!(c, Cell::Decimal(_))) {
      Cell::Decimal(0.0)
    } else {
      Cell::Integer(0)
    };

    for row in &mut table.rows {
      if row[idx].is_missing() {
        row[idx] = fill.clone();
      }
    }
  }

  let stamp = ingested_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
  table.set_column(ROUND_COLUMN, |_| Cell::Text(round.clone()));
  table.set_column(INGESTION_COLUMN, |_| Cell::Text(stamp.clone()));
  table.set_column(SOURCE_COLUMN, |_| Cell::Text(source_file.to_owned()));
  table
}

#[cfg(test)]
mod tests {
  use chrono::{NaiveDate, TimeZone as _};

  use super::*;

  fn table() -> Table {
    let mut t = Table::new(
      ["household_id", "survey_date", "household_size", "income", "head_of_household"]
        .map(String::from)
        .to_vec(),
    );
    t.push_row(vec![
      Cell::Text("H1".into()),
      Cell::Text("2024-03-01".into()),
      Cell::Integer(5),
      Cell::Decimal(10.5),
      Cell::Missing,
    ]);
    t.push_row(vec![
      Cell::Text("H2".into()),
      Cell::Text("not a date".into()),
      Cell::Missing,
      Cell::Missing,
      Cell::Text("jane doe".into()),
    ]);
    t
  }

  #[test]
  fn round_is_taken_from_the_file_stem() {
    assert_eq!(round_id("01_baseline.csv"), "01");
    assert_eq!(round_name("01_baseline.csv"), "Baseline");
    assert_eq!(round_name("2024_year_one.xlsx"), "Year One");
    assert_eq!(round_id("endline.csv"), "endline");
    assert_eq!(round_name("endline.csv"), "Round endline");
  }

  #[test]
  fn dates_are_coerced_and_missing_values_filled() {
    let at = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
    let t = clean(table(), "01_baseline.csv", at);

    let col = |name: &str| t.column_index(name).unwrap();
    assert_eq!(
      t.rows[0][col("survey_date")],
      Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
    );
    assert_eq!(t.rows[1][col("survey_date")], Cell::Missing);
    assert_eq!(t.rows[1][col("household_size")], Cell::Integer(0));
    assert_eq!(t.rows[1][col("income")], Cell::Decimal(0.0));
    assert_eq!(t.rows[0][col("head_of_household")], Cell::Text("Unknown".into()));
  }

  #[test]
  fn identifier_columns_are_never_filled() {
    let mut t = Table::new(["household_id", "household_code"].map(String::from).to_vec());
    t.push_row(vec![Cell::Text("H1".into()), Cell::Missing]);
    t.push_row(vec![Cell::Missing, Cell::Missing]);

    let at = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
    let t = clean(t, "01_baseline.csv", at);

    assert_eq!(t.rows[0][1], Cell::Missing);
    assert_eq!(t.rows[1][0], Cell::Missing);
    assert_eq!(t.rows[1][1], Cell::Missing);
  }

  #[test]
  fn metadata_columns_are_added() {
    let at = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
    let t = clean(table(), "01_baseline.csv", at);

    assert_eq!(&t.columns[t.columns.len() - 3..], [ROUND_COLUMN, INGESTION_COLUMN, SOURCE_COLUMN]);
    let last = t.rows[1].len() - 1;
    assert_eq!(t.rows[1][last - 2], Cell::Text("01".into()));
    assert_eq!(t.rows[1][last - 1], Cell::Text("2024-03-05T12:00:00Z".into()));
    assert_eq!(t.rows[1][last], Cell::Text("01_baseline.csv".into()));
  }
}
