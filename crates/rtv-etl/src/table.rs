//! An in-memory survey table and text-to-cell inference.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use rtv_core::record::{Cell, Record};

/// Columns every survey file must carry.
pub const REQUIRED_COLUMNS: [&str; 3] = ["household_id", "survey_date", "village_id"];

/// Tokens read as a missing value, compared case-insensitively.
const MISSING_TOKENS: [&str; 6] = ["na", "n/a", "nan", "null", "none", "#n/a"];

/// Column-major header plus row-major cells. Every row has exactly
/// `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
  pub columns: Vec<String>,
  pub rows:    Vec<Vec<Cell>>,
}

impl Table {
  pub fn new(columns: Vec<String>) -> Self { Self { columns, rows: Vec::new() } }

  /// Append a row, padding or truncating it to the header width.
  pub fn push_row(&mut self, mut row: Vec<Cell>) {
    row.resize(self.columns.len(), Cell::Missing);
    self.rows.push(row);
  }

  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  pub fn column_index(&self, name: &str) -> Option<usize> {
    self.columns.iter().position(|c| c == name)
  }

  pub fn has_column(&self, name: &str) -> bool { self.column_index(name).is_some() }

  /// Required columns absent from the header, in declaration order.
  pub fn missing_columns<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
    required.iter().copied().filter(|c| !self.has_column(c)).collect()
  }

  /// Replace the values of `name`, adding the column when it is new.
  pub fn set_column(&mut self, name: &str, mut value: impl FnMut(usize) -> Cell) {
    let idx = match self.column_index(name) {
      Some(idx) => idx,
      None => {
        self.columns.push(name.to_owned());
        for row in &mut self.rows {
          row.push(Cell::Missing);
        }
        self.columns.len() - 1
      }
    };
    for (i, row) in self.rows.iter_mut().enumerate() {
      row[idx] = value(i);
    }
  }

  /// Rows keyed by column name.
  pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
    self.rows.iter().map(|row| {
      self
        .columns
        .iter()
        .cloned()
        .zip(row.iter().cloned())
        .collect()
    })
  }
}

/// Infer a cell from raw file text: blanks and NA markers are missing,
/// then integers, decimals and booleans; anything else stays text.
pub fn parse_cell(raw: &str) -> Cell {
  let s = raw.trim();
  if s.is_empty() || MISSING_TOKENS.iter().any(|t| s.eq_ignore_ascii_case(t)) {
    return Cell::Missing;
  }
  if let Ok(i) = s.parse::<i64>() {
    return Cell::Integer(i);
  }
  if let Ok(d) = s.parse::<f64>()
    && d.is_finite()
  {
    return Cell::Decimal(d);
  }
  if s.eq_ignore_ascii_case("true") {
    return Cell::Boolean(true);
  }
  if s.eq_ignore_ascii_case("false") {
    return Cell::Boolean(false);
  }
  Cell::Text(s.to_owned())
}

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d-%m-%Y"];

const DATETIME_FORMATS: [&str; 4] =
  ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a calendar date from the formats field teams commonly export.
/// Ambiguous slash dates are read month-first.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
  let s = raw.trim();
  DATE_FORMATS
    .iter()
    .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
    .or_else(|| {
      DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .map(|dt| dt.date())
    })
    .or_else(|| chrono::DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

/// Python-style title case: a letter is upper-cased when the character
/// before it is not a letter, lower-cased otherwise.
pub fn title_case(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut prev_alpha = false;
  for c in s.chars() {
    if c.is_alphabetic() {
      if prev_alpha {
        out.extend(c.to_lowercase());
      } else {
        out.extend(c.to_uppercase());
      }
      prev_alpha = true;
    } else {
      out.push(c);
      prev_alpha = false;
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cells_are_inferred_from_text() {
    assert_eq!(parse_cell(" 42 "), Cell::Integer(42));
    assert_eq!(parse_cell("3.5"), Cell::Decimal(3.5));
    assert_eq!(parse_cell("TRUE"), Cell::Boolean(true));
    assert_eq!(parse_cell("N/A"), Cell::Missing);
    assert_eq!(parse_cell(""), Cell::Missing);
    assert_eq!(parse_cell("inf"), Cell::Text("inf".into()));
    assert_eq!(parse_cell("Kabale"), Cell::Text("Kabale".into()));
  }

  #[test]
  fn dates_parse_from_common_formats() {
    let d = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
    assert_eq!(parse_date("2024-03-14"), Some(d));
    assert_eq!(parse_date("03/14/2024"), Some(d));
    assert_eq!(parse_date("14/03/2024"), Some(d));
    assert_eq!(parse_date("2024-03-14 08:30:00"), Some(d));
    assert_eq!(parse_date("2024-03-14T08:30:00Z"), Some(d));
    assert_eq!(parse_date("last tuesday"), None);
  }

  #[test]
  fn title_case_matches_python() {
    assert_eq!(title_case("jane DOE"), "Jane Doe");
    assert_eq!(title_case("o'neil"), "O'Neil");
    assert_eq!(title_case("food security"), "Food Security");
  }

  #[test]
  fn set_column_adds_or_replaces() {
    let mut t = Table::new(vec!["a".into()]);
    t.push_row(vec![Cell::Integer(1)]);
    t.push_row(vec![]);
    t.set_column("b", |i| Cell::Integer(i as i64));
    t.set_column("a", |_| Cell::Missing);
    assert_eq!(t.columns, ["a", "b"]);
    assert_eq!(t.rows[1], [Cell::Missing, Cell::Integer(1)]);
  }
}
