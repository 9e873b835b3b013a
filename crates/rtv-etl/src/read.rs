//! Reading survey files from disk.

use std::path::Path;

use calamine::{Data, Reader as _, open_workbook_auto};
use tracing::debug;

use rtv_core::record::Cell;

use crate::{
  Error, Result,
  table::{REQUIRED_COLUMNS, Table, parse_cell, parse_date},
};

/// The file formats survey exports arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
  Csv,
  Xlsx,
}

impl SourceFormat {
  /// Format from the file extension, case-insensitively.
  pub fn from_path(path: &Path) -> Option<Self> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("csv") {
      Some(Self::Csv)
    } else if ext.eq_ignore_ascii_case("xlsx") {
      Some(Self::Xlsx)
    } else {
      None
    }
  }
}

/// Check that `path` is a non-empty CSV or XLSX file.
pub fn validate_file(path: &Path) -> Result<SourceFormat> {
  let format =
    SourceFormat::from_path(path).ok_or_else(|| Error::UnsupportedFormat(path.to_owned()))?;
  let meta = match std::fs::metadata(path) {
    Ok(meta) if meta.is_file() => meta,
    Ok(_) => return Err(Error::NotFound(path.to_owned())),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      return Err(Error::NotFound(path.to_owned()));
    }
    Err(e) => return Err(e.into()),
  };
  if meta.len() == 0 {
    return Err(Error::EmptyFile(path.to_owned()));
  }
  Ok(format)
}

/// Read a survey file into a [`Table`]. XLSX files are read from their first
/// worksheet. A table without rows or without the required columns is an
/// error.
pub fn read_table(path: &Path) -> Result<Table> {
  let table = match validate_file(path)? {
    SourceFormat::Csv => read_csv(path)?,
    SourceFormat::Xlsx => read_xlsx(path)?,
  };
  debug!(path = %path.display(), rows = table.len(), columns = table.columns.len(), "read table");

  if table.is_empty() {
    return Err(Error::EmptyTable);
  }
  let missing = table.missing_columns(&REQUIRED_COLUMNS);
  if !missing.is_empty() {
    return Err(Error::MissingColumns(missing.into_iter().map(str::to_owned).collect()));
  }
  Ok(table)
}

fn read_csv(path: &Path) -> Result<Table> {
  let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
  let columns = reader.headers()?.iter().map(|h| h.trim().to_owned()).collect();
  let mut table = Table::new(columns);
  for record in reader.records() {
    let record = record?;
    table.push_row(record.iter().map(parse_cell).collect());
  }
  Ok(table)
}

fn read_xlsx(path: &Path) -> Result<Table> {
  let mut workbook = open_workbook_auto(path)?;
  let range = workbook
    .worksheet_range_at(0)
    .ok_or_else(|| Error::NoWorksheet(path.to_owned()))??;

  let mut rows = range.rows();
  let Some(header) = rows.next() else {
    return Ok(Table::default());
  };
  let mut table = Table::new(header.iter().map(|c| c.to_string().trim().to_owned()).collect());
  for row in rows {
    table.push_row(row.iter().map(excel_cell).collect());
  }
  Ok(table)
}

/// Map a worksheet value onto a [`Cell`]. Whole floats become integers, as
/// they would when the same sheet is exported to CSV.
fn excel_cell(value: &Data) -> Cell {
  match value {
    Data::Empty | Data::Error(_) => Cell::Missing,
    Data::Int(i) => Cell::Integer(*i),
    Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Cell::Integer(*f as i64),
    Data::Float(f) => Cell::Decimal(*f),
    Data::Bool(b) => Cell::Boolean(*b),
    Data::String(s) => parse_cell(s),
    Data::DateTime(dt) => dt
      .as_datetime()
      .map(|dt| Cell::Date(dt.date()))
      .unwrap_or(Cell::Missing),
    Data::DateTimeIso(s) => parse_date(s).map(Cell::Date).unwrap_or_else(|| parse_cell(s)),
    Data::DurationIso(s) => Cell::Text(s.clone()),
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use tempfile::TempDir;

  use super::*;

  fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
  }

  #[test]
  fn validate_rejects_unsupported_missing_and_empty_files() {
    let dir = TempDir::new().unwrap();
    let txt = write(&dir, "notes.txt", "hello");
    let empty = write(&dir, "01_baseline.csv", "");

    assert!(matches!(validate_file(&txt), Err(Error::UnsupportedFormat(_))));
    assert!(matches!(validate_file(&dir.path().join("gone.csv")), Err(Error::NotFound(_))));
    assert!(matches!(validate_file(&empty), Err(Error::EmptyFile(_))));
  }

  #[test]
  fn extension_match_is_case_insensitive() {
    assert_eq!(SourceFormat::from_path(Path::new("a.CSV")), Some(SourceFormat::Csv));
    assert_eq!(SourceFormat::from_path(Path::new("a.Xlsx")), Some(SourceFormat::Xlsx));
    assert_eq!(SourceFormat::from_path(Path::new("a.xls")), None);
  }

  #[test]
  fn csv_is_read_with_typed_cells() {
    let dir = TempDir::new().unwrap();
    let path = write(
      &dir,
      "01_baseline.csv",
      "household_id,village_id,survey_date,household_size\n\
       H1,V1,2024-03-01,5\n\
       H2,V1,2024-03-02,\n",
    );

    let table = read_table(&path).unwrap();
    assert_eq!(table.columns, ["household_id", "village_id", "survey_date", "household_size"]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows[0][3], Cell::Integer(5));
    assert_eq!(table.rows[1][3], Cell::Missing);
  }

  #[test]
  fn missing_required_columns_are_reported() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "01_baseline.csv", "household_id,value\nH1,3\n");

    match read_table(&path) {
      Err(Error::MissingColumns(cols)) => assert_eq!(cols, ["survey_date", "village_id"]),
      other => panic!("expected MissingColumns, got {other:?}"),
    }
  }

  #[test]
  fn header_only_csv_is_empty() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "01_baseline.csv", "household_id,village_id,survey_date\n");
    assert!(matches!(read_table(&path), Err(Error::EmptyTable)));
  }
}
