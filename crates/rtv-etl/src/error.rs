//! Error type for `rtv-etl`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unsupported file format: {}", .0.display())]
  UnsupportedFormat(PathBuf),

  #[error("file not found: {}", .0.display())]
  NotFound(PathBuf),

  #[error("empty file: {}", .0.display())]
  EmptyFile(PathBuf),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("excel error: {0}")]
  Excel(#[from] calamine::Error),

  #[error("workbook has no worksheet: {}", .0.display())]
  NoWorksheet(PathBuf),

  #[error("table has no rows")]
  EmptyTable,

  #[error("missing required columns: {}", .0.join(", "))]
  MissingColumns(Vec<String>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
