//! Error type for `rtv-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  /// A row referenced a parent that does not exist.
  #[error("referential integrity violation: {0}")]
  ForeignKeyViolation(String),

  #[error("uniqueness violation: {0}")]
  UniqueViolation(String),

  #[error("household {household_id} already has a survey for round {round_id}")]
  DuplicateSurvey { household_id: String, round_id: String },

  #[error("survey {survey_id} already has a measurement for indicator {indicator_id}")]
  DuplicateMeasurement { survey_id: i64, indicator_id: String },

  #[error("survey not found: {0}")]
  SurveyNotFound(i64),

  #[error("pipeline run not found: {0}")]
  PipelineRunNotFound(i64),

  #[error("pipeline run {0} has already finished")]
  PipelineRunFinished(i64),

  #[error("alert not found: {0}")]
  AlertNotFound(i64),

  #[error("alert {0} is already resolved")]
  AlertResolved(i64),

  #[error("lineage not found: {0}")]
  LineageNotFound(i64),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("decode error: {0}")]
  Decode(String),
}

impl From<tokio_rusqlite::Error> for Error {
  /// Lift SQLite constraint failures into typed variants.
  fn from(err: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(code, msg)) = &err {
      let message = msg.clone().unwrap_or_else(|| code.to_string());
      match code.extended_code {
        rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return Self::ForeignKeyViolation(message),
        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
          return Self::UniqueViolation(message);
        }
        _ => {}
      }
    }
    Self::Database(err)
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
