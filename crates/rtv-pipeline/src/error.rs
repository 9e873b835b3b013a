//! Error type for `rtv-pipeline`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error(transparent)]
  Etl(#[from] rtv_etl::Error),

  #[error(transparent)]
  Core(#[from] rtv_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("object not found: {0}")]
  ObjectNotFound(String),

  #[error("invalid object name: {0}")]
  InvalidObjectName(String),

  #[error("{file} does not match the schema of round {round_id}: {}", .errors.join("; "))]
  SchemaViolation {
    file:     String,
    round_id: String,
    errors:   Vec<String>,
  },

  #[error("background task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
