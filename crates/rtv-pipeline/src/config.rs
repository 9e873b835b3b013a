//! Runtime configuration, layered from an optional TOML file and `RTV_*`
//! environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Settings shared by every `rtv` subcommand.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// SQLite warehouse file.
  pub store_path:    PathBuf,
  /// Directory scanned for survey exports.
  pub source_dir:    PathBuf,
  /// Root of the on-disk landing zone.
  pub lake_dir:      PathBuf,
  pub host:          String,
  pub port:          u16,
  /// `pipeline_name` written to `pipeline_logs`.
  pub pipeline_name: String,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      store_path:    PathBuf::from("rtv.sqlite3"),
      source_dir:    PathBuf::from("data"),
      lake_dir:      PathBuf::from("lake"),
      host:          "0.0.0.0".to_string(),
      port:          8501,
      pipeline_name: "rtv_pipeline".to_string(),
    }
  }
}

impl PipelineConfig {
  /// Read `path` if it exists, then apply `RTV_*` overrides
  /// (e.g. `RTV_STORE_PATH`).
  pub fn load(path: &Path) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("RTV"))
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = PipelineConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.port, 8501);
    assert_eq!(cfg.pipeline_name, "rtv_pipeline");
    assert_eq!(cfg.address(), "0.0.0.0:8501");
  }

  #[test]
  fn file_overrides_some_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rtv.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "store_path = \"/var/lib/rtv/warehouse.sqlite3\"\nport = 9000").unwrap();

    let cfg = PipelineConfig::load(&path).unwrap();
    assert_eq!(cfg.store_path, PathBuf::from("/var/lib/rtv/warehouse.sqlite3"));
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.source_dir, PathBuf::from("data"));
  }
}
