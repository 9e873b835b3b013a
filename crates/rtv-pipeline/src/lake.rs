//! The landing zone: raw uploads and staged batches on the local filesystem.
//!
//! Objects are addressed by `/`-separated names relative to the lake root,
//! following the object-store layout the field teams already use:
//!
//! | Prefix | Contents |
//! |--------|----------|
//! | `raw/YYYY/MM/DD/<file>` | source files as received, each with a `<file>.meta.json` sidecar |
//! | `processed/<stem>_<YYYYmmdd_HHMMSS>[_<n>].json` | cleaned batches waiting to be loaded |
//! | `archive/<object>` | batches that have been loaded |
//! | `failed/<object>` | batches that could not be loaded |
//!
//! Objects are never overwritten: a name that is taken gets a numeric
//! suffix.

use std::{
  path::{Component, Path, PathBuf},
  time::SystemTime,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{fs, io::AsyncWriteExt as _};
use tracing::{debug, info};

use rtv_etl::Table;

use crate::{Error, Result};

pub const RAW_PREFIX: &str = "raw/";
pub const PROCESSED_PREFIX: &str = "processed/";
pub const ARCHIVE_PREFIX: &str = "archive/";
pub const FAILED_PREFIX: &str = "failed/";

const META_SUFFIX: &str = ".meta.json";

/// A cleaned survey table together with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedBatch {
  pub source_file: String,
  pub round_id:    String,
  pub lineage_id:  i64,
  pub hash_value:  String,
  pub ingested_at: DateTime<Utc>,
  pub table:       Table,
}

#[derive(Debug, Clone)]
pub struct DataLake {
  root: PathBuf,
}

impl DataLake {
  /// Open the lake at `root`, creating the directory if needed.
  pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
    let root = root.as_ref().to_path_buf();
    fs::create_dir_all(&root).await?;
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path { &self.root }

  /// Resolve an object name to a path inside the lake. Absolute names and
  /// `..` segments are rejected.
  fn path(&self, object: &str) -> Result<PathBuf> {
    let rel = Path::new(object);
    if object.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
      return Err(Error::InvalidObjectName(object.to_owned()));
    }
    Ok(self.root.join(rel))
  }

  async fn write(&self, object: &str, bytes: &[u8]) -> Result<()> {
    let path = self.path(object)?;
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }
    fs::write(&path, bytes).await?;
    Ok(())
  }

  /// `<base><ext>`, or `<base>_<n><ext>` for the first `n` not yet taken.
  fn candidate(base: &str, ext: &str, attempt: u32) -> String {
    if attempt == 0 { format!("{base}{ext}") } else { format!("{base}_{attempt}{ext}") }
  }

  /// Create a new object, never replacing an existing one, and return the
  /// name it was written under.
  async fn write_new(&self, base: &str, ext: &str, bytes: &[u8]) -> Result<String> {
    let mut attempt = 0;
    loop {
      let object = Self::candidate(base, ext, attempt);
      let path = self.path(&object)?;
      if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
      }
      match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
        Ok(mut file) => {
          file.write_all(bytes).await?;
          file.flush().await?;
          return Ok(object);
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
        Err(e) => return Err(e.into()),
      }
    }
  }

  async fn read(&self, object: &str) -> Result<Vec<u8>> {
    match fs::read(self.path(object)?).await {
      Ok(bytes) => Ok(bytes),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        Err(Error::ObjectNotFound(object.to_owned()))
      }
      Err(e) => Err(e.into()),
    }
  }

  // ─── Raw uploads ──────────────────────────────────────────────────────────

  /// Copy `file` to `raw/YYYY/MM/DD/<name>` and write its metadata sidecar.
  /// A file uploaded twice on one day is kept twice.
  /// `upload_date` and `original_filename` are added to `metadata`.
  pub async fn store_raw(&self, file: &Path, mut metadata: Map<String, Value>) -> Result<String> {
    let name = file
      .file_name()
      .and_then(|n| n.to_str())
      .ok_or_else(|| Error::InvalidObjectName(file.display().to_string()))?;
    let now = Utc::now();
    let (stem, ext) = match name.rsplit_once('.') {
      Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
      _ => (name, String::new()),
    };

    let bytes = fs::read(file).await?;
    let base = format!("{RAW_PREFIX}{}/{stem}", now.format("%Y/%m/%d"));
    let object = self.write_new(&base, &ext, &bytes).await?;

    metadata.insert("upload_date".into(), Value::from(now.to_rfc3339()));
    metadata.insert("original_filename".into(), Value::from(name));
    self
      .write(&format!("{object}{META_SUFFIX}"), &serde_json::to_vec_pretty(&metadata)?)
      .await?;

    info!(object = %object, bytes = bytes.len(), "stored raw file");
    Ok(object)
  }

  /// Metadata stored alongside an object by [`DataLake::store_raw`].
  pub async fn metadata(&self, object: &str) -> Result<Map<String, Value>> {
    let bytes = self.read(&format!("{object}{META_SUFFIX}")).await?;
    Ok(serde_json::from_slice(&bytes)?)
  }

  // ─── Staged batches ───────────────────────────────────────────────────────

  /// Write a staged batch to `processed/<stem>_<YYYYmmdd_HHMMSS>.json`,
  /// stamped with its ingestion time. A batch staged under a name that is
  /// already taken gets a `_<n>` suffix.
  pub async fn put_staged(&self, batch: &StagedBatch) -> Result<String> {
    let stem = Path::new(&batch.source_file)
      .file_stem()
      .and_then(|s| s.to_str())
      .unwrap_or(&batch.source_file);
    let base = format!("{PROCESSED_PREFIX}{stem}_{}", batch.ingested_at.format("%Y%m%d_%H%M%S"));
    let object = self.write_new(&base, ".json", &serde_json::to_vec(batch)?).await?;
    debug!(object = %object, rows = batch.table.len(), "staged batch");
    Ok(object)
  }

  pub async fn get_staged(&self, object: &str) -> Result<StagedBatch> {
    let bytes = self.read(object).await?;
    Ok(serde_json::from_slice(&bytes)?)
  }

  // ─── Listing & housekeeping ───────────────────────────────────────────────

  /// Every object whose name starts with `prefix`, sorted by name. Metadata
  /// sidecars are not listed.
  pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
    Ok(
      self
        .walk()
        .await?
        .into_iter()
        .map(|(name, _)| name)
        .filter(|name| name.starts_with(prefix))
        .collect(),
    )
  }

  /// The most recently modified object under `prefix`. Ties go to the
  /// greater name.
  pub async fn latest(&self, prefix: &str) -> Result<Option<String>> {
    Ok(
      self
        .walk()
        .await?
        .into_iter()
        .filter(|(name, _)| name.starts_with(prefix))
        .max_by(|(a_name, a_time), (b_name, b_time)| {
          a_time.cmp(b_time).then_with(|| a_name.cmp(b_name))
        })
        .map(|(name, _)| name),
    )
  }

  /// Move a loaded object under `archive/`, keeping its name.
  pub async fn archive(&self, object: &str) -> Result<String> {
    self.relocate(object, &format!("{ARCHIVE_PREFIX}{object}")).await
  }

  /// Move an object that could not be loaded under `failed/`, out of the
  /// way of later loads.
  pub async fn quarantine(&self, object: &str) -> Result<String> {
    self.relocate(object, &format!("{FAILED_PREFIX}{object}")).await
  }

  /// Move a quarantined object back to where it was, to be loaded again.
  pub async fn requeue(&self, object: &str) -> Result<String> {
    let original = object
      .strip_prefix(FAILED_PREFIX)
      .filter(|rest| !rest.is_empty())
      .ok_or_else(|| Error::InvalidObjectName(object.to_owned()))?;
    self.relocate(object, original).await
  }

  /// Rename `object` to `target`, or to the first free `_<n>` variant of it.
  async fn relocate(&self, object: &str, target: &str) -> Result<String> {
    let from = self.path(object)?;
    if !fs::try_exists(&from).await? {
      return Err(Error::ObjectNotFound(object.to_owned()));
    }

    let (base, ext) = match target.rsplit_once('.') {
      Some((base, ext)) if !base.ends_with('/') && !ext.contains('/') => (base, format!(".{ext}")),
      _ => (target, String::new()),
    };
    let mut attempt = 0;
    let (moved, to) = loop {
      let candidate = Self::candidate(base, &ext, attempt);
      let to = self.path(&candidate)?;
      if !fs::try_exists(&to).await? {
        break (candidate, to);
      }
      attempt += 1;
    };

    if let Some(parent) = to.parent() {
      fs::create_dir_all(parent).await?;
    }
    fs::rename(&from, &to).await?;
    info!(object = %object, to = %moved, "moved object");
    Ok(moved)
  }

  /// Remove an object and its sidecar. Returns `false` when nothing was
  /// there.
  pub async fn delete(&self, object: &str) -> Result<bool> {
    let path = self.path(object)?;
    let removed = match fs::remove_file(&path).await {
      Ok(()) => true,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
      Err(e) => return Err(e.into()),
    };
    let meta = self.path(&format!("{object}{META_SUFFIX}"))?;
    if let Err(e) = fs::remove_file(&meta).await
      && e.kind() != std::io::ErrorKind::NotFound
    {
      return Err(e.into());
    }
    if removed {
      info!(object = %object, "deleted object");
    }
    Ok(removed)
  }

  /// All objects with their modification times, sorted by name.
  async fn walk(&self) -> Result<Vec<(String, SystemTime)>> {
    let mut objects = Vec::new();
    let mut pending = vec![self.root.clone()];

    while let Some(dir) = pending.pop() {
      let mut entries = fs::read_dir(&dir).await?;
      while let Some(entry) = entries.next_entry().await? {
        let meta = entry.metadata().await?;
        let path = entry.path();
        if meta.is_dir() {
          pending.push(path);
          continue;
        }
        let Ok(rel) = path.strip_prefix(&self.root) else { continue };
        let name = rel
          .components()
          .filter_map(|c| c.as_os_str().to_str())
          .collect::<Vec<_>>()
          .join("/");
        if name.ends_with(META_SUFFIX) {
          continue;
        }
        objects.push((name, meta.modified()?));
      }
    }

    objects.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(objects)
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;
  use rtv_core::record::Cell;
  use tempfile::TempDir;

  use super::*;

  async fn lake() -> (TempDir, DataLake) {
    let dir = TempDir::new().unwrap();
    let lake = DataLake::open(dir.path().join("lake")).await.unwrap();
    (dir, lake)
  }

  fn batch(source_file: &str, second: u32) -> StagedBatch {
    let mut table = Table::new(vec!["household_id".into()]);
    table.push_row(vec![Cell::Text("H1".into())]);
    StagedBatch {
      source_file: source_file.into(),
      round_id: "01".into(),
      lineage_id: 1,
      hash_value: "abc".into(),
      ingested_at: Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, second).unwrap(),
      table,
    }
  }

  #[tokio::test]
  async fn raw_files_get_a_dated_path_and_metadata() {
    let (dir, lake) = lake().await;
    let src = dir.path().join("01_baseline.csv");
    std::fs::write(&src, "household_id\nH1\n").unwrap();

    let mut meta = Map::new();
    meta.insert("round_id".into(), Value::from("01"));
    let object = lake.store_raw(&src, meta).await.unwrap();

    assert!(object.starts_with(RAW_PREFIX));
    assert!(object.ends_with("/01_baseline.csv"));
    assert_eq!(object.split('/').count(), 5);

    let stored = lake.metadata(&object).await.unwrap();
    assert_eq!(stored["round_id"], "01");
    assert_eq!(stored["original_filename"], "01_baseline.csv");
    assert!(stored.contains_key("upload_date"));

    assert_eq!(lake.list(RAW_PREFIX).await.unwrap(), [object]);
  }

  #[tokio::test]
  async fn same_named_uploads_are_both_kept() {
    let (dir, lake) = lake().await;
    let src = dir.path().join("01_baseline.csv");
    std::fs::write(&src, "household_id\nH1\n").unwrap();
    let first = lake.store_raw(&src, Map::new()).await.unwrap();
    std::fs::write(&src, "household_id\nH2\n").unwrap();
    let second = lake.store_raw(&src, Map::new()).await.unwrap();

    assert!(second.ends_with("/01_baseline_1.csv"));
    assert_eq!(lake.list(RAW_PREFIX).await.unwrap(), [first, second.clone()]);
    assert_eq!(lake.metadata(&second).await.unwrap()["original_filename"], "01_baseline.csv");
  }

  #[tokio::test]
  async fn staged_batches_round_trip_and_archive() {
    let (_dir, lake) = lake().await;
    let staged = batch("01_baseline.csv", 7);

    let object = lake.put_staged(&staged).await.unwrap();
    assert_eq!(object, "processed/01_baseline_20240305_120007.json");
    assert_eq!(lake.get_staged(&object).await.unwrap(), staged);

    let archived = lake.archive(&object).await.unwrap();
    assert_eq!(archived, format!("archive/{object}"));
    assert!(lake.list(PROCESSED_PREFIX).await.unwrap().is_empty());
    assert!(matches!(lake.get_staged(&object).await, Err(Error::ObjectNotFound(_))));
    assert!(matches!(lake.archive(&object).await, Err(Error::ObjectNotFound(_))));
  }

  #[tokio::test]
  async fn batches_staged_in_the_same_second_do_not_overwrite_each_other() {
    let (_dir, lake) = lake().await;
    let mut upper = batch("01_baseline.CSV", 7);
    upper.hash_value = "def".into();

    let first = lake.put_staged(&batch("01_baseline.csv", 7)).await.unwrap();
    let second = lake.put_staged(&upper).await.unwrap();

    assert_eq!(first, "processed/01_baseline_20240305_120007.json");
    assert_eq!(second, "processed/01_baseline_20240305_120007_1.json");
    assert_eq!(lake.list(PROCESSED_PREFIX).await.unwrap(), [first.clone(), second.clone()]);
    assert_eq!(lake.get_staged(&first).await.unwrap().hash_value, "abc");
    assert_eq!(lake.get_staged(&second).await.unwrap().hash_value, "def");
  }

  #[tokio::test]
  async fn quarantined_batches_can_be_requeued() {
    let (_dir, lake) = lake().await;
    let object = lake.put_staged(&batch("01_baseline.csv", 0)).await.unwrap();

    let failed = lake.quarantine(&object).await.unwrap();
    assert_eq!(failed, format!("failed/{object}"));
    assert!(lake.list(PROCESSED_PREFIX).await.unwrap().is_empty());
    assert_eq!(lake.list(FAILED_PREFIX).await.unwrap(), [failed.clone()]);

    assert_eq!(lake.requeue(&failed).await.unwrap(), object);
    assert_eq!(lake.list(PROCESSED_PREFIX).await.unwrap(), [object.clone()]);
    assert!(matches!(lake.requeue(&object).await, Err(Error::InvalidObjectName(_))));
  }

  #[tokio::test]
  async fn moving_onto_a_taken_name_picks_a_free_one() {
    let (_dir, lake) = lake().await;
    let staged = batch("01_baseline.csv", 0);

    let object = lake.put_staged(&staged).await.unwrap();
    let archived = lake.archive(&object).await.unwrap();
    let again = lake.put_staged(&staged).await.unwrap();
    assert_eq!(again, object);

    let archived_again = lake.archive(&again).await.unwrap();
    assert_ne!(archived_again, archived);
    assert_eq!(archived_again, "archive/processed/01_baseline_20240305_120000_1.json");
    assert_eq!(lake.list(ARCHIVE_PREFIX).await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn latest_prefers_newest_then_name() {
    let (_dir, lake) = lake().await;
    assert_eq!(lake.latest(PROCESSED_PREFIX).await.unwrap(), None);

    lake.put_staged(&batch("01_baseline.csv", 1)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let newest = lake.put_staged(&batch("02_year_one.csv", 0)).await.unwrap();

    assert_eq!(lake.latest(PROCESSED_PREFIX).await.unwrap(), Some(newest));
  }

  #[tokio::test]
  async fn delete_reports_whether_anything_was_removed() {
    let (_dir, lake) = lake().await;
    let object = lake.put_staged(&batch("01_baseline.csv", 0)).await.unwrap();

    assert!(lake.delete(&object).await.unwrap());
    assert!(!lake.delete(&object).await.unwrap());
  }

  #[tokio::test]
  async fn escaping_object_names_are_rejected() {
    let (_dir, lake) = lake().await;
    assert!(matches!(lake.get_staged("../secrets").await, Err(Error::InvalidObjectName(_))));
    assert!(matches!(lake.delete("/etc/passwd").await, Err(Error::InvalidObjectName(_))));
  }
}
