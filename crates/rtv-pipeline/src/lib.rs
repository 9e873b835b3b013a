//! Orchestration for the RTV survey warehouse: configuration, the on-disk
//! landing zone and the ordered pipeline stages.
//!
//! The `rtv` binary in this crate wires these to a [`rtv_store_sqlite::SqliteStore`]
//! and serves [`rtv_api`] over HTTP.

pub mod config;
pub mod error;
pub mod lake;
pub mod stages;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use lake::{DataLake, StagedBatch};
pub use stages::{IngestReport, LoadReport, Pipeline, RunReport, StageFailure};
