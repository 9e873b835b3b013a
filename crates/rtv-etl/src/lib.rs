//! Survey file extraction, cleaning and transformation for the RTV warehouse.
//!
//! Everything here is synchronous and free of storage concerns: a survey
//! file becomes a [`Table`], the table is cleaned and fingerprinted, and
//! [`transform`] turns it into a [`rtv_core::batch::WarehouseBatch`] ready to
//! load.

pub mod clean;
pub mod error;
pub mod hash;
pub mod read;
pub mod table;
pub mod transform;

pub use clean::clean;
pub use error::{Error, Result};
pub use hash::content_hash;
pub use read::{read_table, validate_file};
pub use table::Table;
pub use transform::{Transformed, TransformStats, transform};
