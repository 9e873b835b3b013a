//! Core types and trait definitions for the RTV household survey warehouse.
//!
//! This crate is deliberately free of HTTP, file and database dependencies.
//! All other crates depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod batch;
pub mod dimension;
pub mod error;
pub mod fact;
pub mod progress;
pub mod quality;
pub mod record;
pub mod registry;
pub mod store;

pub use error::{Error, Result};
