//! tablequery - batch SQL query adapter.
//!
//! Executes a batch of queries against one connection and materializes each
//! result set into a typed table, recording per-query failures in place.

pub mod config;
pub mod db;
pub mod error;
pub mod interpolate;
pub mod logging;
pub mod query;
