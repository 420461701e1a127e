//! Query batch pipeline for tablequery.
//!
//! This module turns a batch request into a batch response: per-query
//! preprocessing and execution, row materialization, and table assembly.

pub mod buffer;
pub mod executor;
pub mod materialize;
pub mod request;
pub mod service;
pub mod table;

pub use buffer::RowBuffer;
pub use executor::{BatchExecutor, CANCELLED_MESSAGE};
pub use materialize::{materialize_row, materialize_rows};
pub use request::{
    BatchRequest, BatchResponse, DatasourceSettings, QueryFormat, QueryOutcome, QueryResult,
    QuerySpec, TimeRange,
};
pub use service::QueryService;
pub use table::{Table, TableBuilder, TableMeta};
