//! Integration tests for tablequery.

pub mod batch_test;
pub mod postgres_test;
pub mod sqlite_file_test;
