//! Streaming cursor shared by the sqlx-backed connections.

use super::{RawValue, RowCursor};
use crate::error::{Result, TableQueryError};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use sqlx::{Column as SqlxColumn, Row as SqlxRow};
use std::time::Duration;
use tokio::time::Instant;

/// Backend-specific knowledge the generic cursor needs.
pub trait RowDecoder: Send + Sync + 'static {
    /// Row type produced by the backend.
    type Row: SqlxRow;

    /// Decodes one column of a row into a raw value. Never fails: anything
    /// that cannot be decoded is reported as `RawValue::Unsupported`.
    fn decode(row: &Self::Row, index: usize) -> RawValue;

    /// Renders a driver error as a human-readable message.
    fn describe_error(error: &sqlx::Error) -> String {
        match error.as_database_error() {
            Some(db_error) => db_error.message().to_string(),
            None => error.to_string(),
        }
    }
}

/// Cursor over a sqlx row stream.
///
/// The first row is fetched eagerly when the cursor is opened so that
/// execution errors surface from `DatabaseConnection::query` and column
/// names are known before iteration starts. Every fetch, the first one
/// included, shares a single deadline.
pub struct SqlxCursor<'c, D: RowDecoder> {
    stream: BoxStream<'c, std::result::Result<D::Row, sqlx::Error>>,
    columns: Vec<String>,
    pending: Option<D::Row>,
    exhausted: bool,
    deadline: Instant,
    timeout: Duration,
}

impl<'c, D: RowDecoder> SqlxCursor<'c, D> {
    /// Starts the stream and reads the first row.
    ///
    /// `timeout` bounds the whole query, from now until the last row.
    pub async fn open(
        stream: BoxStream<'c, std::result::Result<D::Row, sqlx::Error>>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut cursor = Self {
            stream,
            columns: Vec::new(),
            pending: None,
            exhausted: false,
            deadline: Instant::now() + timeout,
            timeout,
        };

        match cursor.fetch().await? {
            Some(first) => {
                cursor.columns = column_names(&first);
                cursor.pending = Some(first);
            }
            None => cursor.exhausted = true,
        }

        Ok(cursor)
    }

    async fn fetch(&mut self) -> Result<Option<D::Row>> {
        tokio::time::timeout_at(self.deadline, self.stream.try_next())
            .await
            .map_err(|_| {
                TableQueryError::execution(format!(
                    "Query timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| TableQueryError::execution(D::describe_error(&e)))
    }

    /// Returns true if the result set had no rows at all.
    pub fn is_empty(&self) -> bool {
        self.exhausted && self.pending.is_none()
    }

    /// Replaces the column names, for result sets where no row carried them.
    pub fn set_columns(&mut self, columns: Vec<String>) {
        self.columns = columns;
    }
}

#[async_trait]
impl<'c, D: RowDecoder> RowCursor for SqlxCursor<'c, D> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Vec<RawValue>>> {
        let row = match self.pending.take() {
            Some(row) => row,
            None if self.exhausted => return Ok(None),
            None => match self.fetch().await? {
                Some(row) => row,
                None => {
                    self.exhausted = true;
                    return Ok(None);
                }
            },
        };

        Ok(Some((0..row.len()).map(|i| D::decode(&row, i)).collect()))
    }
}

fn column_names<R: SqlxRow>(row: &R) -> Vec<String> {
    row.columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect()
}
