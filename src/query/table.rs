//! Table result assembly.

use super::buffer::RowBuffer;
use super::materialize::materialize_rows;
use crate::config::DEFAULT_INITIAL_ROW_CAPACITY;
use crate::db::{Column, Row, RowCursor};
use crate::error::{Result, TableQueryError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A materialized result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    /// JSON object with `rowCount` and the executed `sql`.
    pub meta_json: String,
}

impl Table {
    /// Decodes the metadata attached to this table.
    pub fn meta(&self) -> Result<TableMeta> {
        serde_json::from_str(&self.meta_json)
            .map_err(|e| TableQueryError::internal(format!("Malformed table metadata: {e}")))
    }
}

/// Observability metadata attached to a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMeta {
    pub row_count: usize,
    pub sql: String,
}

/// Builds tables from live cursors.
#[derive(Debug, Clone, Copy)]
pub struct TableBuilder {
    initial_row_capacity: usize,
}

impl TableBuilder {
    pub fn new(initial_row_capacity: usize) -> Self {
        Self {
            initial_row_capacity,
        }
    }

    /// Drains `cursor` into a table.
    ///
    /// The cursor is borrowed, not consumed; closing it is up to the caller.
    /// A fetch failure fails the whole table; its message carries the number
    /// of rows read before the failure.
    pub async fn build<C>(&self, cursor: &mut C, sql: &str) -> Result<Table>
    where
        C: RowCursor + ?Sized,
    {
        let columns: Vec<Column> = cursor.columns().iter().map(Column::new).collect();

        let mut buffer = RowBuffer::with_capacity(self.initial_row_capacity);
        if let Err(e) = materialize_rows(cursor, &mut buffer).await {
            warn!(
                "Row fetch failed after {} rows, discarding partial table",
                buffer.len()
            );
            return Err(TableQueryError::execution(format!(
                "{} (after {} rows)",
                e.message(),
                buffer.len()
            )));
        }

        debug!(
            rows = buffer.len(),
            growth_events = buffer.growth_events(),
            "Materialized table"
        );

        let rows = buffer.into_rows();
        let meta = TableMeta {
            row_count: rows.len(),
            sql: sql.to_string(),
        };
        let meta_json = serde_json::to_string(&meta).map_err(|e| {
            TableQueryError::internal(format!("Failed to encode table metadata: {e}"))
        })?;

        Ok(Table {
            columns,
            rows,
            meta_json,
        })
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_ROW_CAPACITY)
    }
}
