//! Batch query execution with per-query failure isolation.
//!
//! Each query runs through format check, macro interpolation, execution
//! and materialization. A failure at any step becomes that query's error
//! message; the batch moves on to the next query.

use super::request::{QueryOutcome, QueryResult, QuerySpec};
use super::table::{Table, TableBuilder};
use super::BatchResponse;
use crate::db::DatabaseConnection;
use crate::error::Result;
use crate::interpolate::{MacroInterpolator, RequestContext};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Error recorded for queries skipped after the request was cancelled.
pub const CANCELLED_MESSAGE: &str = "query cancelled";

/// Runs the queries of one batch against a shared connection.
pub struct BatchExecutor<'a> {
    interpolator: &'a dyn MacroInterpolator,
    builder: TableBuilder,
}

impl<'a> BatchExecutor<'a> {
    /// Creates a new batch executor.
    pub fn new(interpolator: &'a dyn MacroInterpolator, builder: TableBuilder) -> Self {
        Self {
            interpolator,
            builder,
        }
    }

    /// Executes every query in order and returns one result per query.
    ///
    /// Never fails as a whole: per-query errors are recorded in the
    /// matching result. Cancellation is checked before each query.
    pub async fn execute(
        &self,
        conn: &dyn DatabaseConnection,
        queries: &[QuerySpec],
        context: &RequestContext,
        cancel: &CancellationToken,
    ) -> BatchResponse {
        let mut results = Vec::with_capacity(queries.len());

        for (index, spec) in queries.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    "Request cancelled, skipping {} remaining queries",
                    queries.len() - index
                );
                results.extend(
                    queries[index..]
                        .iter()
                        .map(|q| QueryResult::error(q.ref_id.clone(), CANCELLED_MESSAGE)),
                );
                break;
            }

            let outcome = match self.execute_one(conn, spec, context).await {
                Ok(table) => {
                    debug!(ref_id = %spec.ref_id, rows = table.rows.len(), "Query succeeded");
                    QueryOutcome::Table(table)
                }
                Err(e) => {
                    warn!(ref_id = %spec.ref_id, "{}: {}", e.category(), e.message());
                    QueryOutcome::Error(e.message().to_string())
                }
            };

            results.push(QueryResult {
                ref_id: spec.ref_id.clone(),
                outcome,
            });
        }

        BatchResponse { results }
    }

    async fn execute_one(
        &self,
        conn: &dyn DatabaseConnection,
        spec: &QuerySpec,
        context: &RequestContext,
    ) -> Result<Table> {
        spec.format.ensure_table()?;

        let sql = self.interpolator.interpolate(&spec.raw_sql, context)?;
        debug!(ref_id = %spec.ref_id, sql = %sql, "Executing query");

        let mut cursor = conn.query(&sql).await?;
        self.builder.build(&mut *cursor, &sql).await
    }
}
