//! Whole-batch entry point: connection lifecycle around the executor.

use super::executor::BatchExecutor;
use super::request::{BatchRequest, BatchResponse};
use super::table::TableBuilder;
use crate::config::{ConnectionConfig, ExecutorConfig};
use crate::db::{Connector, SqlxConnector};
use crate::error::Result;
use crate::interpolate::{MacroInterpolator, RequestContext, TimeMacros};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Serves query batches.
///
/// Holds no per-request state; concurrent calls each open their own
/// connection.
pub struct QueryService<C = SqlxConnector, M = TimeMacros> {
    connector: C,
    interpolator: M,
    config: ExecutorConfig,
}

impl QueryService {
    /// Creates a service using the sqlx drivers and the time-range macros.
    pub fn new(config: ExecutorConfig) -> Self {
        Self::with_parts(SqlxConnector, TimeMacros, config)
    }
}

impl<C: Connector, M: MacroInterpolator> QueryService<C, M> {
    /// Creates a service from explicit collaborators.
    pub fn with_parts(connector: C, interpolator: M, config: ExecutorConfig) -> Self {
        Self {
            connector,
            interpolator,
            config,
        }
    }

    /// Runs a batch.
    ///
    /// Fails as a whole only when the executor settings are invalid or the
    /// connection cannot be configured, opened or health-checked. The
    /// connection is closed before returning.
    pub async fn query(
        &self,
        request: &BatchRequest,
        cancel: &CancellationToken,
    ) -> Result<BatchResponse> {
        let start = Instant::now();
        self.config.validate()?;
        let conn_config = ConnectionConfig::from_settings(&request.datasource)?;

        let conn = self.connector.open(&conn_config, &self.config).await?;
        info!(
            "Connected to {}, running {} queries",
            conn_config.display_string(),
            request.queries.len()
        );

        let context = RequestContext {
            time_range: request.time_range,
        };
        let executor = BatchExecutor::new(
            &self.interpolator,
            TableBuilder::new(self.config.initial_row_capacity),
        );
        let response = executor
            .execute(conn.as_ref(), &request.queries, &context, cancel)
            .await;

        conn.close().await;

        let failed = response
            .results
            .iter()
            .filter(|r| r.as_error().is_some())
            .count();
        info!(
            "Batch finished in {:?}: {} succeeded, {} failed",
            start.elapsed(),
            response.results.len() - failed,
            failed
        );

        Ok(response)
    }
}
