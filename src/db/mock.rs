//! Mock database connection for testing.
//!
//! Provides a scripted in-memory connection: each SQL string maps to a
//! canned result set or failure, and the connection records what it was
//! asked to do so tests can assert on it.

use super::{Connector, DatabaseConnection, RawValue, RowCursor};
use crate::config::{ConnectionConfig, ExecutorConfig};
use crate::error::{Result, TableQueryError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Canned outcome for one SQL string.
#[derive(Debug, Clone, Default)]
pub struct MockResult {
    columns: Vec<String>,
    rows: Vec<Vec<RawValue>>,
    execute_error: Option<String>,
    fetch_error: Option<String>,
}

impl MockResult {
    /// A result set with the given columns and rows.
    pub fn rows(columns: &[&str], rows: Vec<Vec<RawValue>>) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            ..Self::default()
        }
    }

    /// A query that fails when executed.
    pub fn execute_error(message: impl Into<String>) -> Self {
        Self {
            execute_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Makes the cursor fail after yielding its rows.
    pub fn failing_after_rows(mut self, message: impl Into<String>) -> Self {
        self.fetch_error = Some(message.into());
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    executed: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

/// A mock connection that returns predefined results.
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    results: HashMap<String, MockResult>,
    ping_error: Option<String>,
    state: Arc<MockState>,
}

impl MockConnection {
    /// Creates a mock connection with no scripted queries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the outcome of the given SQL.
    pub fn with_result(mut self, sql: impl Into<String>, result: MockResult) -> Self {
        self.results.insert(sql.into(), result);
        self
    }

    /// Makes the health check fail.
    pub fn with_ping_error(mut self, message: impl Into<String>) -> Self {
        self.ping_error = Some(message.into());
        self
    }

    /// Returns every SQL string passed to `query`, in order.
    pub async fn executed(&self) -> Vec<String> {
        self.state.executed.lock().await.clone()
    }

    /// Returns how many times `close` was called on this connection or its clones.
    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseConnection for MockConnection {
    async fn ping(&self) -> Result<()> {
        match &self.ping_error {
            Some(message) => Err(TableQueryError::connection(message.clone())),
            None => Ok(()),
        }
    }

    async fn query<'a>(&'a self, sql: &'a str) -> Result<Box<dyn RowCursor + 'a>> {
        self.state.executed.lock().await.push(sql.to_string());

        let Some(result) = self.results.get(sql) else {
            return Err(TableQueryError::execution(format!(
                "syntax error at or near \"{sql}\""
            )));
        };

        if let Some(message) = &result.execute_error {
            return Err(TableQueryError::execution(message.clone()));
        }

        Ok(Box::new(MockCursor {
            columns: result.columns.clone(),
            rows: result.rows.iter().cloned().collect(),
            fetch_error: result.fetch_error.clone(),
        }))
    }

    async fn close(&self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockCursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<RawValue>>,
    fetch_error: Option<String>,
}

#[async_trait]
impl RowCursor for MockCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Vec<RawValue>>> {
        if let Some(row) = self.rows.pop_front() {
            return Ok(Some(row));
        }
        match self.fetch_error.take() {
            Some(message) => Err(TableQueryError::execution(message)),
            None => Ok(None),
        }
    }
}

/// Connector handing out clones of one mock connection.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    connection: MockConnection,
    open_error: Option<String>,
}

impl MockConnector {
    /// Creates a connector that always opens the given connection.
    pub fn new(connection: MockConnection) -> Self {
        Self {
            connection,
            open_error: None,
        }
    }

    /// Creates a connector whose open always fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            connection: MockConnection::new(),
            open_error: Some(message.into()),
        }
    }

    /// Returns the connection handed out by this connector.
    pub fn connection(&self) -> &MockConnection {
        &self.connection
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(
        &self,
        _config: &ConnectionConfig,
        _executor: &ExecutorConfig,
    ) -> Result<Box<dyn DatabaseConnection>> {
        if let Some(message) = &self.open_error {
            return Err(TableQueryError::connection(message.clone()));
        }

        let conn = self.connection.clone();
        if let Err(e) = conn.ping().await {
            conn.close().await;
            return Err(e);
        }
        Ok(Box::new(conn))
    }
}
