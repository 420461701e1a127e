//! Database abstraction layer for tablequery.
//!
//! Provides a trait-based interface over the SQL driver, allowing
//! different backends (and a scripted mock) to be used interchangeably by
//! the query pipeline.

mod cursor;
mod mock;
mod postgres;
mod sqlite;
mod types;

pub use cursor::{RowDecoder, SqlxCursor};
pub use mock::{MockConnection, MockConnector, MockResult};
pub use postgres::PostgresConnection;
pub use sqlite::SqliteConnection;
pub use types::{Cell, CellKind, Column, RawValue, Row};

use crate::config::{ConnectionConfig, ExecutorConfig};
use crate::error::Result;
use async_trait::async_trait;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Returns the default port for this backend, if it is networked.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Postgres => Some(5432),
            Self::Sqlite => None,
        }
    }
}

/// Opens and health-checks a connection for the given settings.
///
/// This is the central factory function for database connections. A
/// failure here is a batch-level connection error.
pub async fn connect(
    config: &ConnectionConfig,
    executor: &ExecutorConfig,
) -> Result<Box<dyn DatabaseConnection>> {
    let conn: Box<dyn DatabaseConnection> = match config.backend {
        DatabaseBackend::Postgres => Box::new(PostgresConnection::connect(config, executor).await?),
        DatabaseBackend::Sqlite => Box::new(SqliteConnection::connect(config, executor).await?),
    };

    if let Err(e) = conn.ping().await {
        conn.close().await;
        return Err(e);
    }

    Ok(conn)
}

/// A single live connection shared by every query of one batch.
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Verifies the connection is usable.
    async fn ping(&self) -> Result<()>;

    /// Executes a query and returns a cursor over its rows.
    ///
    /// Errors raised by the backend while starting the query surface here
    /// rather than on the first `next_row` call.
    async fn query<'a>(&'a self, sql: &'a str) -> Result<Box<dyn RowCursor + 'a>>;

    /// Closes the connection. Safe to call more than once.
    async fn close(&self);
}

/// A forward-only cursor over a result set.
///
/// Dropping the cursor releases it.
#[async_trait]
pub trait RowCursor: Send {
    /// Column names in the order the backend reported them.
    fn columns(&self) -> &[String];

    /// Fetches the next row as raw values, one per column.
    ///
    /// Returns `Ok(None)` once the cursor is exhausted.
    async fn next_row(&mut self) -> Result<Option<Vec<RawValue>>>;
}

/// Opens connections for incoming batches.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens and health-checks a connection.
    async fn open(
        &self,
        config: &ConnectionConfig,
        executor: &ExecutorConfig,
    ) -> Result<Box<dyn DatabaseConnection>>;
}

/// Connector backed by the sqlx drivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxConnector;

#[async_trait]
impl Connector for SqlxConnector {
    async fn open(
        &self,
        config: &ConnectionConfig,
        executor: &ExecutorConfig,
    ) -> Result<Box<dyn DatabaseConnection>> {
        connect(config, executor).await
    }
}
