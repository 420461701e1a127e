//! SQLite connection implementation.
//!
//! SQLite values carry their storage class at runtime, so classification
//! follows the value rather than the declared column type.

use super::cursor::{RowDecoder, SqlxCursor};
use super::{DatabaseConnection, RawValue, RowCursor};
use crate::config::{ConnectionConfig, ExecutorConfig};
use crate::error::{Result, TableQueryError};
use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Connection, Executor, Row as SqlxRow, TypeInfo, ValueRef};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// SQLite connection, used for local files and in-memory databases.
#[derive(Debug)]
pub struct SqliteConnection {
    pool: SqlitePool,
    prepared: bool,
    query_timeout: Duration,
}

impl SqliteConnection {
    /// Opens the database file named by the settings (`:memory:` allowed).
    pub async fn connect(config: &ConnectionConfig, executor: &ExecutorConfig) -> Result<Self> {
        let filename = config.sqlite_filename().ok_or_else(|| {
            TableQueryError::config("SQLite datasource requires a database file name")
        })?;

        let options = if filename == ":memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| TableQueryError::config(format!("Invalid SQLite options: {e}")))?
        } else {
            SqliteConnectOptions::new().filename(filename)
        };

        debug!("Opening SQLite database {filename}");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(executor.connect_timeout())
            .connect_with(options)
            .await
            .map_err(|e| {
                TableQueryError::connection(format!("Cannot open SQLite database {filename}: {e}"))
            })?;

        Ok(Self {
            pool,
            prepared: config.use_prepared_statements,
            query_timeout: executor.query_timeout(),
        })
    }
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| TableQueryError::connection(format!("Health check failed: {e}")))?;

        conn.ping()
            .await
            .map_err(|e| TableQueryError::connection(format!("Health check failed: {e}")))
    }

    async fn query<'a>(&'a self, sql: &'a str) -> Result<Box<dyn RowCursor + 'a>> {
        let stream = if self.prepared {
            sqlx::query(sql).fetch(&self.pool)
        } else {
            (&self.pool).fetch(sql)
        };

        let mut cursor = SqlxCursor::<Self>::open(stream, self.query_timeout).await?;

        if cursor.is_empty() {
            match (&self.pool).describe(sql).await {
                Ok(described) => cursor.set_columns(
                    described
                        .columns()
                        .iter()
                        .map(|col| col.name().to_string())
                        .collect(),
                ),
                Err(e) => debug!("Could not describe empty result set: {e}"),
            }
        }

        Ok(Box::new(cursor))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

impl RowDecoder for SqliteConnection {
    type Row = SqliteRow;

    fn decode(row: &SqliteRow, index: usize) -> RawValue {
        let type_name = match row.try_get_raw(index) {
            Ok(value) if value.is_null() => return RawValue::unsupported("NULL"),
            Ok(value) => value.type_info().name().to_uppercase(),
            Err(e) => {
                warn!("Could not read column {index}: {e}");
                return RawValue::unsupported("UNKNOWN");
            }
        };

        match type_name.as_str() {
            "TEXT" => decode_as::<String>(row, index, &type_name, RawValue::Text),
            "INTEGER" => decode_as::<i64>(row, index, &type_name, RawValue::Int64),
            "BOOLEAN" => decode_as::<bool>(row, index, &type_name, RawValue::Bool),
            "REAL" => decode_as::<f64>(row, index, &type_name, RawValue::Float64),
            _ => RawValue::Unsupported(type_name),
        }
    }
}

fn decode_as<'r, T>(
    row: &'r SqliteRow,
    index: usize,
    type_name: &str,
    wrap: impl FnOnce(T) -> RawValue,
) -> RawValue
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    match row.try_get::<T, _>(index) {
        Ok(value) => wrap(value),
        Err(e) => {
            warn!("Could not decode column {index} as {type_name}: {e}");
            RawValue::unsupported(type_name)
        }
    }
}
