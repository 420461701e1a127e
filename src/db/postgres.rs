//! PostgreSQL connection implementation.
//!
//! Provides the `PostgresConnection` struct that implements the
//! `DatabaseConnection` trait for PostgreSQL-protocol databases using sqlx.

use super::cursor::{RowDecoder, SqlxCursor};
use super::{DatabaseConnection, RawValue, RowCursor};
use crate::config::{ConnectionConfig, ExecutorConfig, TlsMode};
use crate::error::{Result, TableQueryError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode, Postgres};
use sqlx::{Column as SqlxColumn, Connection, Executor, Row as SqlxRow, TypeInfo, ValueRef};
use std::time::Duration;
use tracing::{debug, warn};

/// PostgreSQL connection.
///
/// Wraps a pool capped at one connection, so every query of a batch runs
/// on the same backend session.
#[derive(Debug)]
pub struct PostgresConnection {
    pool: PgPool,
    prepared: bool,
    query_timeout: Duration,
}

impl PostgresConnection {
    /// Opens a connection with the given settings.
    pub async fn connect(config: &ConnectionConfig, executor: &ExecutorConfig) -> Result<Self> {
        let options = connect_options(config);

        debug!("Connecting to {}", config.display_string());

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(executor.connect_timeout())
            .connect_with(options)
            .await
            .map_err(|e| map_connection_error(e, config))?;

        debug!("Successfully connected to database");

        Ok(Self {
            pool,
            prepared: config.use_prepared_statements,
            query_timeout: executor.query_timeout(),
        })
    }
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
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
        // Without arguments sqlx sends a simple (unprepared) query.
        let stream = if self.prepared {
            sqlx::query(sql).fetch(&self.pool)
        } else {
            (&self.pool).fetch(sql)
        };

        let mut cursor = SqlxCursor::<Self>::open(stream, self.query_timeout).await?;

        if cursor.is_empty() {
            // No row carried column metadata; ask the server to describe the statement.
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

impl RowDecoder for PostgresConnection {
    type Row = PgRow;

    fn decode(row: &PgRow, index: usize) -> RawValue {
        let type_name = match row.try_get_raw(index) {
            Ok(value) if value.is_null() => return RawValue::unsupported("NULL"),
            Ok(value) => value.type_info().name().to_uppercase(),
            Err(e) => {
                warn!("Could not read column {index}: {e}");
                return RawValue::unsupported("UNKNOWN");
            }
        };

        match type_name.as_str() {
            "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CHARACTER VARYING" => {
                decode_as::<String>(row, index, &type_name, RawValue::Text)
            }
            "INT8" | "BIGINT" => decode_as::<i64>(row, index, &type_name, RawValue::Int64),
            "INT4" | "INT" | "INTEGER" => {
                decode_as::<i32>(row, index, &type_name, |v| RawValue::Int64(i64::from(v)))
            }
            "INT2" | "SMALLINT" => {
                decode_as::<i16>(row, index, &type_name, |v| RawValue::Int64(i64::from(v)))
            }
            "BOOL" | "BOOLEAN" => decode_as::<bool>(row, index, &type_name, RawValue::Bool),
            "FLOAT8" | "DOUBLE PRECISION" => {
                decode_as::<f64>(row, index, &type_name, RawValue::Float64)
            }
            "FLOAT4" | "REAL" => {
                decode_as::<f32>(row, index, &type_name, |v| RawValue::Float64(f64::from(v)))
            }
            "TIMESTAMPTZ" => {
                decode_as::<DateTime<Utc>>(row, index, &type_name, RawValue::Timestamp)
            }
            "TIMESTAMP" => decode_as::<NaiveDateTime>(row, index, &type_name, |v| {
                RawValue::Timestamp(v.and_utc())
            }),
            "DATE" => decode_as::<NaiveDate>(row, index, &type_name, |v| {
                match v.and_hms_opt(0, 0, 0) {
                    Some(midnight) => RawValue::Timestamp(midnight.and_utc()),
                    None => RawValue::unsupported("DATE"),
                }
            }),
            _ => RawValue::Unsupported(type_name),
        }
    }

    fn describe_error(error: &sqlx::Error) -> String {
        format_query_error(error)
    }
}

/// Decodes a column as `T`, falling back to an unsupported value on failure.
fn decode_as<'r, T>(
    row: &'r PgRow,
    index: usize,
    type_name: &str,
    wrap: impl FnOnce(T) -> RawValue,
) -> RawValue
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    match row.try_get::<T, _>(index) {
        Ok(value) => wrap(value),
        Err(e) => {
            warn!("Could not decode column {index} as {type_name}: {e}");
            RawValue::unsupported(type_name)
        }
    }
}

/// Builds connect options from the datasource settings.
fn connect_options(config: &ConnectionConfig) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(config.host())
        .port(config.port_or_default().unwrap_or_default())
        .ssl_mode(ssl_mode(config.tls_mode));

    if let Some(user) = &config.user {
        options = options.username(user);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }
    if let Some(database) = &config.database {
        options = options.database(database);
    }
    if !config.use_prepared_statements {
        options = options.statement_cache_capacity(0);
    }

    options
}

fn ssl_mode(mode: TlsMode) -> PgSslMode {
    match mode {
        TlsMode::Disable => PgSslMode::Disable,
        TlsMode::Prefer => PgSslMode::Prefer,
        TlsMode::Require => PgSslMode::Require,
        TlsMode::VerifyFull => PgSslMode::VerifyFull,
    }
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> TableQueryError {
    let host = config.host();
    let port = config.port_or_default().unwrap_or_default();
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        TableQueryError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        TableQueryError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        TableQueryError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        TableQueryError::connection(format!(
            "TLS negotiation with {host}:{port} failed: {error}"
        ))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        TableQueryError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        TableQueryError::connection(format!("Error connecting to {host}:{port}: {error}"))
    }
}

/// Formats a query error with detail and hint if available.
fn format_query_error(error: &sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
