//! Request and response envelopes for a query batch.

use super::table::Table;
use crate::error::{Result, TableQueryError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One batch of queries plus the connection they share.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    /// Shared connection parameters.
    pub datasource: DatasourceSettings,

    /// Dashboard time range, used by macro interpolation.
    #[serde(default)]
    pub time_range: TimeRange,

    /// Queries in the order their results must be returned.
    #[serde(default)]
    pub queries: Vec<QuerySpec>,
}

impl BatchRequest {
    /// Decodes a request from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| TableQueryError::request(format!("Invalid batch request: {e}")))
    }
}

/// Datasource settings as delivered by the host, with the secret already decrypted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceSettings {
    /// `postgres` (default) or `sqlite`.
    #[serde(default)]
    pub backend: Option<String>,

    /// `host:port`, a full URL, or a SQLite file name.
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub database: Option<String>,

    #[serde(default, alias = "tlsmode")]
    pub tls_mode: Option<String>,

    #[serde(default)]
    pub use_prepared_statements: bool,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

/// Inclusive time range in Unix-epoch milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub from_epoch_ms: i64,
    pub to_epoch_ms: i64,
}

/// Requested output shape of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QueryFormat {
    #[default]
    Table,
    TimeSeries,
    /// Any format name this adapter does not know.
    Other(String),
}

impl QueryFormat {
    /// Returns the format name as it appears on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Table => "table",
            Self::TimeSeries => "time_series",
            Self::Other(name) => name,
        }
    }

    /// Fails unless this is the table shape.
    pub fn ensure_table(&self) -> Result<()> {
        match self {
            Self::Table => Ok(()),
            Self::TimeSeries => Err(TableQueryError::unsupported_format(
                "time_series not supported",
            )),
            Self::Other(name) => Err(TableQueryError::unsupported_format(format!(
                "unsupported format: {name}"
            ))),
        }
    }
}

impl From<String> for QueryFormat {
    fn from(s: String) -> Self {
        match s.as_str() {
            "" | "table" => Self::Table,
            "time_series" => Self::TimeSeries,
            _ => Self::Other(s),
        }
    }
}

impl From<QueryFormat> for String {
    fn from(format: QueryFormat) -> Self {
        format.as_str().to_string()
    }
}

impl fmt::Display for QueryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One query of a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    #[serde(default)]
    pub datasource_id: String,

    #[serde(default)]
    pub format: QueryFormat,

    #[serde(default)]
    pub raw_sql: String,

    /// Caller-supplied id echoed on the matching result.
    #[serde(default)]
    pub ref_id: String,

    /// Not used by the table path.
    #[serde(default)]
    pub interval_ms: u64,

    /// Not used by the table path.
    #[serde(default)]
    pub max_data_points: u64,
}

impl QuerySpec {
    /// Creates a table query with the given reference id and SQL.
    pub fn table(ref_id: impl Into<String>, raw_sql: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            raw_sql: raw_sql.into(),
            ..Self::default()
        }
    }

    /// Sets the requested format.
    pub fn with_format(mut self, format: QueryFormat) -> Self {
        self.format = format;
        self
    }
}

/// Results of a batch, positionally matching the request's queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<QueryResult>,
}

impl BatchResponse {
    /// Serialises the response to JSON.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let encoded = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        encoded.map_err(|e| TableQueryError::internal(format!("Failed to encode response: {e}")))
    }
}

/// Outcome of a single query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(rename = "refId")]
    pub ref_id: String,

    #[serde(flatten)]
    pub outcome: QueryOutcome,
}

/// Either the materialized table or the reason the query failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryOutcome {
    Table(Table),
    Error(String),
}

impl QueryResult {
    /// Creates a failed result.
    pub fn error(ref_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            outcome: QueryOutcome::Error(message.into()),
        }
    }

    /// Returns the table, if the query succeeded.
    pub fn as_table(&self) -> Option<&Table> {
        match &self.outcome {
            QueryOutcome::Table(table) => Some(table),
            QueryOutcome::Error(_) => None,
        }
    }

    /// Returns the error message, if the query failed.
    pub fn as_error(&self) -> Option<&str> {
        match &self.outcome {
            QueryOutcome::Table(_) => None,
            QueryOutcome::Error(message) => Some(message),
        }
    }
}
