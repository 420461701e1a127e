//! Command-line argument parsing for tablequery.

use clap::Parser;
use std::io::Read;
use std::path::PathBuf;
use tablequery::error::{Result, TableQueryError};

/// Run a batch of SQL queries and print the tabular results as JSON.
#[derive(Parser, Debug)]
#[command(name = "tablequery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Batch request JSON file ("-" reads stdin)
    #[arg(value_name = "REQUEST", default_value = "-")]
    pub request: String,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Datasource password, overriding the one in the request
    #[arg(long, env = "TABLEQUERY_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Pretty-print the response
    #[arg(long)]
    pub pretty: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(tablequery::config::Config::default_path)
    }

    /// Reads the raw request body from the file or stdin.
    pub fn read_request(&self) -> Result<String> {
        if self.request == "-" {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .map_err(|e| TableQueryError::request(format!("Failed to read stdin: {e}")))?;
            return Ok(body);
        }

        std::fs::read_to_string(&self.request).map_err(|e| {
            TableQueryError::request(format!("Failed to read {}: {e}", self.request))
        })
    }
}
