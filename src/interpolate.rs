//! SQL macro interpolation.
//!
//! Rewrites templated SQL such as `WHERE $__timeFilter(ts)` into SQL the
//! backend can execute, using the request's time range.

use crate::error::{Result, TableQueryError};
use crate::query::TimeRange;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Request-wide inputs available to interpolation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub time_range: TimeRange,
}

/// Turns raw SQL into backend-executable SQL.
///
/// Implementations are pure: the same SQL and context always produce the
/// same output or the same error.
pub trait MacroInterpolator: Send + Sync {
    fn interpolate(&self, raw_sql: &str, context: &RequestContext) -> Result<String>;
}

/// Passes SQL through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMacros;

impl MacroInterpolator for NoMacros {
    fn interpolate(&self, raw_sql: &str, _context: &RequestContext) -> Result<String> {
        Ok(raw_sql.to_string())
    }
}

/// Expands the time-range macros.
///
/// | macro | expansion |
/// |---|---|
/// | `$__timeFilter(col)` | `col BETWEEN '<from>' AND '<to>'` |
/// | `$__timeFrom()` / `$__timeTo()` | `'<RFC 3339 timestamp>'` |
/// | `$__unixEpochFilter(col)` | `col >= <from s> AND col <= <to s>` |
/// | `$__unixEpochFrom()` / `$__unixEpochTo()` | epoch seconds |
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeMacros;

fn macro_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$__(\w+)").expect("macro pattern is a valid regex"))
}

impl MacroInterpolator for TimeMacros {
    fn interpolate(&self, raw_sql: &str, context: &RequestContext) -> Result<String> {
        let mut out = String::with_capacity(raw_sql.len());
        let mut last = 0;

        while let Some(caps) = macro_pattern().captures_at(raw_sql, last) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            out.push_str(&raw_sql[last..whole.start()]);

            let (arg, end) = match macro_argument(&raw_sql[whole.end()..]) {
                Some(Ok((arg, consumed))) => (arg, whole.end() + consumed),
                Some(Err(())) => {
                    return Err(TableQueryError::sanitization(format!(
                        "unbalanced parentheses in macro $__{}",
                        name.as_str()
                    )))
                }
                None => ("", whole.end()),
            };

            out.push_str(&expand(name.as_str(), arg.trim(), &context.time_range)?);
            last = end;
        }

        out.push_str(&raw_sql[last..]);
        Ok(out)
    }
}

/// Reads a parenthesised argument list at the start of `rest`.
///
/// Returns `None` when `rest` does not open with `(`, otherwise the inner
/// text and the number of bytes consumed including both parentheses.
/// Parentheses inside single-quoted literals are ignored.
fn macro_argument(rest: &str) -> Option<std::result::Result<(&str, usize), ()>> {
    if !rest.starts_with('(') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_quote = false;
    for (i, c) in rest.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth -= 1;
                if depth == 0 {
                    return Some(Ok((&rest[1..i], i + 1)));
                }
            }
            _ => {}
        }
    }
    Some(Err(()))
}

fn expand(name: &str, arg: &str, range: &TimeRange) -> Result<String> {
    match name {
        "timeFilter" => Ok(format!(
            "{} BETWEEN {} AND {}",
            column_arg(name, arg)?,
            quoted_timestamp(range.from_epoch_ms)?,
            quoted_timestamp(range.to_epoch_ms)?
        )),
        "timeFrom" => quoted_timestamp(range.from_epoch_ms),
        "timeTo" => quoted_timestamp(range.to_epoch_ms),
        "unixEpochFilter" => {
            let column = column_arg(name, arg)?;
            Ok(format!(
                "{column} >= {} AND {column} <= {}",
                epoch_seconds(range.from_epoch_ms),
                epoch_seconds(range.to_epoch_ms)
            ))
        }
        "unixEpochFrom" => Ok(epoch_seconds(range.from_epoch_ms).to_string()),
        "unixEpochTo" => Ok(epoch_seconds(range.to_epoch_ms).to_string()),
        other => Err(TableQueryError::sanitization(format!(
            "unknown macro: $__{other}"
        ))),
    }
}

fn column_arg<'a>(name: &str, arg: &'a str) -> Result<&'a str> {
    if arg.is_empty() {
        return Err(TableQueryError::sanitization(format!(
            "macro $__{name} requires a column argument"
        )));
    }
    Ok(arg)
}

fn quoted_timestamp(epoch_ms: i64) -> Result<String> {
    let ts = DateTime::<Utc>::from_timestamp_millis(epoch_ms).ok_or_else(|| {
        TableQueryError::sanitization(format!("time {epoch_ms}ms is out of range"))
    })?;
    Ok(format!("'{}'", ts.to_rfc3339_opts(SecondsFormat::Millis, true)))
}

fn epoch_seconds(epoch_ms: i64) -> i64 {
    epoch_ms.div_euclid(1000)
}
