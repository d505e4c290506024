use crate::Result;
use crate::errors::Error;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

/// Timestamp column of the SQL dialect.
pub const SQL_TIME_COLUMN: &str = "time";
/// Timestamp column of the pipeline (Flux) dialect.
pub const FLUX_TIME_COLUMN: &str = "_time";

pub type Row = Map<String, Value>;

/// Rows as the store returned them. The column set is whatever the store
/// reported, in first-seen order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawResultSet {
    time_column: String,
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl RawResultSet {
    pub fn new(time_column: &str) -> Self {
        Self {
            time_column: time_column.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn from_rows(time_column: &str, rows: Vec<Row>) -> Self {
        let mut result = Self::new(time_column);
        for row in rows {
            result.push(row);
        }
        result
    }

    pub fn push(&mut self, row: Row) {
        for key in row.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads a timestamp cell: RFC 3339, naive ISO-8601 (taken as UTC) or
/// integer epoch nanoseconds.
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.with_timezone(&Utc));
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                .map(|naive| naive.and_utc())
                .map_err(|_| Error::MalformedResult(format!("unreadable timestamp {:?}", s)))
        }
        Value::Number(n) => n
            .as_i64()
            .map(DateTime::from_timestamp_nanos)
            .ok_or_else(|| Error::MalformedResult(format!("unreadable timestamp {}", n))),
        other => Err(Error::MalformedResult(format!(
            "unreadable timestamp {}",
            other
        ))),
    }
}

/// Reads a numeric cell. `Ok(None)` for null.
pub fn parse_number(value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| Error::MalformedResult(format!("non-finite number {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| Error::MalformedResult(format!("non-numeric value {:?}", s))),
        other => Err(Error::MalformedResult(format!(
            "non-numeric value {}",
            other
        ))),
    }
}

/// Typed cell from a text cell (CSV), the way a JSON body would carry it.
pub fn cell_from_text(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = text.parse::<f64>()
        && let Some(n) = serde_json::Number::from_f64(f)
    {
        return Value::Number(n);
    }
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(text.to_string()),
    }
}
