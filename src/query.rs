use crate::Result;
use crate::config;
use crate::errors::Error;
use crate::result_set::{FLUX_TIME_COLUMN, SQL_TIME_COLUMN};
use crate::window::{TimeWindow, format_instant};
use chrono::TimeDelta;
use std::fmt::{self, Display};
use std::str::FromStr;

/// Query language spoken by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// `SELECT ... WHERE time >= .. AND time <= ..` (InfluxDB 3).
    Sql,
    /// `range |> filter |> pivot` pipelines (InfluxDB 2).
    Flux,
}

impl Dialect {
    pub fn from_config() -> Result<Self> {
        config::get_parsed("STORE_DIALECT")
    }

    pub fn time_column(&self) -> &'static str {
        match self {
            Dialect::Sql => SQL_TIME_COLUMN,
            Dialect::Flux => FLUX_TIME_COLUMN,
        }
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sql" => Ok(Dialect::Sql),
            "flux" => Ok(Dialect::Flux),
            other => Err(Error::Config(format!(
                "unknown store dialect {:?} (expected sql or flux)",
                other
            ))),
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Sql => write!(f, "sql"),
            Dialect::Flux => write!(f, "flux"),
        }
    }
}

/// A request ready to hand to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub database: String,
    pub dialect: Dialect,
    pub text: String,
}

/// All columns of `table` with timestamps in `[window.start, window.stop]`,
/// one column per field.
pub fn build_query(source: &str, table: &str, window: &TimeWindow, dialect: Dialect) -> QuerySpec {
    let text = match dialect {
        Dialect::Sql => format!(
            "SELECT * FROM {} WHERE time >= '{}' AND time <= '{}'",
            quote_identifier(table),
            window.start_str(),
            window.stop_str()
        ),
        Dialect::Flux => {
            // range() excludes its stop, so step one tick past the window
            let stop = window.stop + TimeDelta::nanoseconds(1);
            format!(
                "from(bucket: {}) \
                 |> range(start: {}, stop: {}) \
                 |> filter(fn: (r) => r._measurement == {}) \
                 |> pivot(rowKey: [\"_time\"], columnKey: [\"_field\"], valueColumn: \"_value\")",
                quote_string(source),
                window.start_str(),
                format_instant(stop),
                quote_string(table)
            )
        }
    };
    QuerySpec {
        database: source.to_string(),
        dialect,
        text,
    }
}

/// Lists every table with its schema; user tables live in `iox`.
pub const SHOW_TABLES: &str = "SHOW TABLES";

/// Measurement names of `bucket`, one per `_value` row.
pub fn measurements_query(bucket: &str) -> String {
    format!(
        "import \"influxdata/influxdb/schema\"\nschema.measurements(bucket: {})",
        quote_string(bucket)
    )
}

/// Double-quoted SQL identifier.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Double-quoted Flux string literal.
pub fn quote_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
