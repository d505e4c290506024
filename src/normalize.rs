use crate::Result;
use crate::config::{self, FieldConfig};
use crate::errors::Error;
use crate::logging::*;
use crate::result_set::{RawResultSet, parse_number, parse_timestamp};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Display label of the timestamp column.
pub const TIME_LABEL: &str = "Date-Time";

const RESERVED_COLUMNS: [&str; 3] = ["result", "table", "time"];

const BUILTIN_RULES: [(&str, &str, f64); 10] = [
    ("gas", "Gas Resistance (kOhms)", 0.001),
    ("gas_resistance", "Gas Resistance (kOhms)", 0.001),
    ("temperature", "Temperature (Celsius)", 1.0),
    ("relative_humidity", "Humidity (%)", 1.0),
    ("pressure", "Pressure (hPa)", 1.0),
    ("iaq", "IAQ Index", 1.0),
    ("noise_level", "Noise Level (dB)", 1.0),
    ("pm25_cf1_aqi", "10-min AQI", 1.0),
    ("visible_light_lux", "Visible Light (lux)", 1.0),
    ("us_index", "UV Index", 1.0),
];

const DEFAULT_DECIMALS: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub display_name: String,
    pub scale_factor: f64,
    pub decimals: u32,
}

impl FieldRule {
    /// Scales then rounds half away from zero.
    pub fn apply(&self, raw: f64) -> f64 {
        round_to(raw * self.scale_factor, self.decimals)
    }
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    if decimals > config::MAX_FIELD_DECIMALS {
        return value;
    }
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Lookup table from raw field name to presentation.
#[derive(Debug, Clone)]
pub struct FieldRules {
    rules: HashMap<String, FieldRule>,
}

impl Default for FieldRules {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FieldRules {
    pub fn builtin() -> Self {
        let rules = BUILTIN_RULES
            .iter()
            .map(|(name, display, scale)| {
                (
                    name.to_string(),
                    FieldRule {
                        display_name: display.to_string(),
                        scale_factor: *scale,
                        decimals: DEFAULT_DECIMALS,
                    },
                )
            })
            .collect();
        Self { rules }
    }

    /// Built-in table extended by the `[[fields]]` configuration entries.
    pub fn from_config() -> Self {
        Self::builtin().with_overrides(config::field_overrides())
    }

    pub fn with_overrides(mut self, overrides: &[FieldConfig]) -> Self {
        for field in overrides {
            self.rules.insert(
                field.name.clone(),
                FieldRule {
                    display_name: field.display.clone(),
                    scale_factor: field.scale,
                    decimals: field.decimals,
                },
            );
        }
        self
    }

    /// Unknown fields fall back to their raw name, unscaled.
    pub fn lookup(&self, raw_name: &str) -> FieldRule {
        self.rules.get(raw_name).cloned().unwrap_or_else(|| FieldRule {
            display_name: raw_name.to_string(),
            scale_factor: 1.0,
            decimals: DEFAULT_DECIMALS,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Two-column series ready for a line chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentedSeries {
    pub time_label: String,
    pub value_label: String,
    pub points: Vec<SeriesPoint>,
}

impl PresentedSeries {
    pub fn title(&self) -> &str {
        &self.value_label
    }

    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.points.iter().fold(None, |acc, p| match acc {
            None => Some((p.value, p.value)),
            Some((lo, hi)) => Some((lo.min(p.value), hi.max(p.value))),
        })
    }

    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.points.first()?.timestamp, self.points.last()?.timestamp))
    }
}

/// Columns a caller may pick a field from.
pub fn valid_columns(raw: &RawResultSet) -> Vec<String> {
    raw.columns()
        .iter()
        .filter(|c| {
            c.as_str() != raw.time_column()
                && !c.starts_with('_')
                && !RESERVED_COLUMNS.contains(&c.as_str())
        })
        .cloned()
        .collect()
}

pub fn normalize(
    raw: &RawResultSet,
    selected_field: &str,
    rules: &FieldRules,
) -> Result<PresentedSeries> {
    let log = DEFAULT.new(o!(
        "function" => "normalize",
        "field" => selected_field.to_owned(),
        "rows" => raw.len(),
    ));

    if !raw.has_column(selected_field) {
        debug!(log, "field absent from result");
        return Err(Error::no_data(selected_field));
    }

    let rule = rules.lookup(selected_field);
    let mut points = Vec::with_capacity(raw.len());
    for row in raw.rows() {
        let Some(cell) = row.get(selected_field) else {
            continue;
        };
        let Some(value) = parse_number(cell)? else {
            continue;
        };
        let time_cell = row.get(raw.time_column()).ok_or_else(|| {
            Error::MalformedResult(format!("row without {} column", raw.time_column()))
        })?;
        points.push(SeriesPoint {
            timestamp: parse_timestamp(time_cell)?,
            value: rule.apply(value),
        });
    }

    if points.is_empty() {
        debug!(log, "field present but empty");
        return Err(Error::no_data(selected_field));
    }
    points.sort_by_key(|p| p.timestamp);

    debug!(log, "normalized"; "points" => points.len(), "label" => &rule.display_name);
    Ok(PresentedSeries {
        time_label: TIME_LABEL.to_string(),
        value_label: rule.display_name,
        points,
    })
}
