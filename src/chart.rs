use crate::errors::Error;
use crate::logging::*;
use crate::normalize::PresentedSeries;
use crate::viewer::View;
use chrono::{DateTime, TimeDelta, Utc};
use plotters::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("Chart generation error: {0}")]
    ChartGeneration(String),
    #[error("Invalid size format: {0}. Expected format: WIDTHxHEIGHT")]
    InvalidSizeFormat(String),
    #[error("Nothing to draw")]
    EmptySeries,
}

impl From<ChartError> for Error {
    fn from(e: ChartError) -> Self {
        Error::Chart(e.to_string())
    }
}

pub fn parse_size(size_str: &str) -> std::result::Result<(u32, u32), ChartError> {
    let parts: Vec<&str> = size_str.split('x').collect();
    let [width, height] = parts.as_slice() else {
        return Err(ChartError::InvalidSizeFormat(size_str.to_string()));
    };
    let parse = |s: &str| {
        s.parse::<u32>()
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| ChartError::InvalidSizeFormat(size_str.to_string()))
    };
    Ok((parse(*width)?, parse(*height)?))
}

/// `<source>_<table>_<field>.png` with anything outside `[A-Za-z0-9._-]`
/// replaced.
pub fn default_output_path(source: &str, table: &str, field: &str) -> PathBuf {
    let name: String = format!("{}_{}_{}", source, table, field)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    PathBuf::from(format!("{}.png", name))
}

/// X axis bounds: the requested window, so a sparse series still shows the
/// whole span.
fn time_axis(view: &View) -> (DateTime<Utc>, DateTime<Utc>) {
    let (start, stop) = (view.window.start, view.window.stop);
    if start < stop {
        (start, stop)
    } else {
        (start - TimeDelta::minutes(1), stop + TimeDelta::minutes(1))
    }
}

/// Y axis bounds padded by a tenth of the spread; flat series get a unit
/// band.
fn value_axis(series: &PresentedSeries) -> std::result::Result<(f64, f64), ChartError> {
    let (min_value, max_value) = series.value_range().ok_or(ChartError::EmptySeries)?;
    let range = max_value - min_value;
    let padding = if range > 0.0 { range * 0.1 } else { 1.0 };
    Ok((min_value - padding, max_value + padding))
}

pub fn render_png(
    view: &View,
    output_path: &Path,
    width: u32,
    height: u32,
) -> std::result::Result<(), ChartError> {
    let log = DEFAULT.new(o!(
        "function" => "render_png",
        "path" => output_path.display().to_string(),
    ));
    let series = &view.series;
    let (min_value, max_value) = value_axis(series)?;
    let (start_time, end_time) = time_axis(view);
    let span = end_time - start_time;

    let root = BitMapBackend::new(output_path, (width, height)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| ChartError::ChartGeneration(format!("Failed to fill background: {}", e)))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(series.title(), ("sans-serif", 30).into_font())
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(start_time..end_time, min_value..max_value)
        .map_err(|e| ChartError::ChartGeneration(format!("Failed to build chart: {}", e)))?;

    let time_format = if span > TimeDelta::days(1) {
        "%m-%d %H:%M"
    } else {
        "%H:%M"
    };
    chart
        .configure_mesh()
        .x_desc(series.time_label.as_str())
        .y_desc(series.value_label.as_str())
        .x_label_formatter(&|x| x.format(time_format).to_string())
        .draw()
        .map_err(|e| ChartError::ChartGeneration(format!("Failed to configure mesh: {}", e)))?;

    chart
        .draw_series(LineSeries::new(
            series.points.iter().map(|p| (p.timestamp, p.value)),
            &BLUE,
        ))
        .map_err(|e| ChartError::ChartGeneration(format!("Failed to draw series: {}", e)))?;

    root.present()
        .map_err(|e| ChartError::ChartGeneration(format!("Failed to present chart: {}", e)))?;

    info!(log, "chart written"; "points" => series.points.len(), "width" => width, "height" => height);
    Ok(())
}

/// The view as pretty JSON followed by a newline.
pub fn write_json<W: Write>(view: &View, mut writer: W) -> crate::Result<()> {
    serde_json::to_writer_pretty(&mut writer, view)
        .map_err(|e| Error::Chart(format!("cannot encode view: {}", e)))?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests;
