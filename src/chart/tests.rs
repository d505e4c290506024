use super::*;
use crate::normalize::SeriesPoint;
use crate::window::window_ending_at;
use chrono::TimeZone;

fn view(values: &[f64]) -> View {
    let stop = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let window = window_ending_at(stop, 360).unwrap();
    let points = values
        .iter()
        .enumerate()
        .map(|(i, value)| SeriesPoint {
            timestamp: window.start + TimeDelta::minutes(10 * i as i64),
            value: *value,
        })
        .collect();
    View {
        source: "temperature".to_string(),
        table: "ambient_data".to_string(),
        field: "temperature".to_string(),
        window,
        series: PresentedSeries {
            time_label: "Date-Time".to_string(),
            value_label: "Temperature (Celsius)".to_string(),
            points,
        },
    }
}

// === parse_size ===

#[test]
fn test_parse_size_valid_formats() {
    let test_cases = vec![
        ("1200x800", (1200, 800)),
        ("800x600", (800, 600)),
        ("1920x1080", (1920, 1080)),
        ("100x100", (100, 100)),
    ];

    for (input, expected) in test_cases {
        let result = parse_size(input);
        assert!(result.is_ok(), "Failed to parse size: {}", input);
        assert_eq!(result.unwrap(), expected);
    }
}

#[test]
fn test_parse_size_invalid_formats() {
    let invalid_cases = vec![
        "1200", "1200x", "x800", "axb", "1200y800", "0x800", "1200x0", "", "1200x800x",
    ];

    for invalid_input in invalid_cases {
        let result = parse_size(invalid_input);
        assert!(
            matches!(result, Err(ChartError::InvalidSizeFormat(_))),
            "Should fail for input: {}",
            invalid_input
        );
    }
}

// === axes ===

#[test]
fn test_value_axis_is_padded() {
    let (lo, hi) = value_axis(&view(&[18.0, 20.0]).series).unwrap();
    assert!((lo - 17.8).abs() < 1e-9);
    assert!((hi - 20.2).abs() < 1e-9);
}

#[test]
fn test_flat_series_gets_unit_band() {
    assert_eq!(value_axis(&view(&[5.0, 5.0]).series).unwrap(), (4.0, 6.0));
}

#[test]
fn test_empty_series_cannot_be_drawn() {
    assert!(matches!(
        value_axis(&view(&[]).series),
        Err(ChartError::EmptySeries)
    ));
    let err: Error = ChartError::EmptySeries.into();
    assert!(matches!(err, Error::Chart(_)));
}

#[test]
fn test_time_axis_is_the_window() {
    let v = view(&[1.0]);
    assert_eq!(time_axis(&v), (v.window.start, v.window.stop));
}

// === output ===

#[test]
fn test_default_output_path() {
    assert_eq!(
        default_output_path("pm", "air_quality_data_0", "pm25_cf1_aqi"),
        PathBuf::from("pm_air_quality_data_0_pm25_cf1_aqi.png")
    );
    assert_eq!(
        default_output_path("a/b", "c d", "e"),
        PathBuf::from("a_b_c_d_e.png")
    );
}

#[test]
fn test_write_json_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("view.json");
    let file = std::fs::File::create(&path).unwrap();
    write_json(&view(&[18.2, 19.7]), file).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.ends_with('\n'));
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["source"], "temperature");
    assert_eq!(value["value_label"], "Temperature (Celsius)");
    assert_eq!(value["points"].as_array().unwrap().len(), 2);
    assert_eq!(value["points"][1]["timestamp"], "2024-01-01T06:10:00Z");
}
