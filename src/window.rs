use crate::Result;
use crate::config;
use crate::errors::Error;
use chrono::{
    DateTime, FixedOffset, Local, NaiveDateTime, SecondsFormat, TimeDelta, TimeZone, Utc,
};
use serde::Serialize;
use std::fmt::{self, Display};
use std::str::FromStr;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// The user-chosen end of a query window, as entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopInstant {
    Naive(NaiveDateTime),
    Aware(DateTime<FixedOffset>),
}

/// How a stop instant without an offset is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NaivePolicy {
    /// The wall clock is already UTC: attach the offset, do not convert.
    #[default]
    AssumeUtc,
    /// The wall clock is in the process's local timezone: convert to UTC.
    Local,
}

impl NaivePolicy {
    pub fn from_config() -> Result<Self> {
        config::get_parsed("NAIVE_STOP_POLICY")
    }

    /// The current wall clock in the zone naive instants are read in.
    pub fn naive_now(&self) -> NaiveDateTime {
        match self {
            NaivePolicy::AssumeUtc => Utc::now().naive_utc(),
            NaivePolicy::Local => Local::now().naive_local(),
        }
    }
}

impl FromStr for NaivePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utc" => Ok(NaivePolicy::AssumeUtc),
            "local" => Ok(NaivePolicy::Local),
            other => Err(Error::Config(format!(
                "unknown naive stop policy {:?} (expected utc or local)",
                other
            ))),
        }
    }
}

impl Display for NaivePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NaivePolicy::AssumeUtc => write!(f, "utc"),
            NaivePolicy::Local => write!(f, "local"),
        }
    }
}

impl StopInstant {
    pub fn to_utc(self, policy: NaivePolicy) -> Result<DateTime<Utc>> {
        match self {
            StopInstant::Aware(dt) => Ok(dt.with_timezone(&Utc)),
            StopInstant::Naive(naive) => match policy {
                NaivePolicy::AssumeUtc => Ok(naive.and_utc()),
                // earliest() resolves a DST fold; a DST gap has no instant
                NaivePolicy::Local => Local
                    .from_local_datetime(&naive)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok_or_else(|| {
                        Error::InvalidStop(format!(
                            "{} does not exist in the local timezone",
                            naive
                        ))
                    }),
            },
        }
    }
}

impl FromStr for StopInstant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(StopInstant::Aware(dt));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .map(StopInstant::Naive)
            .ok_or_else(|| Error::InvalidStop(format!("cannot parse {:?}", s)))
    }
}

impl From<NaiveDateTime> for StopInstant {
    fn from(naive: NaiveDateTime) -> Self {
        StopInstant::Naive(naive)
    }
}

impl From<DateTime<Utc>> for StopInstant {
    fn from(dt: DateTime<Utc>) -> Self {
        StopInstant::Aware(dt.fixed_offset())
    }
}

/// Closed interval `[start, stop]` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

impl TimeWindow {
    pub fn duration(&self) -> TimeDelta {
        self.stop - self.start
    }

    pub fn start_str(&self) -> String {
        format_instant(self.start)
    }

    pub fn stop_str(&self) -> String {
        format_instant(self.stop)
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.stop
    }
}

impl Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start_str(), self.stop_str())
    }
}

/// RFC 3339 with a literal `Z`; fractional seconds only when present.
pub fn format_instant(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Window of `duration_minutes` ending at `stop`, or at the current instant
/// when no stop is given.
pub fn build_window(
    stop: Option<StopInstant>,
    duration_minutes: i64,
    policy: NaivePolicy,
) -> Result<TimeWindow> {
    let stop = match stop {
        Some(stop) => stop.to_utc(policy)?,
        None => Utc::now(),
    };
    window_ending_at(stop, duration_minutes)
}

pub fn window_ending_at(stop: DateTime<Utc>, duration_minutes: i64) -> Result<TimeWindow> {
    if duration_minutes <= 0 {
        return Err(Error::InvalidDuration(format!(
            "{} minutes; the duration must be positive",
            duration_minutes
        )));
    }
    let start = TimeDelta::try_minutes(duration_minutes)
        .and_then(|delta| stop.checked_sub_signed(delta))
        .ok_or_else(|| {
            Error::InvalidDuration(format!(
                "{} minutes before {} is out of range",
                duration_minutes,
                format_instant(stop)
            ))
        })?;
    Ok(TimeWindow { start, stop })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertables::*;
    use chrono::{NaiveDate, Offset};
    use proptest::prelude::*;

    fn naive(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_six_hours_before_noon() {
        let stop: StopInstant = "2024-01-01T12:00:00Z".parse().unwrap();
        let window = build_window(Some(stop), 360, NaivePolicy::AssumeUtc).unwrap();
        assert_eq!(window.start_str(), "2024-01-01T06:00:00Z");
        assert_eq!(window.stop_str(), "2024-01-01T12:00:00Z");
        assert_eq!(window.duration(), TimeDelta::minutes(360));
    }

    #[test]
    fn test_naive_stop_assume_utc_attaches_offset() {
        let stop = StopInstant::Naive(naive(2024, 1, 1, 12, 0, 0));
        let window = build_window(Some(stop), 30, NaivePolicy::AssumeUtc).unwrap();
        assert_eq!(window.stop_str(), "2024-01-01T12:00:00Z");
        assert_eq!(window.start_str(), "2024-01-01T11:30:00Z");
    }

    #[test]
    fn test_naive_stop_local_converts_through_local_offset() {
        let wall = naive(2024, 1, 1, 12, 0, 0);
        let local = Local.from_local_datetime(&wall).earliest().unwrap();
        let utc = StopInstant::Naive(wall).to_utc(NaivePolicy::Local).unwrap();
        assert_eq!(utc, local.with_timezone(&Utc));

        let offset = local.offset().fix().local_minus_utc();
        let assumed = StopInstant::Naive(wall)
            .to_utc(NaivePolicy::AssumeUtc)
            .unwrap();
        assert_eq!(assumed - utc, TimeDelta::seconds(i64::from(offset)));
    }

    #[test]
    fn test_aware_stop_is_converted_regardless_of_policy() {
        let stop: StopInstant = "2024-01-01T21:00:00+09:00".parse().unwrap();
        for policy in [NaivePolicy::AssumeUtc, NaivePolicy::Local] {
            let window = build_window(Some(stop), 60, policy).unwrap();
            assert_eq!(window.stop_str(), "2024-01-01T12:00:00Z");
            assert_eq!(window.start_str(), "2024-01-01T11:00:00Z");
        }
    }

    #[test]
    fn test_omitted_stop_defaults_to_now() {
        let before = Utc::now();
        let window = build_window(None, 10, NaivePolicy::AssumeUtc).unwrap();
        let after = Utc::now();
        assert_ge!(window.stop, before);
        assert_le!(window.stop, after);
        assert_eq!(window.duration(), TimeDelta::minutes(10));
    }

    #[test]
    fn test_non_positive_duration_rejected() {
        let stop = naive(2024, 1, 1, 0, 0, 0).and_utc();
        for minutes in [0, -1, -360] {
            assert!(matches!(
                window_ending_at(stop, minutes),
                Err(Error::InvalidDuration(_))
            ));
        }
    }

    #[test]
    fn test_overflowing_duration_rejected() {
        let stop = naive(2024, 1, 1, 0, 0, 0).and_utc();
        assert!(matches!(
            window_ending_at(stop, i64::MAX),
            Err(Error::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_builder_does_not_bound_large_durations() {
        let stop = naive(2024, 1, 1, 0, 0, 0).and_utc();
        let window = window_ending_at(stop, 60 * 24 * 365).unwrap();
        assert_eq!(window.start_str(), "2023-01-01T00:00:00Z");
    }

    #[test]
    fn test_fractional_seconds_kept_in_serialization() {
        let stop: StopInstant = "2024-01-01T12:00:00.250Z".parse().unwrap();
        let window = build_window(Some(stop), 10, NaivePolicy::AssumeUtc).unwrap();
        assert_eq!(window.stop_str(), "2024-01-01T12:00:00.250Z");
        assert_eq!(window.start_str(), "2024-01-01T11:50:00.250Z");
    }

    #[test]
    fn test_parse_stop_instant_formats() {
        let cases = [
            ("2024-01-01T12:00:00", StopInstant::Naive(naive(2024, 1, 1, 12, 0, 0))),
            ("2024-01-01 12:00:05", StopInstant::Naive(naive(2024, 1, 1, 12, 0, 5))),
            ("2024-01-01 12:30", StopInstant::Naive(naive(2024, 1, 1, 12, 30, 0))),
        ];
        for (input, expected) in cases {
            assert_eq!(input.parse::<StopInstant>().unwrap(), expected, "{}", input);
        }
        assert!(matches!(
            "2024-01-01T12:00:00Z".parse::<StopInstant>(),
            Ok(StopInstant::Aware(_))
        ));
        assert!(matches!(
            "yesterday".parse::<StopInstant>(),
            Err(Error::InvalidStop(_))
        ));
    }

    #[test]
    fn test_parse_naive_policy() {
        assert_eq!("utc".parse::<NaivePolicy>().unwrap(), NaivePolicy::AssumeUtc);
        assert_eq!("LOCAL".parse::<NaivePolicy>().unwrap(), NaivePolicy::Local);
        assert!("tokyo".parse::<NaivePolicy>().is_err());
    }

    proptest! {
        #[test]
        fn test_window_spans_exact_duration(
            secs in 0i64..4_102_444_800,
            minutes in 1i64..=100_000,
        ) {
            let stop = DateTime::from_timestamp(secs, 0).unwrap();
            let window = window_ending_at(stop, minutes).unwrap();
            prop_assert_eq!(window.stop - window.start, TimeDelta::minutes(minutes));
            prop_assert!(window.start < window.stop);
            prop_assert_eq!(window.stop, stop);
        }

        #[test]
        fn test_serialized_bounds_round_trip(
            secs in 0i64..4_102_444_800,
            nanos in 0u32..1_000_000_000,
            minutes in 1i64..=1440,
        ) {
            let stop = DateTime::from_timestamp(secs, nanos).unwrap();
            let window = window_ending_at(stop, minutes).unwrap();
            for (text, instant) in [
                (window.start_str(), window.start),
                (window.stop_str(), window.stop),
            ] {
                prop_assert!(text.ends_with('Z'));
                let parsed = DateTime::parse_from_rfc3339(&text).unwrap().with_timezone(&Utc);
                prop_assert_eq!(parsed, instant);
            }
        }
    }
}
