use crate::Result;
use crate::config;
use crate::errors::Error;
use crate::window::StopInstant;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt::{self, Display};
use std::path::PathBuf;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

/// Bounds of the duration control, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationRange {
    pub min: i64,
    pub max: i64,
    pub step: i64,
    pub default: i64,
}

impl Default for DurationRange {
    fn default() -> Self {
        Self {
            min: 10,
            max: 24 * 60,
            step: 10,
            default: 6 * 60,
        }
    }
}

impl DurationRange {
    pub fn new(min: i64, max: i64, step: i64, default: i64) -> Result<Self> {
        let range = Self {
            min,
            max,
            step,
            default,
        };
        if min <= 0 || step <= 0 || min > max {
            return Err(Error::Config(format!(
                "duration range {}..={} step {} is not usable",
                min, max, step
            )));
        }
        range
            .check(default)
            .map_err(|e| Error::Config(format!("default duration: {}", e)))?;
        Ok(range)
    }

    pub fn from_config() -> Result<Self> {
        Self::new(
            config::get_parsed("DURATION_MIN_MINUTES")?,
            config::get_parsed("DURATION_MAX_MINUTES")?,
            config::get_parsed("DURATION_STEP_MINUTES")?,
            config::get_parsed("DURATION_DEFAULT_MINUTES")?,
        )
    }

    /// Accepts values inside the range that sit on a step from `min`.
    pub fn check(&self, minutes: i64) -> Result<i64> {
        if minutes < self.min || minutes > self.max {
            return Err(Error::InvalidDuration(format!(
                "{} minutes is outside {}..={}",
                minutes, self.min, self.max
            )));
        }
        if (minutes - self.min) % self.step != 0 {
            return Err(Error::InvalidDuration(format!(
                "{} minutes is not a multiple of {} from {}",
                minutes, self.step, self.min
            )));
        }
        Ok(minutes)
    }
}

pub fn parse_stop_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| Error::InvalidStop(format!("date {:?} is not YYYY-MM-DD", s)))
}

pub fn parse_stop_time(s: &str) -> Result<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s.trim(), fmt).ok())
        .ok_or_else(|| Error::InvalidStop(format!("time {:?} is not HH:MM[:SS]", s)))
}

/// Combines a date and a time control into a stop instant. Both unset
/// means "now"; a missing half is taken from `now`.
pub fn stop_from_parts(
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    now: NaiveDateTime,
) -> Option<StopInstant> {
    if date.is_none() && time.is_none() {
        return None;
    }
    let date = date.unwrap_or(now.date());
    let time = time.unwrap_or(now.time());
    Some(StopInstant::Naive(date.and_time(time)))
}

/// Selections of one interactive viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    range: DurationRange,
    source: Option<String>,
    table: Option<String>,
    field: Option<String>,
    duration_minutes: i64,
    stop_date: Option<NaiveDate>,
    stop_time: Option<NaiveTime>,
}

impl Session {
    pub fn new(range: DurationRange) -> Self {
        Self {
            range,
            source: None,
            table: None,
            field: None,
            duration_minutes: range.default,
            stop_date: None,
            stop_time: None,
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration_minutes
    }

    /// A new source invalidates the table and field chosen under the old one.
    pub fn select_source(&mut self, source: &str) {
        if self.source.as_deref() != Some(source) {
            self.table = None;
            self.field = None;
        }
        self.source = Some(source.to_string());
    }

    pub fn select_table(&mut self, table: &str) {
        if self.table.as_deref() != Some(table) {
            self.field = None;
        }
        self.table = Some(table.to_string());
    }

    pub fn select_field(&mut self, field: &str) {
        self.field = Some(field.to_string());
    }

    pub fn set_duration(&mut self, minutes: i64) -> Result<()> {
        self.duration_minutes = self.range.check(minutes)?;
        Ok(())
    }

    pub fn set_stop(&mut self, date: Option<NaiveDate>, time: Option<NaiveTime>) {
        if date.is_some() {
            self.stop_date = date;
        }
        if time.is_some() {
            self.stop_time = time;
        }
    }

    /// Back to "now" for both stop controls.
    pub fn reset(&mut self) {
        self.stop_date = None;
        self.stop_time = None;
    }

    pub fn stop(&self, now: NaiveDateTime) -> Option<StopInstant> {
        stop_from_parts(self.stop_date, self.stop_time, now)
    }
}

impl Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_unset = |v: Option<&str>| v.unwrap_or("-").to_string();
        writeln!(f, "source:   {}", or_unset(self.source()))?;
        writeln!(f, "table:    {}", or_unset(self.table()))?;
        writeln!(f, "field:    {}", or_unset(self.field()))?;
        writeln!(f, "minutes:  {}", self.duration_minutes)?;
        let date = self
            .stop_date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_else(|| "now".to_string());
        let time = self
            .stop_time
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "now".to_string());
        write!(f, "stop:     {} {}", date, time)
    }
}

/// One line typed at the `browse` prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Sources,
    Source(String),
    Tables,
    Table(String),
    Fields,
    Field(String),
    Minutes(i64),
    Stop {
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    },
    Reset,
    State,
    Show(Option<PathBuf>),
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  sources              list sources
  source NAME          select a source
  tables               list tables of the selected source
  table NAME           select a table
  fields               list plottable fields of the selected table
  field NAME           select a field
  minutes N            set the window length
  stop [DATE] [TIME]   set the stop date (YYYY-MM-DD) and/or time (HH:MM[:SS])
  reset                stop at the current instant again
  state                print the current selections
  show [PATH]          render the selected field (PNG when PATH is given)
  help                 this text
  quit                 leave";

impl FromStr for SessionCommand {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(Error::InvalidCommand("empty line".to_string()));
        };
        let args: Vec<&str> = words.collect();

        let one_arg = |what: &str| -> Result<String> {
            match args.as_slice() {
                [arg] => Ok(arg.to_string()),
                _ => Err(Error::InvalidCommand(format!("usage: {} {}", verb, what))),
            }
        };
        let no_args = |command: SessionCommand| -> Result<SessionCommand> {
            if args.is_empty() {
                Ok(command)
            } else {
                Err(Error::InvalidCommand(format!("{} takes no arguments", verb)))
            }
        };

        match verb.to_ascii_lowercase().as_str() {
            "sources" => no_args(SessionCommand::Sources),
            "source" => Ok(SessionCommand::Source(one_arg("NAME")?)),
            "tables" => no_args(SessionCommand::Tables),
            "table" => Ok(SessionCommand::Table(one_arg("NAME")?)),
            "fields" => no_args(SessionCommand::Fields),
            "field" => Ok(SessionCommand::Field(one_arg("NAME")?)),
            "minutes" => {
                let raw = one_arg("N")?;
                let minutes = raw
                    .parse()
                    .map_err(|_| Error::InvalidDuration(format!("{:?} is not a number", raw)))?;
                Ok(SessionCommand::Minutes(minutes))
            }
            "stop" => parse_stop_args(&args),
            "reset" => no_args(SessionCommand::Reset),
            "state" => no_args(SessionCommand::State),
            "show" => match args.as_slice() {
                [] => Ok(SessionCommand::Show(None)),
                [path] => Ok(SessionCommand::Show(Some(PathBuf::from(path)))),
                _ => Err(Error::InvalidCommand("usage: show [PATH]".to_string())),
            },
            "help" | "?" => Ok(SessionCommand::Help),
            "quit" | "exit" | "q" => Ok(SessionCommand::Quit),
            other => Err(Error::InvalidCommand(format!(
                "unknown command {:?} (try help)",
                other
            ))),
        }
    }
}

fn parse_stop_args(args: &[&str]) -> Result<SessionCommand> {
    match args {
        ["now"] => Ok(SessionCommand::Reset),
        [one] if one.contains('-') => Ok(SessionCommand::Stop {
            date: Some(parse_stop_date(one)?),
            time: None,
        }),
        [one] => Ok(SessionCommand::Stop {
            date: None,
            time: Some(parse_stop_time(one)?),
        }),
        [date, time] => Ok(SessionCommand::Stop {
            date: Some(parse_stop_date(date)?),
            time: Some(parse_stop_time(time)?),
        }),
        _ => Err(Error::InvalidCommand(
            "usage: stop [YYYY-MM-DD] [HH:MM[:SS]] | stop now".to_string(),
        )),
    }
}
