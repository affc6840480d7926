//! Built-in `TimeFormatter` that mirrors moment's parsing, `fromNow` and
//! `format` behaviour on top of chrono.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc,
};
use scanlog_core::{ProcessorConfig, TimeFormatter};

/// Text produced for input that cannot be read as a point in time.
pub const INVALID_DATE: &str = "Invalid date";

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Go `time.Time` layout once the zone abbreviation and monotonic reading are gone.
const GO_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %z";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Longest tokens first so that `MMMM` wins over `MM`.
const TOKENS: [&str; 28] = [
    "YYYY", "YY", "MMMM", "MMM", "MM", "M", "Do", "DD", "D", "dddd", "ddd", "dd", "d", "HH", "H",
    "hh", "h", "mm", "m", "ss", "s", "SSS", "A", "a", "ZZ", "Z", "X", "x",
];

/// English-only moment work-alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MomentFormatter {
    display_offset: Option<FixedOffset>,
}

impl MomentFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print absolute instants in `offset` instead of the offset they were written in.
    pub fn with_display_offset(mut self, offset: FixedOffset) -> Self {
        self.display_offset = Some(offset);
        self
    }

    pub fn from_config(config: &ProcessorConfig) -> Self {
        Self {
            display_offset: config.display_offset(),
        }
    }
}

impl TimeFormatter for MomentFormatter {
    fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        parse_timestamp(raw).map(|instant| instant.with_timezone(&Utc))
    }

    fn format_relative(&self, raw: &str, now: DateTime<Utc>) -> String {
        match self.parse(raw) {
            Some(instant) => humanize(instant.signed_duration_since(now)),
            None => INVALID_DATE.to_string(),
        }
    }

    fn format_absolute(&self, raw: &str, pattern: &str) -> String {
        let Some(instant) = parse_timestamp(raw) else {
            return INVALID_DATE.to_string();
        };
        let instant = match self.display_offset {
            Some(offset) => instant.with_timezone(&offset),
            None => instant,
        };
        format_with_pattern(&instant, pattern)
    }
}

/// Read a timestamp the way the log server writes them.
///
/// Accepted, in order: RFC 3339, Go's default `time.Time` string
/// (`2006-01-02 15:04:05.999999999 -0700 MST`, optional `m=+…` suffix),
/// naive date-times (read as UTC) and bare dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(instant);
    }

    if let Some(instant) = parse_go_time(trimmed) {
        return Some(instant);
    }

    let utc = FixedOffset::east_opt(0)?;
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_local_timezone(utc).single()?);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| naive.and_local_timezone(utc).single())
}

fn parse_go_time(value: &str) -> Option<DateTime<FixedOffset>> {
    let without_monotonic = value.split(" m=").next().unwrap_or(value);
    let fields: Vec<&str> = without_monotonic.split_whitespace().collect();

    // date, time, offset and an optional zone abbreviation
    if !(3..=4).contains(&fields.len()) {
        return None;
    }
    let candidate = fields[..3].join(" ");
    DateTime::parse_from_str(&candidate, GO_TIME_FORMAT).ok()
}

/// Phrase a signed distance from now (`instant - now`) like moment's `fromNow`.
pub fn humanize(delta: TimeDelta) -> String {
    let future = delta > TimeDelta::zero();
    let phrase = humanize_magnitude(delta.abs());
    if future {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

fn humanize_magnitude(delta: TimeDelta) -> String {
    let total_secs = delta.num_milliseconds() as f64 / 1000.0;
    let seconds = total_secs.round();
    let minutes = (total_secs / 60.0).round();
    let hours = (total_secs / 3600.0).round();
    let days_exact = total_secs / 86_400.0;
    let days = days_exact.round();
    let months_exact = days_exact * 4800.0 / 146_097.0;
    let months = months_exact.round();
    let years = (months_exact / 12.0).round();

    if seconds < 45.0 {
        "a few seconds".to_string()
    } else if minutes <= 1.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        format!("{minutes} minutes")
    } else if hours <= 1.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        format!("{hours} hours")
    } else if days <= 1.0 {
        "a day".to_string()
    } else if days < 26.0 {
        format!("{days} days")
    } else if months <= 1.0 {
        "a month".to_string()
    } else if months < 11.0 {
        format!("{months} months")
    } else if years <= 1.0 {
        "a year".to_string()
    } else {
        format!("{years} years")
    }
}

/// Render `instant` with a moment format pattern. Text inside `[...]` is copied literally.
pub fn format_with_pattern(instant: &DateTime<FixedOffset>, pattern: &str) -> String {
    let mut output = String::with_capacity(pattern.len() + 8);
    let mut rest = pattern;

    while let Some(ch) = rest.chars().next() {
        if ch == '[' {
            match rest[1..].find(']') {
                Some(end) => {
                    output.push_str(&rest[1..end + 1]);
                    rest = &rest[end + 2..];
                }
                None => {
                    output.push_str(rest);
                    rest = "";
                }
            }
            continue;
        }

        match TOKENS.iter().find(|token| rest.starts_with(**token)) {
            Some(token) => {
                output.push_str(&render_token(instant, token));
                rest = &rest[token.len()..];
            }
            None => {
                output.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }

    output
}

fn render_token(instant: &DateTime<FixedOffset>, token: &str) -> String {
    let (is_pm, hour12) = instant.hour12();
    let weekday = instant.weekday().num_days_from_sunday() as usize;
    let month = instant.month0() as usize;

    match token {
        "YYYY" => format!("{:04}", instant.year()),
        "YY" => format!("{:02}", instant.year().rem_euclid(100)),
        "MMMM" => MONTH_NAMES[month].to_string(),
        "MMM" => MONTH_NAMES[month][..3].to_string(),
        "MM" => format!("{:02}", instant.month()),
        "M" => instant.month().to_string(),
        "Do" => ordinal(instant.day()),
        "DD" => format!("{:02}", instant.day()),
        "D" => instant.day().to_string(),
        "dddd" => WEEKDAY_NAMES[weekday].to_string(),
        "ddd" => WEEKDAY_NAMES[weekday][..3].to_string(),
        "dd" => WEEKDAY_NAMES[weekday][..2].to_string(),
        "d" => weekday.to_string(),
        "HH" => format!("{:02}", instant.hour()),
        "H" => instant.hour().to_string(),
        "hh" => format!("{hour12:02}"),
        "h" => hour12.to_string(),
        "mm" => format!("{:02}", instant.minute()),
        "m" => instant.minute().to_string(),
        "ss" => format!("{:02}", instant.second()),
        "s" => instant.second().to_string(),
        "SSS" => format!("{:03}", instant.timestamp_subsec_millis().min(999)),
        "A" => (if is_pm { "PM" } else { "AM" }).to_string(),
        "a" => (if is_pm { "pm" } else { "am" }).to_string(),
        "ZZ" => instant.format("%z").to_string(),
        "Z" => instant.format("%:z").to_string(),
        "X" => instant.timestamp().to_string(),
        "x" => instant.timestamp_millis().to_string(),
        other => other.to_string(),
    }
}

fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{day}{suffix}")
}
