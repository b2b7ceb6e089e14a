use std::cmp::Ordering;
use std::num::ParseFloatError;

use chrono::NaiveDateTime;
use polars::prelude::*;

use crate::errors::ParserError;

/// How a raw hexadecimal code becomes a physical value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRule {
    /// Two-range 16-bit sign encoding; the midpoint itself means missing.
    Signed { midpoint: u32, scale: f64 },
    /// `raw / scale + offset`, unless `raw` equals the sentinel.
    Offset { sentinel: u32, scale: f64, offset: f64 },
}

impl FieldRule {
    pub fn decode(&self, raw: u32) -> Option<f64> {
        match *self {
            FieldRule::Signed { midpoint, scale } => match raw.cmp(&midpoint) {
                Ordering::Less => Some(f64::from(raw) / scale),
                Ordering::Greater => Some((f64::from(raw) - 65536.0) / scale),
                Ordering::Equal => None,
            },
            FieldRule::Offset {
                sentinel,
                scale,
                offset,
            } => {
                if raw == sentinel {
                    None
                } else {
                    Some(f64::from(raw) / scale + offset)
                }
            }
        }
    }
}

/// A fixed-width hexadecimal field within a profile row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexField {
    pub channel: &'static str,
    pub start: usize,
    pub end: usize,
    pub rule: FieldRule,
}

impl HexField {
    pub const fn new(channel: &'static str, start: usize, end: usize, rule: FieldRule) -> Self {
        Self {
            channel,
            start,
            end,
            rule,
        }
    }

    /// Raw code in this field, or `None` when the slice is absent or not hexadecimal.
    pub fn raw(&self, row: &str) -> Option<u32> {
        let text = row.get(self.start..self.end)?;
        u32::from_str_radix(text, 16).ok()
    }
}

/// Park-phase samples collected before the profile starts.
#[derive(Debug, Clone, Default)]
pub(crate) struct ParkColumns {
    pub timestamp: Vec<i64>,
    pub p: Vec<Option<f64>>,
    pub t: Vec<Option<f64>>,
    pub s: Vec<Option<f64>>,
    pub o2_ph: Vec<Option<f64>>,
    pub o2_t: Vec<Option<f64>>,
}

impl ParkColumns {
    pub fn push(&mut self, timestamp: NaiveDateTime, values: [Option<f64>; 5]) {
        self.timestamp.push(timestamp.and_utc().timestamp_micros());
        let [p, t, s, o2_ph, o2_t] = values;
        self.p.push(p);
        self.t.push(t);
        self.s.push(s);
        self.o2_ph.push(o2_ph);
        self.o2_t.push(o2_t);
    }
}

pub(crate) fn build_park_dataframe(
    decoder: &'static str,
    columns: ParkColumns,
) -> Result<DataFrame, ParserError> {
    let ts_series = Series::new("timestamp".into(), columns.timestamp)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
        .map_err(|source| ParserError::Frame { decoder, source })?;

    let cols: Vec<Column> = vec![
        ts_series.into(),
        Series::new("p".into(), columns.p).into(),
        Series::new("t".into(), columns.t).into(),
        Series::new("s".into(), columns.s).into(),
        Series::new("o2_ph".into(), columns.o2_ph).into(),
        Series::new("o2_t".into(), columns.o2_t).into(),
    ];

    DataFrame::new(cols).map_err(|source| ParserError::Frame { decoder, source })
}

/// Parses a timestamp after collapsing runs of whitespace.
pub(crate) fn parse_timestamp(value: &str, format: &str) -> Option<NaiveDateTime> {
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&normalized, format).ok()
}

/// First run of ASCII digits in `text`.
pub(crate) fn first_digit_run(text: &str) -> Option<u32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Parses a numeric token; `NA` maps to missing.
pub(crate) fn parse_optional_f64(token: &str) -> Result<Option<f64>, ParseFloatError> {
    let trimmed = token.trim();
    if trimmed.eq_ignore_ascii_case("na") || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    trimmed.parse::<f64>().map(Some)
}
